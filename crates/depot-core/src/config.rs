use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use depot_types::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::{DepotError, DepotResult};

const CATALOG_FILE: &str = "depot.db";

/// Top-level configuration, usually read from `depot.toml`.
///
/// Every section and field is optional; omitted values take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotConfig {
    pub storage: StorageConfig,
    pub coordinator: CoordinatorConfig,
    pub server: ServerConfig,
}

impl DepotConfig {
    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> DepotResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| DepotError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(raw: &str) -> DepotResult<Self> {
        toml::from_str(raw).map_err(|e| DepotError::Config(e.to_string()))
    }
}

/// Which catalog implementation backs the indexes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Objects on disk, catalog in `<data_dir>/depot.db`.
    #[default]
    Sqlite,
    /// Everything in process memory; lost on exit.
    Memory,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
    /// How long a SQLite connection waits on a locked database before
    /// reporting it busy.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            backend: StorageBackend::default(),
            busy_timeout_ms: 10_000,
        }
    }
}

impl StorageConfig {
    /// The SQLite catalog file inside `data_dir`.
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(CATALOG_FILE)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Extra attempts after the first when the catalog reports contention.
    pub max_retries: u32,
    /// Base delay between attempts; grows linearly with the attempt number.
    pub retry_backoff_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_backoff_ms: 25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted object upload, in bytes.
    pub max_object_size: usize,
    pub default_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 13496)),
            max_object_size: 256 * 1024 * 1024,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
