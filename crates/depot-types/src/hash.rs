use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Longest hash string accepted.
pub const MAX_HASH_LEN: usize = 128;

/// Content-addressed identifier for a stored object.
///
/// The hash is supplied by the client and is never re-verified against the
/// bytes it names. Because the object store uses it as a filename, it is
/// restricted to `[A-Za-z0-9._-]`, must not start with `.`, and is at most
/// [`MAX_HASH_LEN`] bytes long.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Validate and wrap a hash string.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        let reason = if value.is_empty() {
            Some("must not be empty".to_string())
        } else if value.len() > MAX_HASH_LEN {
            Some(format!("longer than {MAX_HASH_LEN} bytes"))
        } else if value.starts_with('.') {
            Some("must not start with '.'".to_string())
        } else if let Some(ch) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            Some(format!("contains forbidden character {ch:?}"))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(TypeError::InvalidHash { value, reason }),
            None => Ok(Self(value)),
        }
    }

    /// Compute the BLAKE3 hex digest of `data`.
    ///
    /// Clients are free to use any hashing scheme; this is the one the
    /// `depot publish` command uses.
    pub fn digest(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    /// The hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for display.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContentHash {
    fn borrow(&self) -> &str {
        &self.0
    }
}
