use depot_index::IndexError;
use depot_store::StoreError;
use depot_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepotError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] TypeError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("object store error: {0}")]
    Store(StoreError),

    #[error("catalog error: {0}")]
    Index(#[from] IndexError),

    /// The retry budget ran out while other writers held the catalog.
    /// Retrying the whole operation later is safe.
    #[error("{operation} abandoned after {attempts} attempts: catalog busy")]
    ConcurrencyConflict {
        operation: &'static str,
        attempts: u32,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for DepotError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(hash) => Self::NotFound(format!("object {hash}")),
            other => Self::Store(other),
        }
    }
}

impl DepotError {
    /// Underlying durable storage failed.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Index(_))
    }

    pub(crate) fn is_busy(&self) -> bool {
        matches!(self, Self::Index(err) if err.is_busy())
    }
}

pub type DepotResult<T> = Result<T, DepotError>;
