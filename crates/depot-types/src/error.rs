use thiserror::Error;

/// Errors produced while constructing or validating depot values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid content hash {value:?}: {reason}")]
    InvalidHash { value: String, reason: String },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidName {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid file path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
