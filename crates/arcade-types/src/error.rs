use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid bundle id: {0:?}")]
    InvalidBundleId(String),

    #[error("invalid remote key {key:?}: {reason}")]
    InvalidRemoteKey { key: String, reason: String },

    #[error("invalid relative path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
}
