use arcade_types::{BundleId, TypeError};

/// Errors from blob store and content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The key cannot be stored by this backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// A bundle directory with this id already exists.
    #[error("bundle already exists: {0}")]
    BundleExists(BundleId),

    /// The requested asset path is not servable.
    #[error("invalid asset path {asset:?}: {reason}")]
    InvalidAsset { asset: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by a remote backend.
    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
