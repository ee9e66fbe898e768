use thiserror::Error;

/// Errors from archive ingestion.
///
/// The first four variants are the uploader's fault; the rest are ours.
/// Messages never include local filesystem paths.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The upload is not a readable zip archive.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// The upload or its extracted contents exceed the configured limit.
    #[error("archive exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    /// An entry would land outside the bundle directory.
    #[error("invalid file path in archive: {entry}")]
    PathTraversal { entry: String },

    /// A file entry has an extension that is not allowed.
    #[error("file type not allowed: {entry}")]
    DisallowedType { entry: String },

    #[error("I/O error during ingestion")]
    Io(#[from] std::io::Error),

    #[error("content store error")]
    Store(#[from] arcade_store::StoreError),
}

impl IngestError {
    /// `true` when the upload itself was at fault (malformed or unsafe).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArchive(_)
                | Self::TooLarge { .. }
                | Self::PathTraversal { .. }
                | Self::DisallowedType { .. }
        )
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
