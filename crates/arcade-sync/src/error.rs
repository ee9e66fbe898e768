use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote {op} of {key:?} timed out after {after:?}")]
    Timeout {
        op: &'static str,
        key: String,
        after: Duration,
    },

    #[error("push queue is closed")]
    QueueClosed,

    #[error("background task failed: {0}")]
    Task(String),

    #[error("store error: {0}")]
    Store(#[from] arcade_store::StoreError),

    #[error("key error: {0}")]
    Type(#[from] arcade_types::TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
