use std::future::Future;
use std::time::Duration;

use arcade_store::StoreResult;

use crate::error::{SyncError, SyncResult};

/// Run one remote call, failing with [`SyncError::Timeout`] if it does not
/// finish within `limit`.
pub(crate) async fn bounded<T, F>(limit: Duration, op: &'static str, key: &str, call: F) -> SyncResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SyncError::Timeout {
            op,
            key: key.to_string(),
            after: limit,
        }),
    }
}
