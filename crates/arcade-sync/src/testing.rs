//! Blob store wrappers that misbehave on demand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use arcade_store::{BlobStore, InMemoryBlobStore, ListPage, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Default)]
pub(crate) struct ScriptedStore {
    pub inner: InMemoryBlobStore,
    /// Puts of keys ending with this suffix always fail.
    pub fail_put_suffix: Option<String>,
    /// Gets of keys ending with this suffix always fail.
    pub fail_get_suffix: Option<String>,
    /// The next N puts fail, whatever the key.
    pub transient_put_failures: AtomicUsize,
    pub fail_listing: bool,
    /// Every listing page claims more follows, with a token that never moves.
    pub stuck_continuation: bool,
    pub put_delay: Option<Duration>,
    pub listings: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

fn injected(key: &str) -> StoreError {
    StoreError::Backend(format!("injected failure for {key}"))
}

#[async_trait]
impl BlobStore for ScriptedStore {
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()> {
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_put_suffix.as_deref().is_some_and(|s| key.ends_with(s)) {
            return Err(injected(key));
        }
        let transient = self
            .transient_put_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient {
            return Err(injected(key));
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        if self.fail_get_suffix.as_deref().is_some_and(|s| key.ends_with(s)) {
            return Err(injected(key));
        }
        self.inner.get(key).await
    }

    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(injected(prefix));
        }
        let mut page = self.inner.list_page(prefix, continuation).await?;
        if self.stuck_continuation {
            page.continuation = Some("stuck".into());
        }
        Ok(page)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }
}

/// Write `files` (relative path, contents) under `root`.
pub(crate) fn write_tree(root: &std::path::Path, files: &[(&str, &[u8])]) {
    for (rel, data) in files {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }
}
