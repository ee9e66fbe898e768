use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, ListPage, DEFAULT_PAGE_SIZE};

/// In-memory, `BTreeMap`-based blob store.
///
/// Intended for tests and embedding. Objects are held behind a `RwLock`;
/// `Bytes` makes reads cheap clones. The page size is adjustable so tests
/// can exercise continuation tokens with a handful of keys.
pub struct InMemoryBlobStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
    page_size: usize,
    puts: AtomicUsize,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store whose listings return at most `page_size` keys per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            puts: AtomicUsize::new(0),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Synchronous read, for assertions.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().expect("lock poisoned").get(key).cloned()
    }

    /// Total number of `put` calls served, including overwrites.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    /// Insert an object without going through the async trait.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key.into(), data.into());
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "empty key".into(),
            });
        }
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), data);
        self.puts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.object(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(ListPage::from_sorted(
            map.keys().cloned(),
            prefix,
            continuation,
            self.page_size,
        ))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self
            .objects
            .write()
            .expect("lock poisoned")
            .remove(key)
            .is_some())
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("object_count", &self.len())
            .field("page_size", &self.page_size)
            .finish()
    }
}
