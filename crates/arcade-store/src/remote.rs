//! [`BlobStore`] on top of the `object_store` crate.
//!
//! One adapter covers every network and disk backend: S3 and S3-compatible
//! services (Cloudflare R2, MinIO) through [`ObjectStoreBlobStore::s3`],
//! and a local directory through [`ObjectStoreBlobStore::local`]. Any other
//! `object_store` implementation can be wrapped with
//! [`ObjectStoreBlobStore::new`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, ListPage, DEFAULT_PAGE_SIZE};

/// Connection settings for an S3-compatible bucket.
///
/// Unset credentials fall back to the provider chain `object_store` uses
/// (instance metadata, web identity).
#[derive(Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    /// Custom endpoint, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Permit plain `http://` endpoints (local MinIO).
    pub allow_http: bool,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<redacted>"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("allow_http", &self.allow_http)
            .finish()
    }
}

/// Blob store backed by any [`ObjectStore`].
pub struct ObjectStoreBlobStore {
    inner: Arc<dyn ObjectStore>,
    page_size: usize,
    /// The backend lists keys in ascending order, so a page can stop early.
    sorted_listing: bool,
}

impl ObjectStoreBlobStore {
    /// Wrap a backend whose listing order is unspecified.
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            page_size: DEFAULT_PAGE_SIZE,
            sorted_listing: false,
        }
    }

    /// Connect to an S3-compatible bucket. No request is made until first use.
    pub fn s3(settings: &S3Settings) -> StoreResult<Self> {
        if settings.bucket.trim().is_empty() {
            return Err(StoreError::Backend("s3 backend requires a bucket".into()));
        }
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&settings.bucket)
            .with_region(settings.region.as_deref().unwrap_or("auto"))
            .with_allow_http(settings.allow_http);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key) = &settings.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &settings.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        let s3 = builder.build().map_err(|e| StoreError::Backend(e.to_string()))?;
        // S3 ListObjectsV2 returns keys in UTF-8 binary order.
        Ok(Self::new(Arc::new(s3)).with_sorted_listing())
    }

    /// A directory on local disk, typically a volume shared by every
    /// instance. The directory is created if missing.
    pub fn local(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let fs = LocalFileSystem::new_with_prefix(root).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self::new(Arc::new(fs)))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_sorted_listing(mut self) -> Self {
        self.sorted_listing = true;
        self
    }

    /// Longest `/`-delimited directory covering `prefix`, which is what
    /// `object_store` can filter on server side.
    fn listing_dir(prefix: &str) -> StoreResult<Option<ObjectPath>> {
        match prefix.rfind('/') {
            Some(idx) if idx > 0 => Ok(Some(object_path(&prefix[..idx])?)),
            _ => Ok(None),
        }
    }
}

impl std::fmt::Debug for ObjectStoreBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreBlobStore")
            .field("inner", &self.inner.to_string())
            .field("page_size", &self.page_size)
            .field("sorted_listing", &self.sorted_listing)
            .finish()
    }
}

fn object_path(key: &str) -> StoreResult<ObjectPath> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "empty key".into(),
        });
    }
    ObjectPath::parse(key).map_err(|e| StoreError::InvalidKey {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn backend_error(key: &str, e: object_store::Error) -> StoreError {
    match e {
        object_store::Error::NotFound { .. } => StoreError::NotFound(key.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()> {
        let location = object_path(key)?;
        let size = data.len();
        self.inner
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| backend_error(key, e))?;
        debug!(key, size, "object stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let location = object_path(key)?;
        let result = self
            .inner
            .get(&location)
            .await
            .map_err(|e| backend_error(key, e))?;
        result.bytes().await.map_err(|e| backend_error(key, e))
    }

    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage> {
        let dir = Self::listing_dir(prefix)?;

        if !self.sorted_listing {
            let mut keys: Vec<String> = self
                .inner
                .list(dir.as_ref())
                .map_ok(|meta| meta.location.to_string())
                .try_collect()
                .await
                .map_err(|e| backend_error(prefix, e))?;
            keys.sort();
            return Ok(ListPage::from_sorted(keys, prefix, continuation, self.page_size));
        }

        let mut stream = match continuation {
            Some(token) => self.inner.list_with_offset(dir.as_ref(), &object_path(token)?),
            None => self.inner.list(dir.as_ref()),
        };
        let mut keys = Vec::new();
        while let Some(meta) = stream.next().await {
            let key = meta.map_err(|e| backend_error(prefix, e))?.location.to_string();
            if !key.starts_with(prefix) {
                if key.as_str() > prefix {
                    break;
                }
                continue;
            }
            keys.push(key);
            if keys.len() > self.page_size {
                break;
            }
        }
        Ok(ListPage::from_sorted(keys, prefix, continuation, self.page_size))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let location = object_path(key)?;
        // S3 deletes of absent keys succeed, so existence is checked first.
        match self.inner.head(&location).await {
            Ok(_) => {}
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(backend_error(key, e)),
        }
        match self.inner.delete(&location).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(backend_error(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn local() -> (tempfile::TempDir, ObjectStoreBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStoreBlobStore::local(dir.path().join("remote")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn local_put_get_roundtrip() {
        let (dir, store) = local();
        store
            .put("games/a/img/logo.png", Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap();
        assert!(dir.path().join("remote/games/a/img/logo.png").is_file());
        let data = store.get("games/a/img/logo.png").await.unwrap();
        assert_eq!(&data[..], b"\x89PNG");
    }

    #[tokio::test]
    async fn put_replaces_existing_object() {
        let (_dir, store) = local();
        store.put("games/a/x.js", Bytes::from_static(b"one")).await.unwrap();
        store.put("games/a/x.js", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(&store.get("games/a/x.js").await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (_dir, store) = local();
        assert!(matches!(
            store.get("games/none").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unsafe_keys_rejected() {
        let (dir, store) = local();
        for key in ["../x", "a/../../x", "a/./b", "a//b", ""] {
            let err = store.put(key, Bytes::from_static(b"x")).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "accepted {key:?}");
        }
        assert!(!dir.path().join("x").exists());
    }

    #[tokio::test]
    async fn local_listing_is_sorted_and_paginated() {
        let (_dir, store) = local();
        let store = store.with_page_size(2);
        for key in ["games/b/2.js", "games/a/1.js", "games/b/1.js", "misc/z"] {
            store.put(key, Bytes::from_static(b"x")).await.unwrap();
        }
        let first = store.list_page("games/", None).await.unwrap();
        assert_eq!(first.keys, vec!["games/a/1.js", "games/b/1.js"]);
        assert_eq!(first.continuation.as_deref(), Some("games/b/1.js"));

        let all = store.list_keys_with_prefix("games/").await.unwrap();
        assert_eq!(all, vec!["games/a/1.js", "games/b/1.js", "games/b/2.js"]);
    }

    #[tokio::test]
    async fn prefix_need_not_end_at_a_separator() {
        let (_dir, store) = local();
        for key in ["games/abc/1.js", "games/abd/1.js", "games/b/1.js"] {
            store.put(key, Bytes::from_static(b"x")).await.unwrap();
        }
        let keys = store.list_keys_with_prefix("games/ab").await.unwrap();
        assert_eq!(keys, vec!["games/abc/1.js", "games/abd/1.js"]);
    }

    #[tokio::test]
    async fn listing_empty_store_is_empty() {
        let (_dir, store) = local();
        assert!(store.list_keys_with_prefix("games/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sorted_listing_pages_with_offsets() {
        let store = ObjectStoreBlobStore::new(Arc::new(InMemory::new()))
            .with_sorted_listing()
            .with_page_size(2);
        for key in ["games/a/1.js", "games/a/2.js", "games/b/1.js", "games/c/1.js", "other/x"] {
            store.put(key, Bytes::from_static(b"x")).await.unwrap();
        }

        let first = store.list_page("games/", None).await.unwrap();
        assert_eq!(first.keys, vec!["games/a/1.js", "games/a/2.js"]);
        let second = store
            .list_page("games/", first.continuation.as_deref())
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["games/b/1.js", "games/c/1.js"]);
        assert!(second.continuation.is_none());

        let bundle = store.list_keys_with_prefix("games/b/").await.unwrap();
        assert_eq!(bundle, vec!["games/b/1.js"]);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (_dir, store) = local();
        store.put("games/a/deep/x.js", Bytes::from_static(b"x")).await.unwrap();
        store.put("games/b/y.js", Bytes::from_static(b"y")).await.unwrap();

        assert!(store.delete("games/a/deep/x.js").await.unwrap());
        assert!(!store.delete("games/a/deep/x.js").await.unwrap());
        assert_eq!(store.list_keys_with_prefix("games/").await.unwrap(), vec!["games/b/y.js"]);
    }

    #[test]
    fn s3_requires_bucket() {
        assert!(ObjectStoreBlobStore::s3(&S3Settings::default()).is_err());
    }

    #[test]
    fn s3_builds_without_network() {
        let settings = S3Settings {
            bucket: "games".into(),
            endpoint: Some("https://account.r2.cloudflarestorage.com".into()),
            region: Some("auto".into()),
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("wJalrXUtnFEMI".into()),
            allow_http: false,
        };
        let store = ObjectStoreBlobStore::s3(&settings).unwrap();
        assert!(store.sorted_listing);
        let shown = format!("{settings:?}");
        assert!(!shown.contains("wJalrXUtnFEMI"));
        assert!(!shown.contains("AKIDEXAMPLE"));
    }
}
