use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;

/// Page size used by the bundled backends when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One page of a key listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in ascending order.
    pub keys: Vec<String>,
    /// Token to pass to the next `list_page` call; `None` on the last page.
    pub continuation: Option<String>,
}

impl ListPage {
    /// Cut one page out of an ascending key sequence.
    ///
    /// Keys are taken starting after `after` (or from the first key with
    /// `prefix`), stopping at the first key outside `prefix`. The
    /// continuation token is the last key returned.
    pub fn from_sorted<I>(keys: I, prefix: &str, after: Option<&str>, page_size: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let page_size = page_size.max(1);
        let mut page: Vec<String> = keys
            .into_iter()
            .skip_while(|k| match after {
                Some(after) => k.as_str() <= after,
                None => k.as_str() < prefix,
            })
            .skip_while(|k| k.as_str() < prefix)
            .take_while(|k| k.starts_with(prefix))
            .take(page_size + 1)
            .collect();

        let continuation = if page.len() > page_size {
            page.truncate(page_size);
            page.last().cloned()
        } else {
            None
        };
        Self {
            keys: page,
            continuation,
        }
    }
}

/// Remote key-value blob store.
///
/// This is the only view the sync engine has of the remote side.
/// Credentials, region and endpoint belong to the concrete backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()>;

    /// Fetch the object stored under `key`.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) if it
    /// does not exist.
    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    /// List one page of keys starting with `prefix`.
    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> StoreResult<ListPage>;

    /// Delete the object under `key`. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// List every key starting with `prefix`, following continuation
    /// tokens until the listing is exhausted.
    async fn list_keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_page(prefix, token.as_deref()).await?;
            keys.extend(page.keys);
            match page.continuation {
                Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
                _ => break,
            }
        }
        Ok(keys)
    }
}
