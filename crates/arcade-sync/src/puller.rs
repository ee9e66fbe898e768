use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::Arc;

use arcade_store::{BlobStore, ContentStore};
use arcade_types::RemoteKey;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::bounded;

/// Prefix of in-flight download files. Starts with a dot so the playback
/// layer never serves one.
const PARTIAL_PREFIX: &str = ".arcade-pull-";

/// Outcome of one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Keys returned by the remote listing.
    pub listed: usize,
    pub downloaded: usize,
    /// Keys whose local file was already present.
    pub skipped_existing: usize,
    /// Keys that do not name a file of a bundle.
    pub skipped_invalid: usize,
    pub failed: usize,
}

/// Brings the local content store up to date with the remote store.
pub struct ObjectStorePuller {
    remote: Arc<dyn BlobStore>,
    content: ContentStore,
    config: SyncConfig,
}

impl ObjectStorePuller {
    pub fn new(remote: Arc<dyn BlobStore>, content: ContentStore, config: SyncConfig) -> Self {
        Self {
            remote,
            content,
            config,
        }
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one pass: list every key under the prefix and download those
    /// whose local file is missing.
    ///
    /// A file that exists locally is never overwritten, whatever its
    /// contents. A listing failure aborts the pass; failures on single keys
    /// are counted and the pass moves on.
    pub async fn reconcile(&self) -> SyncResult<PullReport> {
        let keys = self.list_all().await?;
        let mut report = PullReport {
            listed: keys.len(),
            ..PullReport::default()
        };

        for raw in keys {
            let key = match RemoteKey::parse(&self.config.prefix, &raw) {
                Ok(key) => key,
                Err(e) => {
                    debug!(key = %raw, error = %e, "ignoring remote key");
                    report.skipped_invalid += 1;
                    continue;
                }
            };

            let local = key.to_local_path(self.content.root());
            if tokio::fs::symlink_metadata(&local).await.is_ok() {
                report.skipped_existing += 1;
                continue;
            }

            match self.download(&raw, &local).await {
                Ok(true) => {
                    debug!(key = %raw, "downloaded");
                    report.downloaded += 1;
                }
                // Someone else created the file since the existence check.
                Ok(false) => report.skipped_existing += 1,
                Err(e) => {
                    warn!(key = %raw, error = %e, "download failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            listed = report.listed,
            downloaded = report.downloaded,
            skipped_existing = report.skipped_existing,
            skipped_invalid = report.skipped_invalid,
            failed = report.failed,
            "reconcile pass finished"
        );
        Ok(report)
    }

    /// Follow continuation tokens until the listing is exhausted, bounding
    /// each page request separately.
    async fn list_all(&self) -> SyncResult<Vec<String>> {
        let prefix = self.config.listing_prefix();
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let call = self.remote.list_page(&prefix, token.as_deref());
            let page = bounded(self.config.remote_timeout(), "list", &prefix, call).await?;
            keys.extend(page.keys);
            match page.continuation {
                Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
                Some(next) => {
                    warn!(prefix = %prefix, token = %next, "listing repeated its continuation token");
                    break;
                }
                None => break,
            }
        }
        Ok(keys)
    }

    async fn download(&self, key: &str, local: &Path) -> SyncResult<bool> {
        let data = bounded(self.config.remote_timeout(), "get", key, self.remote.get(key)).await?;
        let local = local.to_path_buf();
        tokio::task::spawn_blocking(move || write_new(&local, &data)).await?
    }
}

impl std::fmt::Debug for ObjectStorePuller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorePuller")
            .field("content", &self.content)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Write `data` to `path` unless `path` already exists.
///
/// The bytes land in a temporary sibling first and are linked into place
/// without clobbering, so `path` is either absent or complete. Returns
/// `false` if `path` appeared in the meantime.
fn write_new(path: &Path, data: &Bytes) -> SyncResult<bool> {
    let parent = path
        .parent()
        .ok_or_else(|| SyncError::Io(std::io::Error::new(ErrorKind::InvalidInput, "no parent directory")))?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .tempfile_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}
