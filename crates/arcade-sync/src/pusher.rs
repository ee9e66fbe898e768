use std::path::{Path, PathBuf};
use std::sync::Arc;

use arcade_store::BlobStore;
use arcade_types::{BundleId, RemoteKey};
use bytes::Bytes;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::guard::BundleGuards;
use crate::remote::bounded;

/// A file that could not be uploaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushFailure {
    /// Remote key, or the local relative path when no key could be formed.
    pub key: String,
    pub error: String,
}

/// Outcome of pushing one bundle.
#[derive(Clone, Debug, Default)]
pub struct PushReport {
    pub uploaded: Vec<RemoteKey>,
    pub failed: Vec<PushFailure>,
    pub bytes: u64,
    /// The bundle was removed before the push could start; nothing was sent.
    pub skipped_removed: bool,
}

impl PushReport {
    /// `true` when every file reached the remote store.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Uploads a bundle's files to the remote blob store.
pub struct ObjectStorePusher {
    remote: Arc<dyn BlobStore>,
    config: SyncConfig,
    guards: BundleGuards,
}

impl ObjectStorePusher {
    pub fn new(remote: Arc<dyn BlobStore>, config: SyncConfig) -> Self {
        Self {
            remote,
            config,
            guards: BundleGuards::new(),
        }
    }

    /// Coordinate with the [`BundleRemover`](crate::BundleRemover) sharing
    /// `guards`, so removed bundles are never pushed again.
    pub fn with_guards(mut self, guards: BundleGuards) -> Self {
        self.guards = guards;
        self
    }

    pub fn remote(&self) -> &Arc<dyn BlobStore> {
        &self.remote
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Upload every regular file below `bundle_root` as
    /// `<prefix>/<bundle-id>/<relative-path>`.
    ///
    /// Files are visited in sorted order and symlinks are not followed.
    /// Failing files are retried per the configured policy, then recorded in
    /// the report; they do not stop the remaining uploads. Only a failure to
    /// walk the bundle directory itself is returned as an error.
    pub async fn push(&self, bundle_root: &Path, bundle_id: BundleId) -> SyncResult<PushReport> {
        let Some(_permit) = self.guards.begin_push(bundle_id).await else {
            info!(bundle = %bundle_id, "bundle removed, push skipped");
            return Ok(PushReport {
                skipped_removed: true,
                ..PushReport::default()
            });
        };
        let root = bundle_root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || collect_files(&root)).await??;

        let mut report = PushReport::default();
        for rel in files {
            let key = match RemoteKey::from_relative_path(&self.config.prefix, bundle_id, &rel) {
                Ok(key) => key,
                Err(e) => {
                    warn!(bundle = %bundle_id, path = %rel.display(), error = %e, "skipping unpushable file");
                    report.failed.push(PushFailure {
                        key: rel.display().to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let data = match tokio::fs::read(bundle_root.join(&rel)).await {
                Ok(data) => Bytes::from(data),
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to read file for upload");
                    report.failed.push(PushFailure {
                        key: key.to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let len = data.len() as u64;
            match self.put_with_retry(&key.to_string(), data).await {
                Ok(()) => {
                    debug!(key = %key, bytes = len, "uploaded");
                    report.bytes += len;
                    report.uploaded.push(key);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "upload failed");
                    report.failed.push(PushFailure {
                        key: key.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            bundle = %bundle_id,
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "bundle push finished"
        );
        Ok(report)
    }

    async fn put_with_retry(&self, key: &str, data: Bytes) -> SyncResult<()> {
        let policy = self.config.retry;
        let mut attempt = 1;
        loop {
            let call = self.remote.put(key, data.clone());
            match bounded(self.config.remote_timeout(), "put", key, call).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < policy.attempts() => {
                    debug!(key, attempt, error = %e, "upload attempt failed, retrying");
                    tokio::time::sleep(policy.backoff()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for ObjectStorePusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorePusher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Relative paths of all regular files below `root`, in sorted walk order.
fn collect_files(root: &Path) -> SyncResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_path_buf());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::testing::{write_tree, ScriptedStore};
    use arcade_store::InMemoryBlobStore;

    fn fast_config() -> SyncConfig {
        SyncConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                backoff_ms: 1,
            },
            remote_timeout_ms: 5_000,
            ..SyncConfig::default()
        }
    }

    #[tokio::test]
    async fn pushes_every_file_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("index.html", b"<html>"), ("img/logo.png", b"png")]);
        let id = BundleId::new();
        let remote = Arc::new(InMemoryBlobStore::new());
        let pusher = ObjectStorePusher::new(remote.clone(), fast_config());

        let report = pusher.push(dir.path(), id).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.bytes, 9);
        assert_eq!(
            remote.keys(),
            vec![format!("games/{id}/img/logo.png"), format!("games/{id}/index.html")]
        );
        assert_eq!(&remote.object(&format!("games/{id}/index.html")).unwrap()[..], b"<html>");
    }

    #[tokio::test]
    async fn pushing_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("index.html", b"<html>"), ("a.js", b"1")]);
        let id = BundleId::new();
        let remote = Arc::new(InMemoryBlobStore::new());
        let pusher = ObjectStorePusher::new(remote.clone(), fast_config());

        pusher.push(dir.path(), id).await.unwrap();
        let snapshot = |remote: &InMemoryBlobStore| -> Vec<(String, Bytes)> {
            remote
                .keys()
                .into_iter()
                .map(|k| {
                    let data = remote.object(&k).unwrap();
                    (k, data)
                })
                .collect()
        };
        let before = snapshot(remote.as_ref());
        assert_eq!(before.len(), 2);

        pusher.push(dir.path(), id).await.unwrap();
        assert_eq!(snapshot(remote.as_ref()), before);
        assert_eq!(remote.put_count(), 4);
    }

    #[tokio::test]
    async fn failing_file_does_not_abort_push() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[("a.js", b"a"), ("bad.js", b"b"), ("c.js", b"c")],
        );
        let id = BundleId::new();
        let remote = Arc::new(ScriptedStore {
            fail_put_suffix: Some("bad.js".into()),
            ..ScriptedStore::new()
        });
        let pusher = ObjectStorePusher::new(remote.clone(), fast_config());

        let report = pusher.push(dir.path(), id).await.unwrap();
        assert_eq!(report.uploaded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, format!("games/{id}/bad.js"));
        assert_eq!(remote.inner.len(), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("index.html", b"<html>")]);
        let remote = Arc::new(ScriptedStore::new());
        remote
            .transient_put_failures
            .store(2, std::sync::atomic::Ordering::SeqCst);
        let pusher = ObjectStorePusher::new(remote.clone(), fast_config());

        let report = pusher.push(dir.path(), BundleId::new()).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(remote.inner.len(), 1);
    }

    #[tokio::test]
    async fn single_attempt_policy_gives_up_immediately() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("index.html", b"<html>")]);
        let remote = Arc::new(ScriptedStore::new());
        remote
            .transient_put_failures
            .store(1, std::sync::atomic::Ordering::SeqCst);
        let config = SyncConfig {
            retry: RetryPolicy::none(),
            ..fast_config()
        };
        let pusher = ObjectStorePusher::new(remote.clone(), config);

        let report = pusher.push(dir.path(), BundleId::new()).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(remote.inner.is_empty());
    }

    #[tokio::test]
    async fn slow_remote_times_out() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("index.html", b"<html>")]);
        let remote = Arc::new(ScriptedStore {
            put_delay: Some(std::time::Duration::from_secs(5)),
            ..ScriptedStore::new()
        });
        let config = SyncConfig {
            retry: RetryPolicy::none(),
            remote_timeout_ms: 20,
            ..SyncConfig::default()
        };
        let pusher = ObjectStorePusher::new(remote, config);

        let report = pusher.push(dir.path(), BundleId::new()).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn missing_bundle_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pusher = ObjectStorePusher::new(Arc::new(InMemoryBlobStore::new()), fast_config());
        assert!(pusher.push(&dir.path().join("absent"), BundleId::new()).await.is_err());
    }

    #[test]
    fn collected_files_are_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[("z.js", b""), ("a/b.css", b""), ("a/a.png", b""), ("m.html", b"")],
        );
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        let files = collect_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a/a.png"),
                PathBuf::from("a/b.css"),
                PathBuf::from("m.html"),
                PathBuf::from("z.js"),
            ]
        );
    }
}
