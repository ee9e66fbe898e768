use std::sync::Arc;

use arcade_store::{BlobStore, ContentStore};
use arcade_types::{BundleId, RemoteKey};
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::guard::BundleGuards;
use crate::remote::bounded;

/// Outcome of removing one bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// The local bundle directory existed and was deleted.
    pub local_removed: bool,
    /// Remote keys deleted.
    pub remote_deleted: usize,
}

impl RemovalReport {
    /// `true` if the bundle was found in either store.
    pub fn found(&self) -> bool {
        self.local_removed || self.remote_deleted > 0
    }
}

/// Deletes bundles from the content store and, unless disabled, from the
/// remote store.
pub struct BundleRemover {
    content: ContentStore,
    remote: Arc<dyn BlobStore>,
    config: SyncConfig,
    guards: BundleGuards,
}

impl BundleRemover {
    pub fn new(content: ContentStore, remote: Arc<dyn BlobStore>, config: SyncConfig) -> Self {
        Self {
            content,
            remote,
            config,
            guards: BundleGuards::new(),
        }
    }

    /// Share push coordination with the pushers of this process.
    pub fn with_guards(mut self, guards: BundleGuards) -> Self {
        self.guards = guards;
        self
    }

    /// Whether removals also delete the remote copy.
    pub fn propagates(&self) -> bool {
        self.config.enabled && self.config.propagate_removal
    }

    /// Remove a bundle.
    ///
    /// Remote keys go first: if any remote delete fails the local copy is
    /// kept and the error returned, so the removal can simply be retried.
    /// Deleting only the local tree would let the next reconcile pass bring
    /// the bundle back. Pushes of the bundle that are queued are skipped
    /// and one already uploading is waited for before any key is deleted.
    pub async fn remove(&self, id: BundleId) -> SyncResult<RemovalReport> {
        let _permit = self.guards.begin_removal(id).await;
        let mut report = RemovalReport::default();

        if self.propagates() {
            let prefix = RemoteKey::bundle_prefix(&self.config.prefix, &id);
            let timeout = self.config.remote_timeout();
            let keys = bounded(timeout, "list", &prefix, self.remote.list_keys_with_prefix(&prefix)).await?;
            for key in keys {
                match bounded(timeout, "delete", &key, self.remote.delete(&key)).await {
                    Ok(true) => report.remote_deleted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(bundle = %id, key = %key, error = %e, "remote delete failed, keeping local copy");
                        return Err(e);
                    }
                }
            }
        }

        let content = self.content.clone();
        report.local_removed = tokio::task::spawn_blocking(move || content.remove_bundle(&id)).await??;

        info!(
            bundle = %id,
            local = report.local_removed,
            remote_keys = report.remote_deleted,
            "bundle removal finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for BundleRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleRemover")
            .field("content", &self.content)
            .field("propagates", &self.propagates())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puller::ObjectStorePuller;
    use crate::pusher::ObjectStorePusher;
    use crate::testing::{write_tree, ScriptedStore};
    use arcade_store::InMemoryBlobStore;
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        content: ContentStore,
        remote: Arc<InMemoryBlobStore>,
    }

    impl Fixture {
        async fn with_bundles(n: usize) -> (Self, Vec<BundleId>) {
            let dir = tempfile::tempdir().unwrap();
            let content = ContentStore::new(dir.path().join("games"));
            let remote = Arc::new(InMemoryBlobStore::new());
            let pusher = ObjectStorePusher::new(remote.clone(), SyncConfig::default());
            let mut ids = Vec::new();
            for _ in 0..n {
                let bundle = content.create_bundle(BundleId::new()).unwrap();
                write_tree(bundle.root(), &[("index.html", b"<html>"), ("img/a.png", b"png")]);
                pusher.push(bundle.root(), bundle.id()).await.unwrap();
                ids.push(bundle.id());
            }
            (
                Self {
                    _dir: dir,
                    content,
                    remote,
                },
                ids,
            )
        }

        fn remover(&self, config: SyncConfig) -> BundleRemover {
            BundleRemover::new(self.content.clone(), self.remote.clone(), config)
        }
    }

    #[tokio::test]
    async fn removal_deletes_local_and_remote() {
        let (fx, ids) = Fixture::with_bundles(2).await;
        let report = fx.remover(SyncConfig::default()).remove(ids[0]).await.unwrap();

        assert!(report.local_removed);
        assert_eq!(report.remote_deleted, 2);
        assert!(!fx.content.contains(&ids[0]));
        assert!(fx.content.contains(&ids[1]));
        assert!(fx.remote.keys().iter().all(|k| !k.contains(&ids[0].to_string())));
        assert_eq!(fx.remote.len(), 2);
    }

    #[tokio::test]
    async fn removed_bundle_is_not_resurrected() {
        let (fx, ids) = Fixture::with_bundles(1).await;
        fx.remover(SyncConfig::default()).remove(ids[0]).await.unwrap();

        let puller = ObjectStorePuller::new(fx.remote.clone(), fx.content.clone(), SyncConfig::default());
        let report = puller.reconcile().await.unwrap();
        assert_eq!(report.downloaded, 0);
        assert!(!fx.content.contains(&ids[0]));
    }

    #[tokio::test]
    async fn local_only_removal_keeps_remote() {
        let (fx, ids) = Fixture::with_bundles(1).await;
        let config = SyncConfig {
            propagate_removal: false,
            ..SyncConfig::default()
        };
        let remover = fx.remover(config);
        assert!(!remover.propagates());

        let report = remover.remove(ids[0]).await.unwrap();
        assert!(report.local_removed);
        assert_eq!(report.remote_deleted, 0);
        assert_eq!(fx.remote.len(), 2);
    }

    #[tokio::test]
    async fn unknown_bundle_is_not_found() {
        let (fx, _ids) = Fixture::with_bundles(1).await;
        let report = fx.remover(SyncConfig::default()).remove(BundleId::new()).await.unwrap();
        assert!(!report.found());
        assert_eq!(fx.remote.len(), 2);
    }

    #[tokio::test]
    async fn removal_during_push_leaves_nothing_to_resurrect() {
        let dir = tempfile::tempdir().unwrap();
        let content = ContentStore::new(dir.path().join("games"));
        let bundle = content.create_bundle(BundleId::new()).unwrap();
        write_tree(
            bundle.root(),
            &[("index.html", b"<html>"), ("a.js", b"a"), ("b.js", b"b")],
        );
        let id = bundle.id();

        let remote = Arc::new(ScriptedStore {
            put_delay: Some(Duration::from_millis(30)),
            ..ScriptedStore::new()
        });
        let guards = BundleGuards::new();
        let pusher = Arc::new(
            ObjectStorePusher::new(remote.clone(), SyncConfig::default()).with_guards(guards.clone()),
        );
        let remover = BundleRemover::new(content.clone(), remote.clone(), SyncConfig::default())
            .with_guards(guards.clone());

        let push = tokio::spawn({
            let pusher = pusher.clone();
            let root = bundle.root().to_path_buf();
            async move { pusher.push(&root, id).await.unwrap() }
        });
        // Let the first upload start.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = remover.remove(id).await.unwrap();
        let pushed = push.await.unwrap();

        assert_eq!(pushed.uploaded.len(), 3);
        assert_eq!(report.remote_deleted, 3);
        assert!(remote.inner.is_empty());

        let again = pusher.push(bundle.root(), id).await.unwrap();
        assert!(again.skipped_removed);
        assert!(remote.inner.is_empty());

        let puller = ObjectStorePuller::new(remote.clone(), content.clone(), SyncConfig::default());
        assert_eq!(puller.reconcile().await.unwrap().downloaded, 0);
        assert!(!content.contains(&id));
    }

    #[tokio::test]
    async fn remote_only_bundle_is_removed() {
        let (fx, ids) = Fixture::with_bundles(1).await;
        fx.content.remove_bundle(&ids[0]).unwrap();
        let report = fx.remover(SyncConfig::default()).remove(ids[0]).await.unwrap();
        assert!(!report.local_removed);
        assert_eq!(report.remote_deleted, 2);
        assert!(report.found());
    }
}
