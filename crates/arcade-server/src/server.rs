use std::future::Future;
use std::sync::Arc;

use arcade_ingest::ArchiveIngestor;
use arcade_store::ContentStore;
use arcade_sync::{
    BundleGuards, BundleRemover, ObjectStorePuller, ObjectStorePusher, PushQueue, ReconcileLoop,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::StaticTokenDirectory;
use crate::config::ArcadeConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// The arcade service: HTTP surface plus background sync.
pub struct ArcadeServer {
    config: ArcadeConfig,
}

impl ArcadeServer {
    pub fn new(config: ArcadeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArcadeConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self, state: AppState) -> axum::Router {
        build_router(state, self.config.server.max_upload_bytes)
    }

    /// Start push workers and the reconcile loop (unless sync is disabled),
    /// then serve requests until `shutdown` resolves.
    ///
    /// On shutdown the listener stops accepting, in-flight requests finish,
    /// the reconcile loop completes its current pass and queued pushes are
    /// drained before this returns.
    pub async fn serve<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let content = ContentStore::new(&self.config.server.content_root);
        content.ensure_root()?;
        let remote = self.config.remote.build()?;
        let sync = &self.config.sync;

        let ingestor = Arc::new(ArchiveIngestor::new(content.clone(), self.config.ingest.clone()));
        let tokens = Arc::new(StaticTokenDirectory::from_entries(&self.config.auth.tokens));
        if tokens.is_empty() {
            warn!("no upload tokens configured; every upload will be rejected");
        }
        let guards = BundleGuards::new();
        let remover = Arc::new(
            BundleRemover::new(content.clone(), remote.clone(), sync.clone()).with_guards(guards.clone()),
        );
        let mut state = AppState::new(ingestor, tokens, remover)
            .with_admin_token(self.config.auth.admin_token.clone());

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut queue = None;
        let mut reconcile = None;
        if sync.enabled {
            let pusher = Arc::new(ObjectStorePusher::new(remote.clone(), sync.clone()).with_guards(guards));
            let push_queue = PushQueue::start(pusher, sync.workers, sync.queue_capacity);
            state = state.with_push_queue(push_queue.handle());
            queue = Some(push_queue);

            let puller = Arc::new(ObjectStorePuller::new(remote.clone(), content.clone(), sync.clone()));
            reconcile = Some(ReconcileLoop::from_puller(puller).spawn(stop_rx));
        } else {
            info!("remote sync disabled");
        }

        let app = self.router(state);
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        info!(addr = %self.config.server.bind_addr, content_root = %content.root().display(), "arcade server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!("http server stopped, finishing background work");
        let _ = stop_tx.send(true);
        if let Some(task) = reconcile {
            task.await.map_err(|e| ServerError::Internal(e.to_string()))?;
        }
        if let Some(queue) = queue {
            queue.shutdown().await?;
        }
        Ok(())
    }
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;

    #[test]
    fn server_construction() {
        let server = ArcadeServer::new(ArcadeConfig::default());
        assert_eq!(server.config().server.bind_addr.port(), 3001);
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ArcadeConfig::default();
        config.server.bind_addr = "127.0.0.1:0".parse().unwrap();
        config.server.content_root = dir.path().join("games");
        config.remote = RemoteConfig::Memory;

        let server = ArcadeServer::new(config);
        let result = tokio::time::timeout(std::time::Duration::from_secs(10), server.serve(async {})).await;
        assert!(result.unwrap().is_ok());
        assert!(dir.path().join("games").is_dir());
    }
}
