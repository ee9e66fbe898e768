use std::sync::Arc;

use arcade_ingest::ArchiveIngestor;
use arcade_store::ContentStore;
use arcade_sync::{BundleRemover, PushQueueHandle};

use crate::auth::TokenDirectory;

/// Everything a request handler may touch.
///
/// Built once at startup and cloned into each request; all fields are
/// cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<ArchiveIngestor>,
    pub tokens: Arc<dyn TokenDirectory>,
    pub remover: Arc<BundleRemover>,
    pub admin_token: Option<Arc<str>>,
    /// `None` when remote sync is disabled.
    pub push_queue: Option<PushQueueHandle>,
}

impl AppState {
    pub fn new(
        ingestor: Arc<ArchiveIngestor>,
        tokens: Arc<dyn TokenDirectory>,
        remover: Arc<BundleRemover>,
    ) -> Self {
        Self {
            ingestor,
            tokens,
            remover,
            admin_token: None,
            push_queue: None,
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.map(Arc::from);
        self
    }

    pub fn with_push_queue(mut self, queue: PushQueueHandle) -> Self {
        self.push_queue = Some(queue);
        self
    }

    pub fn content(&self) -> &ContentStore {
        self.ingestor.content()
    }
}
