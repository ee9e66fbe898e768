use std::path::PathBuf;
use std::sync::Arc;

use arcade_types::BundleId;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::pusher::ObjectStorePusher;

/// A bundle waiting to be pushed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushJob {
    pub bundle_id: BundleId,
    pub root: PathBuf,
}

/// Bounded pool of background push workers.
///
/// Jobs flow through a bounded channel, so a burst of uploads applies
/// back-pressure to the uploaders instead of spawning unbounded tasks.
pub struct PushQueue {
    handle: PushQueueHandle,
    workers: Vec<JoinHandle<()>>,
}

/// Cloneable submission side of a [`PushQueue`].
#[derive(Clone, Debug)]
pub struct PushQueueHandle {
    tx: mpsc::Sender<PushJob>,
}

impl PushQueue {
    /// Spawn `workers` tasks draining a channel of `capacity` jobs.
    pub fn start(pusher: Arc<ObjectStorePusher>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..workers.max(1))
            .map(|worker| {
                let rx = rx.clone();
                let pusher = pusher.clone();
                tokio::spawn(async move { run_worker(worker, rx, pusher).await })
            })
            .collect();
        Self {
            handle: PushQueueHandle { tx },
            workers,
        }
    }

    pub fn handle(&self) -> PushQueueHandle {
        self.handle.clone()
    }

    /// Stop accepting jobs from this queue's own handle and wait for the
    /// workers to finish.
    ///
    /// Workers exit once every [`PushQueueHandle`] has been dropped and the
    /// channel is empty, so jobs already queued are still pushed.
    pub async fn shutdown(self) -> SyncResult<()> {
        drop(self.handle);
        for worker in self.workers {
            worker.await?;
        }
        info!("push queue drained");
        Ok(())
    }
}

impl PushQueueHandle {
    /// Queue a bundle for pushing, waiting while the queue is full.
    pub async fn enqueue(&self, job: PushJob) -> SyncResult<()> {
        debug!(bundle = %job.bundle_id, "push queued");
        self.tx.send(job).await.map_err(|_| SyncError::QueueClosed)
    }

    /// Jobs accepted but not yet picked up by a worker.
    pub fn backlog(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

async fn run_worker(worker: usize, rx: Arc<Mutex<mpsc::Receiver<PushJob>>>, pusher: Arc<ObjectStorePusher>) {
    loop {
        let job = rx.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };
        match pusher.push(&job.root, job.bundle_id).await {
            Ok(report) if report.is_complete() => {
                debug!(worker, bundle = %job.bundle_id, files = report.uploaded.len(), "push job done");
            }
            Ok(report) => {
                warn!(
                    worker,
                    bundle = %job.bundle_id,
                    uploaded = report.uploaded.len(),
                    failed = report.failed.len(),
                    "push job finished with failures"
                );
            }
            Err(e) => warn!(worker, bundle = %job.bundle_id, error = %e, "push job failed"),
        }
    }
    debug!(worker, "push worker stopped");
}
