use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::puller::{ObjectStorePuller, PullReport};

/// Periodic driver for [`ObjectStorePuller::reconcile`].
///
/// Passes run one at a time on a single task: the next pass is scheduled
/// `interval` after the previous one *finishes*, so passes never overlap
/// however long one takes.
pub struct ReconcileLoop {
    puller: Arc<ObjectStorePuller>,
    interval: Duration,
}

impl ReconcileLoop {
    pub fn new(puller: Arc<ObjectStorePuller>, interval: Duration) -> Self {
        Self { puller, interval }
    }

    /// A loop using the puller's configured interval.
    pub fn from_puller(puller: Arc<ObjectStorePuller>) -> Self {
        let interval = puller.config().interval();
        Self::new(puller, interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single pass, logging instead of returning its error.
    pub async fn run_once(&self) -> Option<PullReport> {
        match self.puller.reconcile().await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "reconcile pass failed");
                None
            }
        }
    }

    /// Run passes until `shutdown` turns `true` (or its sender is dropped).
    ///
    /// The first pass starts immediately. Shutdown is checked between passes
    /// and while sleeping; a pass in progress always runs to completion.
    /// Returns the number of passes run.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut passes = 0u64;
        info!(interval_secs = self.interval.as_secs(), "reconcile loop started");
        'outer: loop {
            if *shutdown.borrow() {
                break;
            }
            self.run_once().await;
            passes += 1;

            let wake = Instant::now() + self.interval;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(wake) => break,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break 'outer;
                        }
                    }
                }
            }
        }
        info!(passes, "reconcile loop stopped");
        passes
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<u64> {
        tokio::spawn(self.run(shutdown))
    }
}
