//! Remote object store synchronization for arcade.
//!
//! Every instance keeps a full copy of every bundle in its local content
//! store, and the remote blob store holds the union. Two directions keep
//! them together:
//!
//! - **push** -- after a successful ingestion the bundle's files are
//!   uploaded under `<prefix>/<bundle-id>/<path>` ([`ObjectStorePusher`]),
//!   normally through the bounded background [`PushQueue`];
//! - **pull** -- a periodic pass lists the remote prefix and downloads
//!   every key whose local file is missing ([`ObjectStorePuller`], driven
//!   by [`ReconcileLoop`]).
//!
//! Existence wins: a file that is already present locally is never
//! overwritten or compared. Removal ([`BundleRemover`]) deletes the remote
//! copy first so that the next pull does not bring the bundle back, and
//! [`BundleGuards`] keeps a concurrent push from re-uploading it.
//!
//! Per-file failures are logged and counted in the pass report; they never
//! abort the remaining work.

pub mod config;
pub mod error;
pub mod guard;
pub mod puller;
pub mod pusher;
pub mod queue;
mod remote;
pub mod removal;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use config::{RetryPolicy, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use guard::{BundleGuards, BundlePermit};
pub use puller::{ObjectStorePuller, PullReport};
pub use pusher::{ObjectStorePusher, PushFailure, PushReport};
pub use queue::{PushJob, PushQueue, PushQueueHandle};
pub use removal::{BundleRemover, RemovalReport};
pub use scheduler::ReconcileLoop;
