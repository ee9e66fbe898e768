//! Per-bundle coordination between pushes and removals.
//!
//! A push holds its bundle's lock for the whole upload. A removal first
//! marks the bundle removed, so later pushes of it become no-ops, then takes
//! the same lock, which waits out an upload already in flight. Remote keys
//! are only deleted after that, so no push can re-create them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use arcade_types::BundleId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
struct GuardState {
    locks: HashMap<BundleId, Arc<AsyncMutex<()>>>,
    removed: HashSet<BundleId>,
}

/// Shared by every pusher and remover of one process.
#[derive(Clone, Default)]
pub struct BundleGuards {
    state: Arc<Mutex<GuardState>>,
}

/// Exclusive access to one bundle's remote keys; released on drop.
pub struct BundlePermit {
    id: BundleId,
    guard: Option<OwnedMutexGuard<()>>,
    guards: BundleGuards,
}

impl BundleGuards {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, id: BundleId) -> Arc<AsyncMutex<()>> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.locks.entry(id).or_default().clone()
    }

    fn permit(&self, id: BundleId, guard: OwnedMutexGuard<()>) -> BundlePermit {
        BundlePermit {
            id,
            guard: Some(guard),
            guards: self.clone(),
        }
    }

    pub fn is_removed(&self, id: &BundleId) -> bool {
        self.state.lock().expect("lock poisoned").removed.contains(id)
    }

    /// Wait for the bundle's lock to push it. `None` if it has been removed.
    pub async fn begin_push(&self, id: BundleId) -> Option<BundlePermit> {
        if self.is_removed(&id) {
            return None;
        }
        let permit = self.permit(id, self.lock_for(id).lock_owned().await);
        // A removal may have been marked while this push waited.
        if self.is_removed(&id) {
            return None;
        }
        Some(permit)
    }

    /// Mark the bundle removed and wait until no push of it is running.
    pub async fn begin_removal(&self, id: BundleId) -> BundlePermit {
        self.state.lock().expect("lock poisoned").removed.insert(id);
        self.permit(id, self.lock_for(id).lock_owned().await)
    }

    /// Bundles with a lock entry; for tests.
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.state.lock().expect("lock poisoned").locks.len()
    }
}

impl Drop for BundlePermit {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut state = self.guards.state.lock().expect("lock poisoned");
        // Only the map still refers to the lock: nobody holds or awaits it.
        if state
            .locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            state.locks.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for BundleGuards {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("lock poisoned");
        f.debug_struct("BundleGuards")
            .field("locked", &state.locks.len())
            .field("removed", &state.removed.len())
            .finish()
    }
}
