use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a failed upload of a single file is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per file, including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Fixed pause between attempts, in milliseconds.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

/// Synchronization settings shared by push, pull and removal.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// When `false` no push workers or reconcile loop are started.
    pub enabled: bool,
    /// Remote key namespace; keys are `<prefix>/<bundle-id>/<path>`.
    pub prefix: String,
    /// Pause between the end of one reconcile pass and the start of the next.
    pub interval_secs: u64,
    /// Number of background push workers.
    pub workers: usize,
    /// Push jobs that may wait in the queue before `enqueue` blocks.
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
    /// Upper bound on any single remote call.
    pub remote_timeout_ms: u64,
    /// Delete a bundle's remote keys when the bundle is removed locally.
    pub propagate_removal: bool,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Listing prefix covering every bundle: `"<prefix>/"`, or `""` when
    /// the prefix is empty.
    pub fn listing_prefix(&self) -> String {
        let trimmed = self.prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "games".to_string(),
            interval_secs: 10 * 60,
            workers: 2,
            queue_capacity: 64,
            retry: RetryPolicy::default(),
            remote_timeout_ms: 60_000,
            propagate_removal: true,
        }
    }
}
