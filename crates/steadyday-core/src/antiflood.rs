//! Per-user minimum interval between handled events.

use indexmap::IndexMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Entries kept before the least recently seen users are forgotten.
pub const MAX_TRACKED_USERS: usize = 10_000;

pub struct AntiFlood {
    delay: Duration,
    max_entries: usize,
    last_seen: Mutex<IndexMap<i64, Instant>>,
}

impl AntiFlood {
    pub fn new(delay: Duration) -> Self {
        Self::with_capacity(delay, MAX_TRACKED_USERS)
    }

    pub fn with_capacity(delay: Duration, max_entries: usize) -> Self {
        Self {
            delay,
            max_entries: max_entries.max(1),
            last_seen: Mutex::new(IndexMap::new()),
        }
    }

    /// Whether an event from `user_id` should be handled now.
    pub async fn check(&self, user_id: i64) -> bool {
        self.check_at(user_id, Instant::now()).await
    }

    /// Like [`check`](Self::check) with an explicit instant.
    ///
    /// Accepted events refresh the user's position; rejected ones do not.
    pub async fn check_at(&self, user_id: i64, now: Instant) -> bool {
        let mut seen = self.last_seen.lock().await;
        if let Some(last) = seen.get(&user_id) {
            if now.saturating_duration_since(*last) < self.delay {
                return false;
            }
        }
        // Re-insert at the back so insertion order tracks recency.
        seen.shift_remove(&user_id);
        seen.insert(user_id, now);
        while seen.len() > self.max_entries {
            seen.shift_remove_index(0);
        }
        true
    }

    pub async fn tracked(&self) -> usize {
        self.last_seen.lock().await.len()
    }
}
