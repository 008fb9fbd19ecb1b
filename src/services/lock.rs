use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use super::clock::Clock;

/// Cooperative per-booking guard for swaps and moves. Acquisition is
/// all-or-nothing and never waits: a caller that finds an id held backs off.
/// Entries older than `timeout` are treated as released so a lost guard
/// cannot wedge a booking forever.
pub struct InFlightLocks {
    clock: Arc<dyn Clock>,
    timeout: Duration,
    held: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InFlightLocks {
    pub fn new(clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            clock,
            timeout,
            held: Mutex::new(HashMap::new()),
        }
    }

    pub fn try_acquire(self: &Arc<Self>, ids: &[&str]) -> Option<LockGuard> {
        let now = self.clock.now();
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());

        let busy = ids.iter().any(|id| match held.get(*id) {
            Some(acquired_at) => now - *acquired_at < self.timeout,
            None => false,
        });
        if busy {
            return None;
        }

        for id in ids {
            held.insert(id.to_string(), now);
        }
        Some(LockGuard {
            locks: Arc::clone(self),
            ids: ids.iter().map(|id| id.to_string()).collect(),
            acquired_at: now,
        })
    }

    pub fn is_locked(&self, id: &str) -> bool {
        let now = self.clock.now();
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .is_some_and(|acquired_at| now - *acquired_at < self.timeout)
    }

    /// Only drops entries this guard still owns; a timed-out guard must not
    /// release a newer holder.
    fn release(&self, ids: &[String], acquired_at: DateTime<Utc>) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        for id in ids {
            if held.get(id) == Some(&acquired_at) {
                held.remove(id);
            }
        }
    }
}

/// Releases its ids on drop, whichever way the operation ends.
pub struct LockGuard {
    locks: Arc<InFlightLocks>,
    ids: Vec<String>,
    acquired_at: DateTime<Utc>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locks.release(&self.ids, self.acquired_at);
    }
}

/// Per-booking request counter. A response is only applied when it belongs
/// to the latest request issued for that booking.
#[derive(Default)]
pub struct RequestGenerations {
    latest: Mutex<HashMap<String, u64>>,
}

impl RequestGenerations {
    pub fn next(&self, id: &str) -> u64 {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let generation = latest.entry(id.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    pub fn is_current(&self, id: &str, generation: u64) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .is_some_and(|latest| *latest == generation)
    }
}
