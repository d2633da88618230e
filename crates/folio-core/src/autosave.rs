//! Debounced autosave decisions.
//!
//! A pure policy layered on the synchronous page API: it owns no timer and
//! spawns nothing. The caller reports edits and flushes as they happen and
//! asks `should_flush` from its own tick. A flush is due once edits have
//! been idle for `idle`, or once `max_interval` has passed since the last
//! flush while edits are still pending.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct AutosavePolicy {
    /// Quiet period after the last edit before a flush is due.
    pub idle: Duration,
    /// Upper bound between flushes while editing continues.
    pub max_interval: Duration,
}

impl Default for AutosavePolicy {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(5),
            max_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct Autosave {
    policy: AutosavePolicy,
    last_flush: Instant,
    last_edit: Option<Instant>,
}

impl Autosave {
    pub fn new(policy: AutosavePolicy) -> Self {
        Self {
            policy,
            last_flush: Instant::now(),
            last_edit: None,
        }
    }

    /// Call when the page text changed.
    pub fn record_edit(&mut self, now: Instant) {
        self.last_edit = Some(now);
    }

    /// Call after a successful flush.
    pub fn record_flush(&mut self, now: Instant) {
        self.last_flush = now;
        self.last_edit = None;
    }

    /// Whether a flush is due at `now`. Quiescent state (no pending edits)
    /// never flushes.
    pub fn should_flush(&self, now: Instant) -> bool {
        let Some(last_edit) = self.last_edit else {
            return false;
        };
        now.duration_since(last_edit) >= self.policy.idle
            || now.duration_since(self.last_flush) >= self.policy.max_interval
    }
}
