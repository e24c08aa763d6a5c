use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated from background completions. Relaxed ordering; the
/// values are only read for reporting.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    fetches_started: AtomicU64,
    fetches_failed: AtomicU64,
    auto_reload_checks: AtomicU64,
    auto_reload_changes: AtomicU64,
    polls_issued: AtomicU64,
    broadcasts_enqueued: AtomicU64,
    broadcasts_delivered: AtomicU64,
    rewards_granted: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncMetricsSnapshot {
    pub fetches_started: u64,
    pub fetches_failed: u64,
    pub auto_reload_checks: u64,
    pub auto_reload_changes: u64,
    pub polls_issued: u64,
    pub broadcasts_enqueued: u64,
    pub broadcasts_delivered: u64,
    pub rewards_granted: u64,
}

impl SyncMetrics {
    pub fn fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auto_reload_checked(&self) {
        self.auto_reload_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auto_reload_changed(&self) {
        self.auto_reload_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn poll_issued(&self) {
        self.polls_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn broadcast_enqueued(&self) {
        self.broadcasts_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn broadcast_delivered(&self) {
        self.broadcasts_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reward_granted(&self) {
        self.rewards_granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            auto_reload_checks: self.auto_reload_checks.load(Ordering::Relaxed),
            auto_reload_changes: self.auto_reload_changes.load(Ordering::Relaxed),
            polls_issued: self.polls_issued.load(Ordering::Relaxed),
            broadcasts_enqueued: self.broadcasts_enqueued.load(Ordering::Relaxed),
            broadcasts_delivered: self.broadcasts_delivered.load(Ordering::Relaxed),
            rewards_granted: self.rewards_granted.load(Ordering::Relaxed),
        }
    }
}
