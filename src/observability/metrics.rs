//! Kernel counters
//!
//! - Counters only, monotonic, reset only on process start
//! - Thread-safe via relaxed atomics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct KernelMetrics {
    mutations_applied: AtomicU64,
    validation_rejections: AtomicU64,
    snapshots_written: AtomicU64,
    publishes_rejected: AtomicU64,
    verifications_passed: AtomicU64,
    verifications_failed: AtomicU64,
    verification_timeouts: AtomicU64,
    promotions: AtomicU64,
    retrievals_served: AtomicU64,
    retrievals_refused: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub mutations_applied: u64,
    pub validation_rejections: u64,
    pub snapshots_written: u64,
    pub publishes_rejected: u64,
    pub verifications_passed: u64,
    pub verifications_failed: u64,
    pub verification_timeouts: u64,
    pub promotions: u64,
    pub retrievals_served: u64,
    pub retrievals_refused: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl KernelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_mutations(&self) {
        bump(&self.mutations_applied);
    }

    pub fn increment_validation_rejections(&self) {
        bump(&self.validation_rejections);
    }

    pub fn increment_snapshots(&self) {
        bump(&self.snapshots_written);
    }

    pub fn increment_publishes_rejected(&self) {
        bump(&self.publishes_rejected);
    }

    /// Records one verification outcome. Timeouts also count as failures.
    pub fn record_verification(&self, ok: bool, timed_out: bool) {
        if ok {
            bump(&self.verifications_passed);
        } else {
            bump(&self.verifications_failed);
        }
        if timed_out {
            bump(&self.verification_timeouts);
        }
    }

    pub fn increment_promotions(&self) {
        bump(&self.promotions);
    }

    pub fn increment_retrievals_served(&self) {
        bump(&self.retrievals_served);
    }

    pub fn increment_retrievals_refused(&self) {
        bump(&self.retrievals_refused);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            mutations_applied: load(&self.mutations_applied),
            validation_rejections: load(&self.validation_rejections),
            snapshots_written: load(&self.snapshots_written),
            publishes_rejected: load(&self.publishes_rejected),
            verifications_passed: load(&self.verifications_passed),
            verifications_failed: load(&self.verifications_failed),
            verification_timeouts: load(&self.verification_timeouts),
            promotions: load(&self.promotions),
            retrievals_served: load(&self.retrievals_served),
            retrievals_refused: load(&self.retrievals_refused),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        assert_eq!(KernelMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_timeout_counts_as_failure() {
        let metrics = KernelMetrics::new();
        metrics.record_verification(false, true);
        metrics.record_verification(true, false);
        let snap = metrics.snapshot();
        assert_eq!(snap.verifications_failed, 1);
        assert_eq!(snap.verification_timeouts, 1);
        assert_eq!(snap.verifications_passed, 1);
    }
}
