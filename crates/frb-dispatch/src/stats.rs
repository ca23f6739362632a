//! Run-wide dispatch counters.
//!
//! All counters use relaxed ordering; they only feed the exit summary.

use std::sync::atomic::{AtomicU64, Ordering};

use frb_core::ResultCode;
use serde::{Deserialize, Serialize};

/// Atomic counters shared by the lanes and the collector.
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    faulted: AtomicU64,
    deduplicated: AtomicU64,
    skipped_processed: AtomicU64,
}

impl DispatchStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A worker was launched.
    #[inline]
    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// A submission was refused because the file was already in flight.
    #[inline]
    pub fn record_duplicate(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    /// Backlog files skipped because the completion log lists them.
    #[inline]
    pub fn record_skipped(&self, count: u64) {
        self.skipped_processed.fetch_add(count, Ordering::Relaxed);
    }

    /// A result was collected.
    pub fn record_result(&self, code: ResultCode) {
        let counter = if code.is_success() {
            &self.succeeded
        } else if code.is_fault() {
            &self.faulted
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy.
    #[must_use]
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            skipped_processed: self.skipped_processed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    /// Workers launched.
    pub dispatched: u64,
    /// Results with code 0.
    pub succeeded: u64,
    /// Results with a positive code from the search.
    pub failed: u64,
    /// Results with a dispatcher-observed fault code.
    pub faulted: u64,
    /// Submissions refused as already in flight.
    pub deduplicated: u64,
    /// Backlog files skipped as already processed.
    pub skipped_processed: u64,
}

impl DispatchSnapshot {
    /// Results collected so far.
    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.faulted
    }

    /// Workers launched whose result has not been collected.
    #[must_use]
    pub const fn outstanding(&self) -> u64 {
        self.dispatched.saturating_sub(self.completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_are_classified() {
        let stats = DispatchStats::new();
        for _ in 0..4 {
            stats.record_dispatch();
        }
        stats.record_result(ResultCode::SUCCESS);
        stats.record_result(ResultCode::new(5));
        stats.record_result(ResultCode::TIMED_OUT);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.faulted, 1);
        assert_eq!(snapshot.completed(), 3);
        assert_eq!(snapshot.outstanding(), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = DispatchStats::new();
        stats.record_dispatch();
        stats.record_dispatch();
        stats.record_result(ResultCode::SUCCESS);
        stats.record_duplicate();
        stats.record_skipped(3);

        insta::assert_json_snapshot!(stats.snapshot(), @r#"
        {
          "dispatched": 2,
          "succeeded": 1,
          "failed": 0,
          "faulted": 0,
          "deduplicated": 1,
          "skipped_processed": 3
        }
        "#);
    }
}
