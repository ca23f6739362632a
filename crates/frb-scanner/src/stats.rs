//! Backlog scan statistics with atomic counters.
//!
//! All counters use [`Relaxed`](std::sync::atomic::Ordering::Relaxed)
//! ordering. They are informational and don't require strict ordering.
//!
//! # Examples
//!
//! ```
//! use frb_scanner::ScanStats;
//!
//! let stats = ScanStats::new();
//! stats.increment_discovered();
//! stats.increment_submitted();
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.discovered, 1);
//! assert_eq!(snapshot.pending(), 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters for one backlog scan.
#[derive(Debug, Default)]
pub struct ScanStats {
    /// Matching files found in the search directory.
    discovered: AtomicU64,
    /// Files skipped because the completion log already lists them.
    already_processed: AtomicU64,
    /// Files for which a worker was launched.
    submitted: AtomicU64,
    /// Files skipped because the live watch was already processing them.
    in_flight: AtomicU64,
}

impl ScanStats {
    /// Creates a new [`ScanStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the discovered files counter.
    #[inline]
    pub fn increment_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the already-processed counter.
    #[inline]
    pub fn increment_already_processed(&self) {
        self.already_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the submitted counter.
    #[inline]
    pub fn increment_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the in-flight duplicate counter.
    #[inline]
    pub fn increment_in_flight(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            discovered: self.discovered.load(Ordering::Relaxed),
            already_processed: self.already_processed.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`ScanStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Matching files found in the search directory.
    pub discovered: u64,
    /// Files skipped because the completion log already lists them.
    pub already_processed: u64,
    /// Files for which a worker was launched.
    pub submitted: u64,
    /// Files skipped because the live watch was already processing them.
    pub in_flight: u64,
}

impl StatsSnapshot {
    /// Returns how many discovered files were neither submitted nor skipped.
    ///
    /// Non-zero only when the scan was stopped early.
    #[inline]
    #[must_use]
    pub const fn pending(&self) -> u64 {
        self.discovered
            .saturating_sub(self.already_processed)
            .saturating_sub(self.submitted)
            .saturating_sub(self.in_flight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        assert_eq!(ScanStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_pending_counts_unhandled_files() {
        let stats = ScanStats::new();
        for _ in 0..5 {
            stats.increment_discovered();
        }
        stats.increment_already_processed();
        stats.increment_submitted();
        stats.increment_in_flight();

        assert_eq!(stats.snapshot().pending(), 2);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = StatsSnapshot {
            discovered: 2,
            already_processed: 1,
            submitted: 1,
            in_flight: 0,
        };
        insta::assert_json_snapshot!(snapshot, @r#"
        {
          "discovered": 2,
          "already_processed": 1,
          "submitted": 1,
          "in_flight": 0
        }
        "#);
    }
}
