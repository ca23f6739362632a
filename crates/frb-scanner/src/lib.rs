//! One-shot backlog scanner for pre-existing data files.
//!
//! At startup the search directory usually already holds files written
//! while the dispatcher was not running. [`PreexistingScanner`] lists them,
//! drops every file the completion log says was already handled, and hands
//! the rest to a [`JobSink`] one at a time.
//!
//! # Example
//!
//! ```ignore
//! use frb_scanner::{PreexistingScanner, ScanConfig};
//!
//! let scanner = PreexistingScanner::new(
//!     ScanConfig::new(&config.search_directory, config.pattern()?)
//!         .with_exclusions(snapshot.exclusions(false)),
//! )?;
//!
//! // Runs until the listing is exhausted or the sink closes.
//! let report = tokio::spawn(scanner.run(lane)).await??;
//! println!("submitted {} backlog files", report.stats.submitted);
//! ```
//!
//! # Architecture
//!
//! ```text
//! PreexistingScanner::run (own task)
//!     │
//!     ├── FileWalker (spawn_blocking: list, match, canonicalize)
//!     │
//!     ├── exclusion set (completion log snapshot)
//!     │
//!     └── JobSink::submit, one file at a time, then JobSink::drain
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod error;
mod stats;
mod walker;

pub use error::ScanError;
pub use stats::{ScanStats, StatsSnapshot};
pub use walker::FileWalker;

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use frb_core::{FilePath, FilenamePattern, FxHashSet, JobSink, Submission};
use tracing::{debug, info};

/// Configuration for the backlog scanner.
///
/// # Examples
///
/// ```
/// use frb_scanner::ScanConfig;
/// use frb_core::FilenamePattern;
/// use camino::Utf8Path;
///
/// let config = ScanConfig::new(Utf8Path::new("/data"), FilenamePattern::new("*.raw").unwrap());
/// assert!(config.exclusions.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory to list.
    pub root: Utf8PathBuf,
    /// Filename glob.
    pub pattern: FilenamePattern,
    /// Canonical paths that must not be submitted.
    pub exclusions: Arc<FxHashSet<FilePath>>,
}

impl ScanConfig {
    /// Creates a configuration with no exclusions.
    #[must_use]
    pub fn new(root: &Utf8Path, pattern: FilenamePattern) -> Self {
        Self {
            root: root.to_owned(),
            pattern,
            exclusions: Arc::new(FxHashSet::default()),
        }
    }

    /// Sets the paths to skip, typically the completion log snapshot.
    #[must_use]
    pub fn with_exclusions(mut self, exclusions: Arc<FxHashSet<FilePath>>) -> Self {
        self.exclusions = exclusions;
        self
    }
}

/// Outcome of one backlog scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Final counters.
    pub stats: StatsSnapshot,
    /// `true` if the sink closed before every file was submitted.
    pub stopped_early: bool,
}

/// Lists pre-existing files and submits the unprocessed ones.
///
/// The scanner is consumed by [`run`](Self::run); it produces nothing once
/// the listing is exhausted.
#[derive(Debug)]
pub struct PreexistingScanner {
    config: ScanConfig,
    stats: ScanStats,
}

impl PreexistingScanner {
    /// Creates a scanner.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Config`] if the root directory doesn't exist or
    /// isn't a directory.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        // Fail early rather than when the task first runs
        FileWalker::new(&config.root, config.pattern.clone())?;

        info!(
            root = %config.root,
            pattern = config.pattern.as_str(),
            excluded = config.exclusions.len(),
            "Creating backlog scanner"
        );

        Ok(Self {
            config,
            stats: ScanStats::new(),
        })
    }

    /// Runs the scan to completion.
    ///
    /// Each unprocessed file is submitted to `sink` in turn; `submit` blocks
    /// while the sink's worker slots are busy, which is what keeps the
    /// backlog to a bounded number of concurrent jobs. After the last
    /// submission the scanner drains the sink, so when this future resolves
    /// every job it launched has had its result collected.
    ///
    /// Stops submitting as soon as the sink reports
    /// [`Submission::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Walk`] if the directory cannot be listed, or
    /// [`ScanError::TaskFailed`] if the listing task panicked.
    pub async fn run<S: JobSink>(self, mut sink: S) -> Result<ScanReport, ScanError> {
        info!(root = %self.config.root, "Starting backlog scan");

        let walker = FileWalker::new(&self.config.root, self.config.pattern.clone())?;
        let paths = tokio::task::spawn_blocking(move || walker.collect_paths())
            .await
            .map_err(|e| ScanError::TaskFailed(e.to_string()))??;

        info!(count = paths.len(), "Collected backlog files");

        let mut stopped_early = false;
        for path in paths {
            self.stats.increment_discovered();

            if self.config.exclusions.contains(&path) {
                debug!(path = %path, "Already processed, skipping");
                self.stats.increment_already_processed();
                continue;
            }

            match sink.submit(path).await {
                Submission::Launched => self.stats.increment_submitted(),
                Submission::AlreadyInFlight => self.stats.increment_in_flight(),
                Submission::Closed => {
                    info!("Dispatcher closed, stopping backlog scan");
                    stopped_early = true;
                    break;
                }
            }
        }

        sink.drain().await;

        let stats = self.stats.snapshot();
        info!(
            discovered = stats.discovered,
            already_processed = stats.already_processed,
            submitted = stats.submitted,
            in_flight = stats.in_flight,
            stopped_early,
            "Backlog scan completed"
        );

        Ok(ScanReport {
            stats,
            stopped_early,
        })
    }
}
