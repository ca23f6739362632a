//! Live directory watcher for newly created data files.
//!
//! This crate subscribes to filesystem creation events in the search
//! directory via `notify`, bridges them from notify's thread into tokio, and
//! submits each matching file to a [`frb_core::JobSink`].
//!
//! # Overview
//!
//! - Only the search directory itself is watched; subdirectories are not.
//! - Only creations count. Directory creations are ignored.
//! - Paths are filtered by file name, then canonicalized.
//! - No completion-log exclusion applies: a file created under a name the
//!   log already holds is processed again.
//! - Each submission is awaited before the next event is taken.
//!
//! # Usage
//!
//! ```no_run
//! use frb_watcher::{DirectoryWatcher, PatternFilter};
//! use frb_core::{FilenamePattern, JobSink};
//! use camino::Utf8Path;
//!
//! # async fn example<S: JobSink + 'static>(lane: S) -> Result<(), Box<dyn std::error::Error>> {
//! let filter = PatternFilter::new(FilenamePattern::new("guppi_*.raw")?);
//! let watcher = DirectoryWatcher::start(Utf8Path::new("/data/guppi"), filter, lane).await?;
//!
//! tokio::signal::ctrl_c().await?;
//! watcher.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Startup failures are returned from [`DirectoryWatcher::start`]. Problems
//! with single events (vanished files, non-UTF-8 names) are logged with
//! `tracing` and skipped; see [`WatchError::is_recoverable`].

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod watcher;

pub use error::WatchError;
pub use events::{FileEvent, is_file_creation};
pub use filter::{FileFilter, PatternFilter};
pub use watcher::{DirectoryWatcher, WatchCounters};
