//! The seam between file producers and the dispatcher.
//!
//! The backlog scanner and the directory watcher only know how to find
//! files. They hand each canonical path to a [`JobSink`], which owns the
//! decision of when a worker may start. A sink backed by a pool of size one
//! makes `submit` return only after the previous job's result has been
//! collected, which is how both producers get their one-job-at-a-time
//! discipline.

use std::future::Future;

use crate::types::FilePath;

/// Outcome of handing one file to a [`JobSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A worker was launched for the file.
    Launched,
    /// The same file is already being processed; nothing was launched.
    AlreadyInFlight,
    /// The dispatcher is shutting down and accepts no more work.
    Closed,
}

impl Submission {
    /// Returns `true` if the dispatcher refused the file because it is stopping.
    #[inline]
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Destination for discovered files.
///
/// Implementations must be [`Send`] so producers can run on their own task.
pub trait JobSink: Send {
    /// Submits one file for processing.
    ///
    /// Waits while the sink's worker slots are all busy. Returns
    /// [`Submission::Closed`] without launching anything once shutdown has
    /// been requested, including while waiting for a slot.
    fn submit(&mut self, path: FilePath) -> impl Future<Output = Submission> + Send;

    /// Waits until every job launched through this sink has had its result
    /// collected.
    fn drain(&mut self) -> impl Future<Output = ()> + Send;
}
