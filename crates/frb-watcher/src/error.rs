//! Watcher errors.
//!
//! Startup failures ([`WatchError::PathNotFound`], [`WatchError::NotADirectory`],
//! [`WatchError::Subscription`]) are returned from
//! [`DirectoryWatcher::start`](crate::DirectoryWatcher::start) before anything
//! runs. Per-event failures only cause that one file event to be skipped.

use std::path::PathBuf;

use camino::Utf8PathBuf;

/// Errors raised while subscribing to a directory or serving its events.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The notify backend rejected or lost the subscription.
    #[error("cannot watch directory: {0}")]
    Subscription(#[from] notify::Error),

    /// The directory to watch does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The path to watch is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    /// The subscription thread exited without reporting readiness.
    #[error("watch thread exited before the subscription was active")]
    NotReady,

    /// An event named a file whose path is not UTF-8.
    #[error("created file has a non-UTF-8 path: {}", _0.display())]
    NonUtf8Path(PathBuf),

    /// A created file could not be resolved, usually because it was removed
    /// again before it was seen.
    #[error("cannot resolve created file {path}: {source}")]
    Canonicalize {
        /// Path as reported by the event.
        path: Utf8PathBuf,
        /// Resolution failure.
        #[source]
        source: std::io::Error,
    },

    /// Resolving the watched directory failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The subscription thread or the dispatch task panicked.
    #[error("watcher task failed: {0}")]
    TaskFailed(String),
}

impl WatchError {
    /// Creates a [`WatchError::PathNotFound`].
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a [`WatchError::NonUtf8Path`].
    pub fn non_utf8_path(path: impl Into<PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// `true` for errors that concern one event; watching continues.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonUtf8Path(_) | Self::Canonicalize { .. })
    }

    /// `true` for errors that end the watch.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// The file or directory the error is about, if known.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path)
            | Self::NotADirectory(path)
            | Self::Canonicalize { path, .. } => Some(path),
            Self::Subscription(_)
            | Self::NotReady
            | Self::NonUtf8Path(_)
            | Self::Io(_)
            | Self::TaskFailed(_) => None,
        }
    }
}
