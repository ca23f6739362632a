//! Error types for the frb-scanner crate.

use camino::Utf8PathBuf;

/// Errors that can occur while scanning the backlog.
///
/// # Error Recovery Strategy
///
/// - **Walker errors** ([`ScanError::Walk`]): Fatal - the listing is incomplete
/// - **Vanished files** ([`ScanError::Canonicalize`]): Log warning, skip file, continue scan
/// - **Non-UTF-8 names** ([`ScanError::NonUtf8Path`]): Log warning, skip file, continue scan
/// - **Configuration** ([`ScanError::Config`]): Fatal - nothing can be listed
/// - **Walker task failure** ([`ScanError::TaskFailed`]): Fatal
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Failed to list the search directory.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),

    /// A listed file could not be resolved to its canonical path, usually
    /// because it was removed between listing and resolution.
    #[error("failed to canonicalize {path}: {source}")]
    Canonicalize {
        /// The listed path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid scanner configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// The blocking directory walk panicked or was cancelled.
    #[error("directory walk task failed: {0}")]
    TaskFailed(String),
}

impl ScanError {
    /// Creates a new [`ScanError::Config`] error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns `true` if this error is recoverable (scanning can continue).
    ///
    /// Recoverable errors concern a single file and only cause that file to
    /// be skipped.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Canonicalize { .. } | Self::NonUtf8Path(_))
    }

    /// Returns `true` if this error is fatal (scanning should stop).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}
