//! Canonical file paths.
//!
//! A [`FilePath`] is the identity key for a data file. Two files are the same
//! if and only if their canonical absolute forms are byte-equal, so every
//! producer canonicalizes before comparing against the completion snapshot or
//! the in-flight set.

use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// An absolute, canonicalized UTF-8 file path.
///
/// Construct one with [`FilePath::canonicalize`] for files that exist on disk,
/// or [`FilePath::from_absolute`] for paths read back from the completion log
/// (which may name files that have since been removed).
///
/// # Examples
///
/// ```
/// use frb_core::FilePath;
/// use camino::Utf8PathBuf;
///
/// let path = FilePath::from_absolute(Utf8PathBuf::from("/data/a.raw")).unwrap();
/// assert_eq!(path.file_name(), Some("a.raw"));
///
/// assert!(FilePath::from_absolute(Utf8PathBuf::from("relative.raw")).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePath(Utf8PathBuf);

impl FilePath {
    /// Resolves `path` against the filesystem into its canonical form.
    ///
    /// Relative components and symbolic links are resolved, so the file must
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the path does not exist or its canonical form
    /// is not valid UTF-8.
    pub fn canonicalize(path: impl AsRef<Utf8Path>) -> io::Result<Self> {
        path.as_ref().canonicalize_utf8().map(Self)
    }

    /// Wraps a path that is already absolute without touching the filesystem.
    ///
    /// Returns `None` if `path` is relative.
    #[must_use]
    pub fn from_absolute(path: Utf8PathBuf) -> Option<Self> {
        path.is_absolute().then_some(Self(path))
    }

    /// Returns the path as a [`Utf8Path`].
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Utf8Path {
        &self.0
    }

    /// Returns the path as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the final component of the path, if any.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    /// Consumes the wrapper and returns the inner path.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Utf8PathBuf {
        self.0
    }
}

impl AsRef<Utf8Path> for FilePath {
    fn as_ref(&self) -> &Utf8Path {
        &self.0
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
