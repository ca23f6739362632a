//! Creation events delivered by the watcher.
//!
//! # Event Flow
//!
//! ```text
//! File created in search directory
//!        │
//!        ▼
//! notify (inotify / FSEvents / ReadDirectoryChangesW)
//!        │
//!        ▼
//! is_file_creation? ── no ──► dropped
//!        │ yes
//!        ▼
//! FileFilter + canonicalize
//!        │
//!        ▼
//!   FileEvent sent via channel to the dispatch loop
//! ```

use frb_core::FilePath;
use notify::EventKind;
use notify::event::CreateKind;

/// A newly created file, already canonicalized and filtered.
///
/// # Examples
///
/// ```
/// use frb_watcher::FileEvent;
/// use frb_core::FilePath;
/// use camino::Utf8PathBuf;
///
/// let path = FilePath::from_absolute(Utf8PathBuf::from("/data/c.raw")).unwrap();
/// assert_eq!(FileEvent::new(path).into_path().as_str(), "/data/c.raw");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Canonical path of the created file.
    pub path: FilePath,
}

impl FileEvent {
    /// Wraps a canonical path.
    #[must_use]
    pub const fn new(path: FilePath) -> Self {
        Self { path }
    }

    /// Consumes the event, returning its path.
    #[must_use]
    pub fn into_path(self) -> FilePath {
        self.path
    }
}

/// Returns `true` if `kind` reports the creation of something that may be a
/// regular file.
///
/// Directory creations are rejected here when the backend says so; backends
/// that only report [`CreateKind::Any`] are checked against the filesystem
/// later.
#[must_use]
pub fn is_file_creation(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(CreateKind::Folder) => false,
        EventKind::Create(_) => true,
        _ => false,
    }
}
