//! Listing of the search directory.
//!
//! [`FileWalker`] lists the regular files directly inside the search
//! directory (subdirectories are not descended into), keeps the ones whose
//! name matches the configured pattern, and resolves each to its canonical
//! path.
//!
//! # Examples
//!
//! ```ignore
//! use frb_scanner::FileWalker;
//! use frb_core::FilenamePattern;
//! use camino::Utf8Path;
//!
//! let pattern = FilenamePattern::new("*.raw")?;
//! let walker = FileWalker::new(Utf8Path::new("/data/guppi"), pattern)?;
//! for path in walker.collect_paths()? {
//!     println!("backlog: {path}");
//! }
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use frb_core::{FilePath, FilenamePattern};
use ignore::WalkBuilder;
use tracing::{trace, warn};

use crate::error::ScanError;

/// Lists pattern-matching files in a single directory.
///
/// Symbolic links to regular files are listed and resolved to their
/// targets. Hidden files are not special-cased; the pattern alone decides.
/// Paths come back sorted by file name.
#[derive(Debug, Clone)]
pub struct FileWalker {
    /// The directory to list.
    root: Utf8PathBuf,
    /// Filename glob.
    pattern: FilenamePattern,
}

impl FileWalker {
    /// Creates a new walker for the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Config`] if the root path doesn't exist or
    /// isn't a directory.
    pub fn new(root: &Utf8Path, pattern: FilenamePattern) -> Result<Self, ScanError> {
        if !root.exists() {
            return Err(ScanError::config(format!(
                "root path does not exist: {root}"
            )));
        }
        if !root.is_dir() {
            return Err(ScanError::config(format!(
                "root path is not a directory: {root}"
            )));
        }

        Ok(Self {
            root: root.to_owned(),
            pattern,
        })
    }

    /// Collects the canonical paths of all matching files.
    ///
    /// Files that vanish before they can be resolved, and files whose names
    /// are not valid UTF-8, are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Walk`] if the directory cannot be listed.
    pub fn collect_paths(&self) -> Result<Vec<FilePath>, ScanError> {
        let mut paths = Vec::new();

        for result in self.build_walker() {
            let entry = result?;

            // The root itself is reported at depth 0
            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(utf8_path) = Utf8Path::from_path(path) else {
                let err = ScanError::NonUtf8Path(path.to_owned());
                warn!(error = %err, "Skipping backlog file");
                continue;
            };

            if !self.pattern.matches(utf8_path) {
                trace!(path = %utf8_path, "Filtered out backlog file");
                continue;
            }

            match FilePath::canonicalize(utf8_path) {
                Ok(canonical) => paths.push(canonical),
                Err(source) => {
                    let err = ScanError::Canonicalize {
                        path: utf8_path.to_owned(),
                        source,
                    };
                    warn!(error = %err, "Skipping backlog file");
                }
            }
        }

        Ok(paths)
    }

    /// Builds the ignore walker: one level deep, no ignore-file filtering.
    fn build_walker(&self) -> ignore::Walk {
        WalkBuilder::new(&self.root)
            .standard_filters(false)
            .max_depth(Some(1))
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build()
    }

    /// Returns the directory being listed.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the filename pattern.
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &FilenamePattern {
        &self.pattern
    }
}
