//! File filtering for creation events.
//!
//! Filters run on notify's event thread, before anything is sent to the
//! async dispatch loop, so unmatched files never cost a channel slot.
//!
//! # Examples
//!
//! ```
//! use frb_watcher::{FileFilter, PatternFilter};
//! use frb_core::FilenamePattern;
//! use camino::Utf8Path;
//!
//! let filter = PatternFilter::new(FilenamePattern::new("guppi_*.raw").unwrap());
//! assert!(filter.should_process(Utf8Path::new("/data/guppi_0001.raw")));
//! assert!(!filter.should_process(Utf8Path::new("/data/guppi_0001.log")));
//! ```

use camino::Utf8Path;
use frb_core::FilenamePattern;

/// Decides which created files are submitted.
///
/// Implementations are moved onto notify's event thread, hence the
/// `Send + Sync + 'static` bound.
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if the file at `path` should be submitted.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// Submits files whose name matches `filename_match_pattern`.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    pattern: FilenamePattern,
}

impl PatternFilter {
    /// Creates a filter for the given pattern.
    #[must_use]
    pub const fn new(pattern: FilenamePattern) -> Self {
        Self { pattern }
    }

    /// Returns the pattern.
    #[must_use]
    pub const fn pattern(&self) -> &FilenamePattern {
        &self.pattern
    }
}

impl FileFilter for PatternFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        self.pattern.matches(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches_file_name_only() {
        let filter = PatternFilter::new(FilenamePattern::new("*.raw").expect("valid glob"));
        assert!(filter.should_process(Utf8Path::new("/data/a.raw")));
        assert!(!filter.should_process(Utf8Path::new("/data/a.raw.tmp")));
        assert!(!filter.should_process(Utf8Path::new("/data.raw/notes")));
        assert_eq!(filter.pattern().as_str(), "*.raw");
    }
}
