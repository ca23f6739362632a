//! Filename pattern matching.
//!
//! Both producers decide whether a file is a data file by matching its file
//! name (never its directory) against the configured glob. The search
//! directory is watched and scanned non-recursively, so the pattern is not
//! allowed to contain a path separator.

use camino::Utf8Path;
use globset::{GlobBuilder, GlobMatcher};

use crate::error::ConfigError;

const OPTION: &str = "filename_match_pattern";

/// A compiled, case-sensitive filename glob such as `*.raw` or `guppi_*_0001.raw`.
///
/// # Examples
///
/// ```
/// use frb_core::FilenamePattern;
/// use camino::Utf8Path;
///
/// let pattern = FilenamePattern::new("guppi_*.raw").unwrap();
/// assert!(pattern.matches(Utf8Path::new("/data/guppi_58000_0001.raw")));
/// assert!(!pattern.matches(Utf8Path::new("/data/guppi_58000_0001.RAW")));
/// assert!(!pattern.matches(Utf8Path::new("/data/notes.txt")));
/// ```
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    glob: String,
    matcher: GlobMatcher,
}

impl FilenamePattern {
    /// Compiles a filename glob.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if the pattern is empty,
    /// contains a path separator, or is not a valid glob.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.is_empty() {
            return Err(ConfigError::invalid_option(OPTION, "pattern is empty"));
        }
        if pattern.contains('/') || pattern.contains(std::path::MAIN_SEPARATOR) {
            return Err(ConfigError::invalid_option(
                OPTION,
                format!("'{pattern}' must match file names only, not paths"),
            ));
        }

        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(false)
            .build()
            .map_err(|e| ConfigError::invalid_option(OPTION, e.to_string()))?;

        Ok(Self {
            glob: pattern.to_owned(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Returns the glob as written in the configuration.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.glob
    }

    /// Returns `true` if the bare file name matches.
    #[inline]
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.matcher.is_match(name)
    }

    /// Returns `true` if the final component of `path` matches.
    #[must_use]
    pub fn matches(&self, path: &Utf8Path) -> bool {
        path.file_name().is_some_and(|name| self.matches_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_glob() {
        let pattern = FilenamePattern::new("*.raw").expect("valid glob");
        assert!(pattern.matches_name("a.raw"));
        assert!(pattern.matches_name(".hidden.raw"));
        assert!(!pattern.matches_name("a.raw.tmp"));
        assert!(!pattern.matches_name("a.fil"));
    }

    #[test]
    fn test_matches_uses_file_name_only() {
        let pattern = FilenamePattern::new("*.raw").expect("valid glob");
        assert!(pattern.matches(Utf8Path::new("/data/raw.d/a.raw")));
        assert!(!pattern.matches(Utf8Path::new("/data/a.raw.d/notes")));
        assert!(!pattern.matches(Utf8Path::new("/")));
    }

    #[test]
    fn test_character_class() {
        let pattern = FilenamePattern::new("scan_[0-9][0-9].raw").expect("valid glob");
        assert!(pattern.matches_name("scan_07.raw"));
        assert!(!pattern.matches_name("scan_7.raw"));
    }

    #[test]
    fn test_case_sensitive() {
        let pattern = FilenamePattern::new("*.raw").expect("valid glob");
        assert!(!pattern.matches_name("A.RAW"));
    }

    #[test]
    fn test_rejects_empty_pattern() {
        assert!(FilenamePattern::new("").is_err());
    }

    #[test]
    fn test_rejects_path_pattern() {
        let err = FilenamePattern::new("sub/*.raw").expect_err("path separator");
        assert!(err.to_string().contains("filename_match_pattern"));
    }

    #[test]
    fn test_rejects_malformed_glob() {
        assert!(FilenamePattern::new("[unclosed").is_err());
    }

    #[test]
    fn test_as_str_preserves_pattern() {
        let pattern = FilenamePattern::new("guppi_*.raw").expect("valid glob");
        assert_eq!(pattern.as_str(), "guppi_*.raw");
    }
}
