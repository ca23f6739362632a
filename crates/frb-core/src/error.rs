//! Error types for the frb-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration-related
//! errors. Every variant is fatal: the process reports it and exits before
//! any scanning, watching, or log writing starts.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use frb_core::ConfigError;
/// use camino::Utf8PathBuf;
///
/// let error = ConfigError::MissingDirectory(Utf8PathBuf::from("/data"));
/// assert!(error.to_string().contains("/data"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The provided path is invalid or malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// A required directory does not exist.
    #[error("missing required directory: {0}")]
    MissingDirectory(Utf8PathBuf),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// The configuration document could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// The configuration document path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred while validating configuration.
    #[error("failed to validate configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration document.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`ConfigError::InvalidPath`] error.
    #[inline]
    pub fn invalid_path(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let error = ConfigError::invalid_path("/data/raw", "not a directory");
        let msg = error.to_string();
        assert!(msg.contains("/data/raw"));
        assert!(msg.contains("not a directory"));
    }

    #[test]
    fn test_missing_directory_display() {
        let error = ConfigError::MissingDirectory(Utf8PathBuf::from("/missing/dir"));
        assert_eq!(error.to_string(), "missing required directory: /missing/dir");
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("backlog_workers", "must be at least 1");
        insta::assert_snapshot!(
            error.to_string(),
            @"invalid configuration option 'backlog_workers': must be at least 1"
        );
    }

    #[test]
    fn test_read_error_carries_path() {
        let error = ConfigError::Read {
            path: Utf8PathBuf::from("search.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(error.to_string().contains("search.yaml"));
    }
}
