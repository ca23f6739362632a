//! Configuration for a search run.
//!
//! The configuration is a YAML document. Four keys drive dispatch:
//!
//! ```yaml
//! search_directory: ~/data/guppi
//! filename_match_pattern: "*.raw"
//! output_directory: ~/frb/output
//! log_filename: processed.log
//! ```
//!
//! An optional `dispatch` section tunes the worker pools and the worker
//! command. Every other top-level key is part of the open-ended parameter
//! bag forwarded verbatim to the search program (see [`SearchConfig::parameters`]).

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::pattern::FilenamePattern;
use crate::types::Parameters;

/// Default number of concurrent jobs per producer.
pub const DEFAULT_WORKERS: usize = 1;

/// Settings for the dispatcher and its worker processes.
///
/// # Examples
///
/// ```
/// use frb_core::DispatchConfig;
///
/// let config = DispatchConfig::default();
/// assert_eq!(config.backlog_workers, 1);
/// assert_eq!(config.live_workers, 1);
/// assert!(config.job_timeout().is_none());
/// assert!(!config.retry_failed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum concurrent jobs launched by the backlog scan.
    pub backlog_workers: usize,

    /// Maximum concurrent jobs launched by the live watch.
    ///
    /// While every live slot is busy, new files wait in a queue of 100
    /// events. Once that is full the watch stops reading events and relies
    /// on the kernel's own event buffer; a burst that overflows it too is
    /// lost and only picked up by the next run's backlog scan.
    pub live_workers: usize,

    /// Hard wall-clock limit per job, in seconds. `None` means no limit.
    pub job_timeout_secs: Option<u64>,

    /// Argv of the external search program.
    ///
    /// The canonical file path is appended as the last argument. When unset,
    /// the running binary is re-invoked in worker mode.
    pub search_command: Option<Vec<String>>,

    /// Whether files logged with a non-zero code are searched again by the
    /// next run's backlog scan.
    pub retry_failed: bool,
}

impl DispatchConfig {
    /// Returns the job timeout as a [`Duration`], if one is configured.
    #[must_use]
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backlog_workers: DEFAULT_WORKERS,
            live_workers: DEFAULT_WORKERS,
            job_timeout_secs: None,
            search_command: None,
            retry_failed: false,
        }
    }
}

/// Root configuration for a search run.
///
/// Load with [`SearchConfig::load`], apply command-line overrides, then call
/// [`SearchConfig::resolve`] to expand `~`, validate every option and
/// canonicalize the directories. Nothing touches the filesystem beyond reads
/// until `resolve` has succeeded.
///
/// # Examples
///
/// ```
/// use frb_core::SearchConfig;
///
/// let yaml = r#"
/// search_directory: /data
/// filename_match_pattern: "*.raw"
/// output_directory: /out
/// log_filename: processed.log
/// dm_max: 2000
/// "#;
///
/// let config = SearchConfig::from_yaml_str(yaml).unwrap();
/// assert_eq!(config.log_path().as_str(), "/out/processed.log");
/// assert_eq!(config.parameters().get("dm_max"), Some(&serde_json::json!(2000)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Directory scanned for backlog files and watched for new ones.
    pub search_directory: Utf8PathBuf,

    /// Glob matched against file names in the search directory.
    pub filename_match_pattern: String,

    /// Directory holding the completion log.
    pub output_directory: Utf8PathBuf,

    /// File name of the completion log inside `output_directory`.
    pub log_filename: String,

    /// Dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Every other option, forwarded to the search program.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchConfig {
    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is malformed or a
    /// required option is missing.
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(document)?)
    }

    /// Reads and parses the configuration document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid configuration.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml_str(&document)
    }

    /// Replaces the search directory, as `--search-dir` does.
    #[must_use]
    pub fn with_search_directory(mut self, dir: Utf8PathBuf) -> Self {
        self.search_directory = dir;
        self
    }

    /// Expands `~`, validates every option and canonicalizes both directories.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: a missing or non-directory
    /// search/output directory, an invalid log file name, an invalid
    /// pattern, or a zero worker count.
    pub fn resolve(mut self) -> Result<Self, ConfigError> {
        self.search_directory = existing_dir(&expand_home(&self.search_directory)?)?;
        self.output_directory = existing_dir(&expand_home(&self.output_directory)?)?;

        validate_log_filename(&self.log_filename)?;
        self.pattern()?;

        if self.dispatch.backlog_workers == 0 {
            return Err(ConfigError::invalid_option(
                "dispatch.backlog_workers",
                "must be at least 1",
            ));
        }
        if self.dispatch.live_workers == 0 {
            return Err(ConfigError::invalid_option(
                "dispatch.live_workers",
                "must be at least 1",
            ));
        }
        if self.dispatch.job_timeout_secs == Some(0) {
            return Err(ConfigError::invalid_option(
                "dispatch.job_timeout_secs",
                "must be at least 1 second",
            ));
        }
        if self
            .dispatch
            .search_command
            .as_ref()
            .is_some_and(|argv| argv.first().is_none_or(String::is_empty))
        {
            return Err(ConfigError::invalid_option(
                "dispatch.search_command",
                "must name a program",
            ));
        }

        Ok(self)
    }

    /// Compiles the filename match pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if the pattern is not a valid
    /// filename glob.
    pub fn pattern(&self) -> Result<FilenamePattern, ConfigError> {
        FilenamePattern::new(&self.filename_match_pattern)
    }

    /// Returns the path of the completion log.
    #[must_use]
    pub fn log_path(&self) -> Utf8PathBuf {
        self.output_directory.join(&self.log_filename)
    }

    /// Returns the options forwarded to every search job.
    ///
    /// This is the whole document minus the `dispatch` section, with the
    /// directory options reflecting any overrides and `~` expansion.
    #[must_use]
    pub fn parameters(&self) -> Parameters {
        let mut map = self.extra.clone();
        map.insert(
            "search_directory".to_owned(),
            Value::from(self.search_directory.as_str()),
        );
        map.insert(
            "filename_match_pattern".to_owned(),
            Value::from(self.filename_match_pattern.as_str()),
        );
        map.insert(
            "output_directory".to_owned(),
            Value::from(self.output_directory.as_str()),
        );
        map.insert(
            "log_filename".to_owned(),
            Value::from(self.log_filename.as_str()),
        );
        Parameters::new(map)
    }
}

/// Replaces a leading `~` component with the user's home directory.
fn expand_home(path: &Utf8Path) -> Result<Utf8PathBuf, ConfigError> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_owned());
    };

    let home = dirs::home_dir()
        .ok_or_else(|| ConfigError::invalid_path(path, "home directory is unknown"))?;
    let home = Utf8PathBuf::try_from(home).map_err(|e| {
        ConfigError::invalid_path(
            path,
            format!(
                "home directory is not valid UTF-8: {}",
                e.into_path_buf().display()
            ),
        )
    })?;

    if rest.as_str().is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}

fn existing_dir(path: &Utf8Path) -> Result<Utf8PathBuf, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingDirectory(path.to_owned()));
    }
    if !path.is_dir() {
        return Err(ConfigError::invalid_path(path, "not a directory"));
    }
    Ok(path.canonicalize_utf8()?)
}

fn validate_log_filename(name: &str) -> Result<(), ConfigError> {
    let bare = Utf8Path::new(name).file_name() == Some(name);
    if name.is_empty() || !bare || name.contains(std::path::MAIN_SEPARATOR) {
        return Err(ConfigError::invalid_option(
            "log_filename",
            format!("'{name}' must be a file name inside output_directory"),
        ));
    }
    Ok(())
}
