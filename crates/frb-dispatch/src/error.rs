//! Error types for the frb-dispatch crate.

use std::time::Duration;

use camino::Utf8PathBuf;
use frb_core::{ConfigError, FilePath, ResultCode};
use frb_scanner::ScanError;
use frb_watcher::WatchError;

/// Errors reading or appending the completion log.
///
/// All of these are fatal: the dispatcher refuses to guess which files were
/// already processed.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The log exists but could not be read, or could not be appended to.
    #[error("completion log {path}: {source}")]
    Io {
        /// Location of the log.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line of the log could not be parsed.
    #[error("completion log {path} line {line}: malformed record {content:?}")]
    Malformed {
        /// Location of the log.
        path: Utf8PathBuf,
        /// One-based line number.
        line: usize,
        /// The offending line.
        content: String,
    },

    /// A path that cannot be written as a single log line.
    #[error("cannot record {0}: path contains a line break")]
    Unencodable(FilePath),
}

impl LogError {
    /// Returns the log location, if the error concerns the file itself.
    #[must_use]
    pub fn log_path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Io { path, .. } | Self::Malformed { path, .. } => Some(path),
            Self::Unencodable(_) => None,
        }
    }
}

/// A failure of the external search call for one file.
///
/// Faults never propagate past the dispatcher. Each one is turned into a
/// distinguished negative [`ResultCode`] via [`code`](Self::code) and
/// recorded like any other result.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingFault {
    /// The worker process could not be started.
    #[error("failed to start search process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Waiting on the worker process failed.
    #[error("failed to wait for search process: {0}")]
    Wait(#[source] std::io::Error),

    /// The worker process was killed by a signal.
    #[error("search process terminated by signal {}", signal.map_or_else(|| "?".to_owned(), |s| s.to_string()))]
    Signalled {
        /// The signal number, where the platform reports one.
        signal: Option<i32>,
    },

    /// The worker exceeded the per-job timeout and was killed.
    #[error("search process exceeded {}s timeout", _0.as_secs_f64())]
    TimedOut(Duration),

    /// An in-process processor panicked.
    #[error("search worker panicked: {0}")]
    Panicked(String),
}

impl ProcessingFault {
    /// Returns the result code recorded for this fault.
    #[must_use]
    pub const fn code(&self) -> ResultCode {
        match self {
            Self::Spawn(_) | Self::Wait(_) => ResultCode::SPAWN_FAILED,
            Self::Signalled { .. } => ResultCode::SIGNALLED,
            Self::TimedOut(_) => ResultCode::TIMED_OUT,
            Self::Panicked(_) => ResultCode::WORKER_PANICKED,
        }
    }
}

/// Errors that end a dispatcher run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The completion log could not be loaded or appended to.
    #[error(transparent)]
    Log(#[from] LogError),

    /// The backlog scan failed.
    #[error("backlog scan failed: {0}")]
    Scan(#[from] ScanError),

    /// The directory watcher failed.
    #[error("directory watcher failed: {0}")]
    Watch(#[from] WatchError),

    /// The search command could not be determined.
    #[error("cannot locate search command: {0}")]
    SearchCommand(#[source] std::io::Error),

    /// A dispatcher task panicked.
    #[error("dispatcher task failed: {0}")]
    TaskFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_fault_codes_are_distinct_and_negative() {
        let faults = [
            ProcessingFault::Spawn(io::Error::new(io::ErrorKind::NotFound, "missing")),
            ProcessingFault::Signalled { signal: Some(9) },
            ProcessingFault::TimedOut(Duration::from_secs(1)),
            ProcessingFault::Panicked("boom".to_owned()),
        ];
        let codes: Vec<_> = faults.iter().map(ProcessingFault::code).collect();

        assert!(codes.iter().all(|c| c.is_fault()));
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_wait_failure_shares_spawn_code() {
        let fault = ProcessingFault::Wait(io::Error::other("wait"));
        assert_eq!(fault.code(), ResultCode::SPAWN_FAILED);
    }

    #[test]
    fn test_fault_messages() {
        insta::assert_snapshot!(
            ProcessingFault::Signalled { signal: Some(9) }.to_string(),
            @"search process terminated by signal 9"
        );
        insta::assert_snapshot!(
            ProcessingFault::Signalled { signal: None }.to_string(),
            @"search process terminated by signal ?"
        );
        insta::assert_snapshot!(
            ProcessingFault::TimedOut(Duration::from_millis(1500)).to_string(),
            @"search process exceeded 1.5s timeout"
        );
    }

    #[test]
    fn test_malformed_log_message() {
        let err = LogError::Malformed {
            path: Utf8PathBuf::from("/out/frb.log"),
            line: 3,
            content: "garbage".to_owned(),
        };
        assert_eq!(err.log_path().map(|p| p.as_str()), Some("/out/frb.log"));
        insta::assert_snapshot!(
            err.to_string(),
            @r#"completion log /out/frb.log line 3: malformed record "garbage""#
        );
    }
}
