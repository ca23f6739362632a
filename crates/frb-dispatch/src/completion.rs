//! The persisted completion log.
//!
//! One line per completed job, appended and never rewritten:
//!
//! ```text
//! /data/guppi/guppi_0001.raw: 0
//! /data/guppi/guppi_0002.raw: 3
//! /data/guppi/guppi_0003.raw: -3
//! ```
//!
//! Each line is `<canonical path>: <result code>`. Lines are parsed back by
//! splitting on the last `": "`, so paths containing that sequence still
//! round-trip. A path that appears on several lines (possible across runs)
//! takes its latest code.
//!
//! # Examples
//!
//! ```no_run
//! use frb_dispatch::CompletionLog;
//! use frb_core::{CompletionRecord, FilePath, ResultCode};
//! use camino::Utf8PathBuf;
//!
//! # fn example() -> Result<(), frb_dispatch::LogError> {
//! let mut log = CompletionLog::new(Utf8PathBuf::from("/out/frb_search.log"));
//! let snapshot = log.load()?;
//! let exclusions = snapshot.exclusions(false);
//!
//! let path = FilePath::from_absolute(Utf8PathBuf::from("/data/a.raw")).unwrap();
//! log.append(&CompletionRecord::new(path, ResultCode::SUCCESS))?;
//! # Ok(())
//! # }
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use frb_core::{CompletionRecord, FilePath, FxHashMap, FxHashSet, ResultCode};
use tracing::{debug, info};

use crate::error::LogError;

/// Separator between path and code on each line.
const SEPARATOR: &str = ": ";

/// Append-only record of processed files.
///
/// Single-writer: every append goes through the result collector.
#[derive(Debug)]
pub struct CompletionLog {
    path: Utf8PathBuf,
    appended: u64,
}

impl CompletionLog {
    /// Creates a handle for the log at `path`. Nothing is touched on disk.
    #[must_use]
    pub const fn new(path: Utf8PathBuf) -> Self {
        Self { path, appended: 0 }
    }

    /// Returns the log location.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns how many records this handle has appended.
    #[must_use]
    pub const fn appended(&self) -> u64 {
        self.appended
    }

    /// Reads the whole log into a snapshot.
    ///
    /// A missing log is an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Io`] if the log exists but cannot be read, and
    /// [`LogError::Malformed`] on the first line that is not a record.
    pub fn load(&self) -> Result<CompletionSnapshot, LogError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path, "No completion log yet, starting fresh");
                return Ok(CompletionSnapshot::default());
            }
            Err(source) => return Err(self.io_error(source)),
        };

        let mut records = FxHashMap::default();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| self.io_error(source))?;
            if line.trim().is_empty() {
                continue;
            }

            let (path, code) = parse_line(&line).ok_or_else(|| LogError::Malformed {
                path: self.path.clone(),
                line: index + 1,
                content: line.clone(),
            })?;
            records.insert(path, code);
        }

        info!(path = %self.path, records = records.len(), "Loaded completion log");
        Ok(CompletionSnapshot { records })
    }

    /// Appends one record, creating the log if needed.
    ///
    /// The line is flushed and synced to disk before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Unencodable`] for paths containing a line break,
    /// and [`LogError::Io`] if the write fails.
    pub fn append(&mut self, record: &CompletionRecord) -> Result<(), LogError> {
        let line = encode_line(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_data())
            .map_err(|source| self.io_error(source))?;

        self.appended += 1;
        debug!(path = %record.path, code = record.code.get(), "Recorded result");
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> LogError {
        LogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Formats one record as a log line, including the trailing newline.
fn encode_line(record: &CompletionRecord) -> Result<String, LogError> {
    let path = record.path.as_str();
    if path.contains(['\n', '\r']) {
        return Err(LogError::Unencodable(record.path.clone()));
    }
    Ok(format!("{path}{SEPARATOR}{}\n", record.code))
}

fn parse_line(line: &str) -> Option<(FilePath, ResultCode)> {
    let (path, code) = line.rsplit_once(SEPARATOR)?;
    let code = code.parse().ok()?;
    let path = FilePath::from_absolute(Utf8PathBuf::from(path))?;
    Some((path, code))
}

/// The log contents as read at startup.
///
/// This is a snapshot: results recorded during the current run are not
/// reflected here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSnapshot {
    records: FxHashMap<FilePath, ResultCode>,
}

impl CompletionSnapshot {
    /// Returns the recorded code for `path`, if any.
    #[must_use]
    pub fn get(&self, path: &FilePath) -> Option<ResultCode> {
        self.records.get(path).copied()
    }

    /// Returns `true` if `path` has a record.
    #[must_use]
    pub fn contains(&self, path: &FilePath) -> bool {
        self.records.contains_key(path)
    }

    /// Number of distinct files recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of files whose latest code is not success.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.records.values().filter(|c| !c.is_success()).count()
    }

    /// Builds the set of files the backlog scan must skip.
    ///
    /// With `retry_failed` unset every recorded file is excluded. With it
    /// set only files whose latest code is success are excluded, so failed
    /// files are searched again.
    #[must_use]
    pub fn exclusions(&self, retry_failed: bool) -> FxHashSet<FilePath> {
        self.records
            .iter()
            .filter(|(_, code)| !retry_failed || code.is_success())
            .map(|(path, _)| path.clone())
            .collect()
    }
}
