//! Result codes and completion records.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::path::FilePath;

/// The integer outcome of processing one file.
///
/// Non-negative values come from the external search program: `0` is
/// success and anything else is a failure classification the program
/// defines. Negative values are reserved for faults the dispatcher itself
/// observed, so they never collide with a code the search could produce.
///
/// # Examples
///
/// ```
/// use frb_core::ResultCode;
///
/// assert!(ResultCode::SUCCESS.is_success());
/// assert!(!ResultCode::new(3).is_success());
/// assert!(!ResultCode::new(3).is_fault());
/// assert!(ResultCode::TIMED_OUT.is_fault());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(i32);

impl ResultCode {
    /// The file was searched successfully.
    pub const SUCCESS: Self = Self(0);

    /// The worker process could not be started.
    pub const SPAWN_FAILED: Self = Self(-1);

    /// The worker process was terminated by a signal.
    pub const SIGNALLED: Self = Self(-2);

    /// The worker exceeded the configured job timeout and was killed.
    pub const TIMED_OUT: Self = Self(-3);

    /// An in-process worker panicked or was aborted.
    pub const WORKER_PANICKED: Self = Self(-4);

    /// Wraps a raw code.
    #[inline]
    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Returns the raw integer value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Returns `true` for the success code.
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the code was produced by a dispatcher-observed fault
    /// rather than by the search program.
    #[inline]
    #[must_use]
    pub const fn is_fault(self) -> bool {
        self.0 < 0
    }

    /// Returns a short human-readable label.
    ///
    /// # Examples
    ///
    /// ```
    /// use frb_core::ResultCode;
    ///
    /// assert_eq!(ResultCode::SUCCESS.label(), "success");
    /// assert_eq!(ResultCode::new(7).label(), "failed");
    /// assert_eq!(ResultCode::SIGNALLED.label(), "signalled");
    /// ```
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.0 {
            0 => "success",
            -1 => "spawn-failed",
            -2 => "signalled",
            -3 => "timed-out",
            -4 => "worker-panicked",
            c if c < 0 => "fault",
            _ => "failed",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ResultCode {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// One completed file and its result code.
///
/// This is the unit appended to the completion log and the message the
/// dispatcher delivers to the result collector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// The processed file.
    pub path: FilePath,
    /// The outcome of processing it.
    pub code: ResultCode,
}

impl CompletionRecord {
    /// Creates a new record.
    #[inline]
    #[must_use]
    pub const fn new(path: FilePath, code: ResultCode) -> Self {
        Self { path, code }
    }
}
