//! Core types, configuration, and errors for the FRB search dispatcher.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`SearchConfig`]: the YAML configuration document and its validation
//! - [`ConfigError`]: fatal configuration failures
//! - Domain types ([`FilePath`], [`ResultCode`], [`CompletionRecord`], [`WorkItem`])
//! - [`FilenamePattern`]: the glob applied to discovered file names
//! - [`JobSink`]: the seam through which producers hand files to the dispatcher
//! - [`FxHashMap`] / [`FxHashSet`] aliases for path-keyed tables

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod pattern;
pub mod sink;
pub mod types;

pub use config::{DispatchConfig, SearchConfig};
pub use error::ConfigError;
pub use hash::{FxHashMap, FxHashSet};
pub use pattern::FilenamePattern;
pub use sink::{JobSink, Submission};
pub use types::{CompletionRecord, FilePath, Parameters, ResultCode, WorkItem};
