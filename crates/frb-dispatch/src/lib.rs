//! Completion log, bounded worker lanes, and result collection.
//!
//! This crate turns discovered files into searched files:
//!
//! - [`CompletionLog`]: the append-only record of processed files
//! - [`Dispatcher`] / [`Lane`]: per-producer pools of worker slots that
//!   launch one isolated job per file
//! - [`Processor`] / [`CommandProcessor`]: the external search call, run as
//!   a child process per file
//! - [`ResultCollector`]: the single writer of the completion log
//! - [`Engine`]: one complete run, from loading the log to draining on stop
//!
//! # Usage
//!
//! ```no_run
//! use frb_core::SearchConfig;
//! use frb_dispatch::{CommandProcessor, Engine, RunOptions};
//! use camino::Utf8Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SearchConfig::load(Utf8Path::new("search.yaml"))?.resolve()?;
//! let processor = CommandProcessor::from_config(&config.dispatch)?;
//!
//! let summary = Engine::new(config, processor, RunOptions::default())
//!     .run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! println!("{} files searched", summary.stats.completed());
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod collector;
pub mod completion;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod processor;
pub mod stats;

pub use collector::{CollectorState, ResultCollector};
pub use completion::{CompletionLog, CompletionSnapshot};
pub use dispatcher::{Dispatcher, InFlight, JobReport, Lane, LaneKind};
pub use engine::{Engine, RunOptions, RunSummary};
pub use error::{EngineError, LogError, ProcessingFault};
pub use processor::{CommandProcessor, PARAMETERS_ENV, Processor, WORKER_FLAG};
pub use stats::{DispatchSnapshot, DispatchStats};
