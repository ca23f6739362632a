//! Domain types for the dispatcher.
//!
//! # Module Organization
//!
//! - [`path`] - Canonical file identity used as the deduplication key
//! - [`record`] - Result codes and completion records
//! - [`work`] - Work items and the forwarded parameter bag
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use frb_core::{CompletionRecord, FilePath, ResultCode, WorkItem};
//! ```

mod path;
mod record;
mod work;

pub use path::FilePath;
pub use record::{CompletionRecord, ResultCode};
pub use work::{Parameters, WorkItem};
