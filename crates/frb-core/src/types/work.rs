//! Work items and the parameter bag forwarded to the search program.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::path::FilePath;

/// Configuration options passed through unchanged to every search job.
///
/// The dispatcher never interprets these values. They are serialized to a
/// JSON object and handed to the worker process.
///
/// # Examples
///
/// ```
/// use frb_core::Parameters;
/// use serde_json::{json, Map};
///
/// let mut map = Map::new();
/// map.insert("dm_max".to_owned(), json!(2000));
/// let params = Parameters::new(map);
///
/// assert_eq!(params.get("dm_max"), Some(&json!(2000)));
/// assert_eq!(params.to_json(), r#"{"dm_max":2000}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    /// Wraps a JSON object.
    #[must_use]
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Looks up one option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no options are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes the options as a compact JSON object.
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

/// A file awaiting processing plus the parameters for its search.
///
/// Created when a producer hands a file to the dispatcher, dropped once its
/// result has been collected. The parameter bag is shared between all items
/// of a run.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// The canonical path of the file to search.
    pub path: FilePath,
    /// The options forwarded to the search program.
    pub parameters: Arc<Parameters>,
}

impl WorkItem {
    /// Creates a new work item.
    #[inline]
    #[must_use]
    pub fn new(path: FilePath, parameters: Arc<Parameters>) -> Self {
        Self { path, parameters }
    }
}
