//! Fx-hashed map and set aliases.
//!
//! The completion snapshot, the exclusion set handed to the scanner and the
//! in-flight set are all keyed by [`FilePath`](crate::FilePath). Their keys
//! come from the local filesystem, not from untrusted peers, so the faster
//! non-randomized hasher is used throughout.
//!
//! ```
//! use frb_core::{FilePath, FxHashSet};
//!
//! let a = FilePath::from_absolute("/data/a.raw".into()).unwrap();
//! let mut seen = FxHashSet::default();
//! assert!(seen.insert(a.clone()));
//! assert!(!seen.insert(a));
//! ```

/// Path-keyed map using the Fx hash.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// Path-keyed set using the Fx hash.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;
