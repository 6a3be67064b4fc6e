//! Per-path mutual exclusion.
//!
//! The filesystem is the only shared mutable resource in this crate, and
//! individual renames and writes are atomic — but the multi-step sequences
//! (trash move, restore, derived-asset generation) are not. [`PathLocks`]
//! provides a lock keyed by library-relative path, held for the duration of
//! any mutating multi-step sequence on that path.
//!
//! Generation uses the same map: concurrent requests for the same stale
//! asset serialize on the source path's lock, and every waiter re-checks
//! staleness after acquiring, so at most one regeneration runs and all
//! waiters receive the already-written result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A map of named locks. Entries are created on first use and reused for
/// the lifetime of the map; the set of keys is bounded by the set of
/// distinct paths touched.
#[derive(Debug, Default)]
pub struct PathLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch (or create) the lock for `key`. The caller holds the returned
    /// `Arc` in a local and locks it:
    ///
    /// ```ignore
    /// let slot = locks.entry("2024/01/a.jpg");
    /// let _guard = slot.lock().unwrap();
    /// // ... multi-step mutation ...
    /// ```
    pub fn entry(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
