//! Cache retention across UI rebuilds.
//!
//! The hosting UI may be torn down and rebuilt for the same logical session
//! (a configuration change, a window recreate). The cache must survive that:
//! the host keeps a [`CacheRetention`] registry alive across rebuilds and the
//! service looks its cache up there by session identity instead of creating a
//! fresh one. Explicit injection, no ambient global state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use folio_cache::SizedCache;

/// Registry of retained caches keyed by stable session identity.
#[derive(Default)]
pub struct CacheRetention {
    slots: Mutex<HashMap<String, Arc<SizedCache>>>,
}

impl CacheRetention {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the retained cache for a session, if one exists.
    pub fn get(&self, session: &str) -> Option<Arc<SizedCache>> {
        self.slots.lock().unwrap().get(session).cloned()
    }

    /// Retain a cache under a session identity, replacing any previous slot.
    pub fn store(&self, session: &str, cache: Arc<SizedCache>) {
        self.slots.lock().unwrap().insert(session.to_string(), cache);
    }

    /// Drop the slot for a session (end of the logical session).
    pub fn remove(&self, session: &str) -> Option<Arc<SizedCache>> {
        self.slots.lock().unwrap().remove(session)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
