//! Size-bounded LRU cache of decoded page images
//!
//! Maps composite page keys to image handles, evicting least-recently-used
//! entries once the cumulative decoded byte size exceeds a fixed budget. An
//! optional hook runs synchronously for every entry that leaves the table so
//! ownership transfer can happen at the removal point.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use log::debug;

use crate::image::ImageHandle;

/// Composite cache key: page number concatenated with the width class token.
///
/// The concatenation order (`page` first) is what makes keys unique; beyond
/// construction the cache treats the key as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey(String);

impl PageKey {
    pub fn new(page: u32, width_class: &str) -> Self {
        Self(format!("{page}{width_class}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hook invoked for every entry that leaves the table.
///
/// The final argument is `true` when the entry was removed to satisfy the
/// budget (LRU eviction or `evict_all`). The hook runs synchronously within
/// the mutating call, after the cache has cleared the handle's cached flag
/// and released its internal lock, so a hook may call back into the cache.
pub type EvictionHook = Box<dyn Fn(&PageKey, &ImageHandle, bool) + Send + Sync>;

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries currently in the table
    pub entry_count: usize,

    /// Total decoded bytes currently held
    pub bytes_used: usize,

    /// Byte budget the cache evicts toward
    pub budget: usize,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Number of accepted inserts
    pub puts: u64,

    /// Number of entries evicted under budget pressure
    pub evictions: u64,
}

impl CacheStats {
    /// Cache hit rate in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState {
    entries: HashMap<PageKey, ImageHandle>,

    /// Recency order: least recently used at the front.
    lru: VecDeque<PageKey>,

    bytes_used: usize,
    stats: CacheStats,
}

impl CacheState {
    fn new(budget: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: VecDeque::new(),
            bytes_used: 0,
            stats: CacheStats {
                budget,
                ..Default::default()
            },
        }
    }

    /// Mark a key most-recently-used.
    fn touch(&mut self, key: &PageKey) {
        if let Some(index) = self.lru.iter().position(|k| k == key) {
            if let Some(found) = self.lru.remove(index) {
                self.lru.push_back(found);
            }
        }
    }

    fn sync_stats(&mut self) {
        self.stats.entry_count = self.entries.len();
        self.stats.bytes_used = self.bytes_used;
    }
}

/// Size-bounded LRU page-image cache.
///
/// The budget is fixed at construction and bounds the cumulative byte size of
/// decoded buffers, with one documented exception: a single entry larger than
/// the whole budget is still admitted (and becomes the next eviction
/// candidate), so an oversized page can still be displayed.
///
/// Insertion is idempotent against racing decodes for the same key: the first
/// writer wins and later inserts are silently dropped.
///
/// All state lives behind a mutex, so the cache may be shared across decode
/// workers and the orchestrating thread.
pub struct SizedCache {
    state: Mutex<CacheState>,
    budget: usize,
    hook: Option<EvictionHook>,
}

impl SizedCache {
    /// Create a cache with the given byte budget.
    pub fn new(budget: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::new(budget)),
            budget,
            hook: None,
        }
    }

    /// Create a cache with a byte budget and a removal hook.
    pub fn with_hook(budget: usize, hook: EvictionHook) -> Self {
        Self {
            state: Mutex::new(CacheState::new(budget)),
            budget,
            hook: Some(hook),
        }
    }

    /// Byte budget this cache evicts toward.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Look up an entry, marking it most-recently-used on a hit.
    ///
    /// A miss has no side effect beyond the miss counter; neither path changes
    /// entry count or byte total.
    pub fn get(&self, key: &PageKey) -> Option<ImageHandle> {
        let mut state = self.state.lock().unwrap();
        if let Some(handle) = state.entries.get(key).cloned() {
            state.touch(key);
            state.stats.hits += 1;
            Some(handle)
        } else {
            state.stats.misses += 1;
            None
        }
    }

    /// Insert an entry if the key is absent.
    ///
    /// Returns `false` (dropping `handle`) when the key is already present:
    /// with duplicate decodes racing for one key, the first completed insert
    /// wins. On insert the handle is marked cached and least-recently-used
    /// entries are evicted until the new total fits the budget. An entry whose
    /// own size exceeds the budget is admitted regardless.
    pub fn put(&self, key: PageKey, handle: ImageHandle) -> bool {
        let mut departed = Vec::new();
        {
            let mut state = self.state.lock().unwrap();

            if state.entries.contains_key(&key) {
                return false;
            }

            let size = handle.byte_size();
            while state.bytes_used + size > self.budget && !state.entries.is_empty() {
                if let Some(entry) = Self::evict_lru(&mut state) {
                    departed.push(entry);
                }
            }

            handle.set_cached(true);
            state.bytes_used += size;
            state.lru.push_back(key.clone());
            state.entries.insert(key, handle);
            state.stats.puts += 1;
            state.sync_stats();

            debug!(
                "cache put: {} bytes used of {} budget, {} entries, puts: {}, evictions: {}",
                state.bytes_used,
                self.budget,
                state.entries.len(),
                state.stats.puts,
                state.stats.evictions
            );
        }
        self.notify_removed(&departed);

        true
    }

    /// Remove every entry, firing the removal hook once per entry.
    pub fn evict_all(&self) {
        let mut departed = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            while !state.lru.is_empty() {
                if let Some(entry) = Self::evict_lru(&mut state) {
                    departed.push(entry);
                }
            }
            state.sync_stats();
        }
        self.notify_removed(&departed);
    }

    /// Current cumulative decoded byte size.
    pub fn bytes_used(&self) -> usize {
        self.state.lock().unwrap().bytes_used
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check for a key without updating recency or statistics.
    pub fn contains(&self, key: &PageKey) -> bool {
        self.state.lock().unwrap().entries.contains_key(key)
    }

    /// Snapshot of current statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        state.stats
    }

    /// Remove the least-recently-used entry, clearing its cached flag.
    /// Returned to the caller so the hook can fire once the lock is released.
    fn evict_lru(state: &mut CacheState) -> Option<(PageKey, ImageHandle)> {
        let key = state.lru.pop_front()?;
        let handle = state.entries.remove(&key)?;
        state.bytes_used = state.bytes_used.saturating_sub(handle.byte_size());
        state.stats.evictions += 1;
        state.sync_stats();
        handle.set_cached(false);
        Some((key, handle))
    }

    /// Fire the removal hook for departed entries, outside the cache lock.
    fn notify_removed(&self, departed: &[(PageKey, ImageHandle)]) {
        if let Some(hook) = &self.hook {
            for (key, handle) in departed {
                hook(key, handle, true);
            }
        }
    }
}

impl std::fmt::Debug for SizedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("SizedCache")
            .field("budget", &self.budget)
            .field("bytes_used", &state.bytes_used)
            .field("entries", &state.entries.len())
            .finish()
    }
}
