//! Page cache service: the single entry point the UI talks to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};
use thiserror::Error;

use folio_cache::{ImageHandle, PageKey, SizedCache};
use folio_render::{PageRenderer, ScreenProfile};
use folio_scheduler::{CompletionInbox, WorkerPool, WorkerPoolConfig};

use crate::config::ServiceConfig;
use crate::retention::CacheRetention;
use crate::task::{DecodeCompletion, DecodeOutcome, DecodeTask};

/// UI-side receiver of decoded page images.
///
/// The service only ever holds weak references to consumers; a consumer that
/// goes away before its decode completes is simply not updated.
pub trait PageConsumer: Send + Sync {
    fn set_image(&self, handle: ImageHandle);
}

/// Errors surfaced by [`PageCacheService::pump_completions`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A decode ran out of memory and produced no buffer. Re-raised rather
    /// than absorbed: the process may be near its memory limit and upstream
    /// mitigation (dropping other caches) needs the signal.
    #[error("decode ran out of memory for page {page} at width class {width_class}")]
    DecodeOutOfMemory { page: u32, width_class: String },
}

/// Orchestrator for page-image requests.
///
/// Owns the sized cache and the decode worker pool. `request_page` resolves a
/// request to a synchronous cache hit or a scheduled decode;
/// `pump_completions` is called from the orchestrating (UI) thread to deliver
/// finished decodes. No method blocks on decode work.
///
/// Concurrent requests for one key are collapsed: the in-flight table maps
/// each key to its waiting consumers and only the first miss schedules a
/// decode, so at most one decode per key is ever outstanding regardless of
/// the configured worker count.
pub struct PageCacheService {
    cache: Arc<SizedCache>,
    renderer: Arc<dyn PageRenderer>,
    screen: Arc<dyn ScreenProfile>,
    pool: WorkerPool<DecodeCompletion>,
    inbox: CompletionInbox<DecodeCompletion>,
    in_flight: Mutex<HashMap<PageKey, Vec<Weak<dyn PageConsumer>>>>,
}

impl PageCacheService {
    /// Create a service with a freshly constructed cache.
    pub fn new(
        config: ServiceConfig,
        renderer: Arc<dyn PageRenderer>,
        screen: Arc<dyn ScreenProfile>,
    ) -> Self {
        let cache = Self::create_cache(&config);
        Self::with_cache(config, renderer, screen, cache)
    }

    /// Create a service whose cache survives UI rebuilds.
    ///
    /// Checks the retention slot for the session before creating a cache; a
    /// newly created cache is stored back into the slot.
    pub fn with_retention(
        config: ServiceConfig,
        renderer: Arc<dyn PageRenderer>,
        screen: Arc<dyn ScreenProfile>,
        retention: &CacheRetention,
        session: &str,
    ) -> Self {
        let cache = match retention.get(session) {
            Some(cache) => {
                debug!(
                    "reusing retained cache for session {session} ({} entries)",
                    cache.len()
                );
                cache
            }
            None => {
                let cache = Self::create_cache(&config);
                retention.store(session, Arc::clone(&cache));
                cache
            }
        };
        Self::with_cache(config, renderer, screen, cache)
    }

    /// Create a service around an existing cache (retention handoff, or a
    /// cache carrying a host-installed eviction hook).
    pub fn with_cache(
        config: ServiceConfig,
        renderer: Arc<dyn PageRenderer>,
        screen: Arc<dyn ScreenProfile>,
        cache: Arc<SizedCache>,
    ) -> Self {
        let pool_config = WorkerPoolConfig::new(config.num_workers)
            .with_poll_interval(config.poll_interval);
        let (pool, inbox) = WorkerPool::new(pool_config);

        Self {
            cache,
            renderer,
            screen,
            pool,
            inbox,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn create_cache(config: &ServiceConfig) -> Arc<SizedCache> {
        let budget = config.cache_budget_bytes();
        debug!(
            "page cache budget: {budget} bytes ({} / {})",
            config.host_budget_bytes, config.budget_fraction
        );
        Arc::new(SizedCache::new(budget))
    }

    /// Request one page at one width class for a consumer.
    ///
    /// On a cache hit the handle is delivered synchronously within this call;
    /// on a miss a decode is scheduled (or joined, if one for the same key is
    /// already in flight) and the call returns immediately.
    pub fn request_page(&self, width_class: &str, page: u32, consumer: &Arc<dyn PageConsumer>) {
        let key = PageKey::new(page, width_class);

        if let Some(handle) = self.cache.get(&key) {
            debug!("cache hit for {key}");
            consumer.set_image(handle);
            return;
        }

        debug!("cache miss for {key}, scheduling decode");
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let waiters = in_flight.entry(key).or_default();
            waiters.push(Arc::downgrade(consumer));
            if waiters.len() > 1 {
                // A decode for this key is already outstanding.
                return;
            }
        }

        let task = DecodeTask::new(
            page,
            width_class.to_string(),
            Arc::clone(&self.renderer),
            Arc::clone(&self.screen),
            Arc::clone(&self.cache),
        );
        self.pool.submit(move || task.run());
    }

    /// Deliver finished decodes to their waiting consumers.
    ///
    /// Must be called from the orchestrating (UI) thread; consumers are
    /// invoked on the caller's thread. Returns the number of deliveries made.
    /// An out-of-memory completion stops the pump and is returned as an
    /// error; completions behind it stay queued for the next call.
    pub fn pump_completions(&self) -> Result<usize, ServiceError> {
        let mut delivered = 0;

        while let Some(completion) = self.inbox.try_next() {
            let key = PageKey::new(completion.page, &completion.width_class);
            let waiters = self
                .in_flight
                .lock()
                .unwrap()
                .remove(&key)
                .unwrap_or_default();

            match completion.outcome {
                DecodeOutcome::Decoded(handle) => {
                    for waiter in waiters {
                        match waiter.upgrade() {
                            Some(consumer) => {
                                consumer.set_image(handle.clone());
                                delivered += 1;
                            }
                            None => warn!("consumer gone, dropping delivery for {key}"),
                        }
                    }
                }
                DecodeOutcome::Unavailable => {
                    warn!("no image available for {key}, consumers not updated");
                }
                DecodeOutcome::OutOfMemory => {
                    return Err(ServiceError::DecodeOutOfMemory {
                        page: completion.page,
                        width_class: completion.width_class,
                    });
                }
            }
        }

        Ok(delivered)
    }

    /// Evict every cached page (low-memory signal, explicit teardown).
    pub fn clear_cache(&self) {
        let before = self.cache.stats();
        debug!(
            "evicting all cached pages ({} entries, {} bytes)",
            before.entry_count, before.bytes_used
        );
        self.cache.evict_all();
        let after = self.cache.stats();
        debug!(
            "cache cleared ({} entries, {} bytes)",
            after.entry_count, after.bytes_used
        );
    }

    /// Shared handle to the underlying cache.
    pub fn cache(&self) -> &Arc<SizedCache> {
        &self.cache
    }

    /// Keys with a decode currently outstanding.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Stop the decode workers, waiting for the current job to finish.
    pub fn shutdown(self) {
        self.pool.shutdown();
    }
}
