//! Folio page cache core
//!
//! Orchestrates page-image requests for a UI: cache hits are delivered
//! synchronously, misses schedule a decode on a worker pool, and completed
//! decodes are handed back to the requesting consumer on the orchestrating
//! thread - if that consumer still exists.

pub mod config;
pub mod retention;
pub mod service;
pub mod task;

pub use config::ServiceConfig;
pub use retention::CacheRetention;
pub use service::{PageCacheService, PageConsumer, ServiceError};
pub use task::{DecodeCompletion, DecodeOutcome, DecodeTask};
