//! Folio decode scheduler
//!
//! Runs decode jobs on a bounded pool of worker threads (one by default,
//! which serializes work FIFO) and marshals each job's completion value back
//! to the orchestrating thread through a completion inbox.

pub mod queue;
pub mod worker;

pub use queue::{JobQueue, SchedulerStats};
pub use worker::{CompletionInbox, WorkerPool, WorkerPoolConfig};
