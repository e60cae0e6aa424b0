//! FIFO job queue shared between submitters and workers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A unit of decode work: runs on a worker thread and produces one
/// completion value for the orchestrating thread.
pub type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Scheduler counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    /// Total jobs submitted
    pub jobs_submitted: u64,

    /// Total jobs run to completion
    pub jobs_completed: u64,

    /// Jobs currently waiting in the queue
    pub queue_size: usize,
}

/// Thread-safe FIFO queue of pending jobs.
///
/// Submission order is execution order; with a single worker this serializes
/// all decode work, which is the historical scheduling contract.
pub struct JobQueue<T> {
    jobs: Mutex<VecDeque<Job<T>>>,
    submitted: AtomicU64,
    completed: AtomicU64,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Append a job to the back of the queue.
    pub fn push(&self, job: Job<T>) {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push_back(job);
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the oldest pending job, if any.
    pub fn pop(&self) -> Option<Job<T>> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.pop_front()
    }

    /// Record that a popped job finished running.
    pub fn mark_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            jobs_submitted: self.submitted.load(Ordering::Relaxed),
            jobs_completed: self.completed.load(Ordering::Relaxed),
            queue_size: self.len(),
        }
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
