//! Decode worker pool with completion marshaling.
//!
//! Workers pull jobs from the shared FIFO queue, run them off the
//! orchestrating thread, and send each completion value into an inbox that
//! only the orchestrating thread drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::queue::{JobQueue, SchedulerStats};

/// Configuration for the decode worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads. Default: 1, the serialized historical
    /// contract; larger values give bounded concurrency.
    pub num_workers: usize,

    /// How long an idle worker sleeps before re-checking the queue.
    /// Default: 100ms.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 1,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WorkerPoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Receiving end of completed jobs.
///
/// Held and drained by the orchestrating thread only; this is what marshals
/// decode results back off the worker threads.
pub struct CompletionInbox<T> {
    rx: Receiver<T>,
}

impl<T> CompletionInbox<T> {
    /// Take the next completion without blocking.
    pub fn try_next(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain every completion currently available.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(value) = self.try_next() {
            out.push(value);
        }
        out
    }
}

/// Pool of decode worker threads.
///
/// Jobs are closures producing a completion value `T`; completions arrive in
/// the paired [`CompletionInbox`]. Shutdown is cooperative: workers finish
/// their current job, then exit.
pub struct WorkerPool<T> {
    queue: Arc<JobQueue<T>>,
    tx: Sender<T>,
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Create and start a pool, returning it with its completion inbox.
    pub fn new(config: WorkerPoolConfig) -> (Self, CompletionInbox<T>) {
        let queue = Arc::new(JobQueue::new());
        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.num_workers);
        for id in 0..config.num_workers {
            workers.push(Worker::new(
                id,
                Arc::clone(&queue),
                tx.clone(),
                Arc::clone(&shutdown),
                config.poll_interval,
            ));
        }

        (
            Self {
                queue,
                tx,
                workers,
                shutdown,
            },
            CompletionInbox { rx },
        )
    }

    /// Submit a job for execution.
    pub fn submit(&self, job: impl FnOnce() -> T + Send + 'static) {
        self.queue.push(Box::new(job));
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting in the queue (not counting the one a worker may be
    /// running).
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.queue.stats()
    }

    /// Signal workers to stop and wait for them to finish their current job.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        drop(self.tx);
        for worker in self.workers {
            worker.join();
        }
    }
}

struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn new<T: Send + 'static>(
        id: usize,
        queue: Arc<JobQueue<T>>,
        tx: Sender<T>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Self {
        let thread = thread::Builder::new()
            .name(format!("folio-decode-worker-{id}"))
            .spawn(move || Self::run(queue, tx, shutdown, poll_interval))
            .expect("failed to spawn decode worker");

        Self {
            thread: Some(thread),
        }
    }

    fn run<T: Send + 'static>(
        queue: Arc<JobQueue<T>>,
        tx: Sender<T>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            if let Some(job) = queue.pop() {
                let completion = job();
                queue.mark_completed();
                // The inbox may already be gone during teardown.
                let _ = tx.send(completion);
            } else {
                thread::sleep(poll_interval);
            }
        }
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            thread.join().expect("decode worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn test_config(workers: usize) -> WorkerPoolConfig {
        WorkerPoolConfig::new(workers).with_poll_interval(Duration::from_millis(2))
    }

    fn wait_for<T>(inbox: &CompletionInbox<T>, count: usize) -> Vec<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = Vec::new();
        while received.len() < count {
            assert!(Instant::now() < deadline, "timed out waiting for completions");
            match inbox.try_next() {
                Some(value) => received.push(value),
                None => thread::sleep(Duration::from_millis(2)),
            }
        }
        received
    }

    #[test]
    fn config_defaults_to_single_worker() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.num_workers, 1);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let config = WorkerPoolConfig::new(0);
        assert_eq!(config.num_workers, 1);
    }

    #[test]
    fn completions_arrive_in_inbox() {
        let (pool, inbox) = WorkerPool::new(test_config(1));

        for i in 0..5u32 {
            pool.submit(move || i * 10);
        }

        let mut received = wait_for(&inbox, 5);
        received.sort_unstable();
        assert_eq!(received, vec![0, 10, 20, 30, 40]);

        let stats = pool.stats();
        assert_eq!(stats.jobs_submitted, 5);
        assert_eq!(stats.jobs_completed, 5);

        pool.shutdown();
    }

    #[test]
    fn single_worker_preserves_submission_order() {
        let (pool, inbox) = WorkerPool::new(test_config(1));

        for i in 0..8u32 {
            pool.submit(move || i);
        }

        let received = wait_for(&inbox, 8);
        assert_eq!(received, (0..8).collect::<Vec<_>>());

        pool.shutdown();
    }

    #[test]
    fn multiple_workers_run_all_jobs() {
        let (pool, inbox) = WorkerPool::new(test_config(3));
        assert_eq!(pool.num_workers(), 3);

        for i in 0..20u32 {
            pool.submit(move || {
                thread::sleep(Duration::from_millis(1));
                i
            });
        }

        let mut received = wait_for(&inbox, 20);
        received.sort_unstable();
        assert_eq!(received, (0..20).collect::<Vec<_>>());

        pool.shutdown();
    }

    #[test]
    fn shutdown_joins_workers() {
        let (pool, _inbox) = WorkerPool::<u32>::new(test_config(2));
        pool.submit(|| 1);
        pool.shutdown();
        // Success is completing without hanging.
    }
}
