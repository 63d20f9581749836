//! Fixed-size thread pool with a bounded task queue.
//!
//! Workers loop over a shared queue guarded by one mutex and two condition
//! variables: one wakes workers when the queue becomes non-empty, the other
//! wakes producers when a slot frees up. [`ThreadPool::submit`] blocks
//! while the queue is full. Shutdown is cooperative: graceful shutdown
//! drains the queue, immediate shutdown abandons pending tasks, and in
//! both modes a running task finishes before its worker exits.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::logging::{debug, targets};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How the pool winds down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Run all queued tasks, then exit.
    Graceful,
    /// Exit as soon as the currently-running tasks complete; queued tasks
    /// are dropped.
    Immediate,
}

/// Errors returned by pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPoolError {
    /// The pool is shutting down and accepts no new tasks.
    ShuttingDown,
}

impl std::fmt::Display for ThreadPoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadPoolError::ShuttingDown => write!(f, "thread pool is shutting down"),
        }
    }
}

impl std::error::Error for ThreadPoolError {}

struct PoolState {
    queue: VecDeque<Job>,
    shutdown: Option<ShutdownMode>,
}

struct Shared {
    state: Mutex<PoolState>,
    not_empty: Condvar,
    not_full: Condvar,
    queue_capacity: usize,
}

/// A pool of OS worker threads consuming a bounded task queue.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Creates a pool with `worker_count` threads and a queue bounded at
    /// `queue_capacity` tasks. Both are clamped to at least 1.
    #[must_use]
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                shutdown: None,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            queue_capacity: queue_capacity.max(1),
        });

        let workers = (0..worker_count)
            .map(|index| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("gatemcp-worker-{index}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn pool worker")
            })
            .collect();

        Self { shared, workers }
    }

    /// Recommended worker count for the current machine.
    ///
    /// Uses the `2 * cores + 1` heuristic; sizing is fixed at construction,
    /// so a supervisor that wants to resize recreates the pool.
    #[must_use]
    pub fn recommended_worker_count() -> usize {
        std::thread::available_parallelism()
            .map(|n| 2 * n.get() + 1)
            .unwrap_or(4)
    }

    /// Enqueues a task, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadPoolError::ShuttingDown`] once shutdown has begun,
    /// including for producers woken from a full-queue wait by shutdown.
    pub fn submit<F>(&self, job: F) -> Result<(), ThreadPoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self
            .shared
            .state
            .lock()
            .expect("thread pool lock poisoned");
        loop {
            if state.shutdown.is_some() {
                return Err(ThreadPoolError::ShuttingDown);
            }
            if state.queue.len() < self.shared.queue_capacity {
                state.queue.push_back(Box::new(job));
                self.shared.not_empty.notify_one();
                return Ok(());
            }
            state = self
                .shared
                .not_full
                .wait(state)
                .expect("thread pool lock poisoned");
        }
    }

    /// Returns the number of tasks currently queued (not running).
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared
            .state
            .lock()
            .expect("thread pool lock poisoned")
            .queue
            .len()
    }

    /// Returns the number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Returns true once shutdown has been requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shared
            .state
            .lock()
            .expect("thread pool lock poisoned")
            .shutdown
            .is_some()
    }

    /// Begins shutdown. Calling this more than once is a no-op, except
    /// that an upgrade from graceful to immediate takes effect.
    pub fn shutdown(&self, mode: ShutdownMode) {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .expect("thread pool lock poisoned");
            match (state.shutdown, mode) {
                // Never downgrade immediate back to graceful.
                (Some(ShutdownMode::Immediate), _) => {}
                (_, mode) => {
                    if mode == ShutdownMode::Immediate {
                        state.queue.clear();
                    }
                    state.shutdown = Some(mode);
                }
            }
        }
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        debug!(target: targets::SERVER, "Thread pool shutdown requested: {mode:?}");
    }

    /// Waits for all workers to exit. Implies a graceful shutdown if none
    /// was requested yet.
    pub fn join(mut self) {
        self.shutdown(ShutdownMode::Graceful);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown(ShutdownMode::Graceful);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers.len())
            .field("queue_capacity", &self.shared.queue_capacity)
            .finish()
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut state = shared.state.lock().expect("thread pool lock poisoned");
            loop {
                match state.shutdown {
                    Some(ShutdownMode::Immediate) => return,
                    Some(ShutdownMode::Graceful) if state.queue.is_empty() => return,
                    _ => {}
                }
                if let Some(job) = state.queue.pop_front() {
                    shared.not_full.notify_one();
                    break job;
                }
                state = shared
                    .not_empty
                    .wait(state)
                    .expect("thread pool lock poisoned");
            }
        };
        job();
    }
}
