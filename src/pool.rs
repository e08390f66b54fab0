//! The parallel-map capability consumed by the trace estimator.
//!
//! The estimator never depends on a concrete pool, only on [`TaskPool::map`]: run a batch
//! of independent closures and hand back their results in task order. Returning results
//! in task order, rather than in completion order, is what makes a seeded run
//! reproducible under any pool. [`TaskPool::submit`] hands a single task to the pool and
//! returns a [`TaskHandle`] to wait on.

use crate::error::{ErrorKind, SpectralError};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{Receiver, SyncSender, sync_channel},
};

/// The pending result of a task passed to [`TaskPool::submit`].
#[derive(Debug)]
pub struct TaskHandle<R> {
    receiver: Receiver<R>,
}

impl<R> TaskHandle<R> {
    fn channel() -> (SyncSender<R>, Self) {
        let (sender, receiver) = sync_channel(1);
        (sender, Self { receiver })
    }

    /// Blocks until the task has finished and returns its result. Fails with
    /// [`ErrorKind::PoolError`] if the task panicked on a worker thread.
    pub fn wait(self) -> Result<R, SpectralError> {
        self.receiver.recv().map_err(|_| {
            SpectralError::from(ErrorKind::PoolError(
                "the task ended without producing a result".to_string(),
            ))
        })
    }
}

pub trait TaskPool: Send + Sync {
    /// Number of tasks the pool runs concurrently; used as the default batch size.
    fn num_workers(&self) -> usize;

    /// Starts `task` and returns a handle to its result.
    fn submit<F, R>(&self, task: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static;

    /// Runs every task and returns the results in the order of `tasks`.
    fn map<F, R>(&self, tasks: Vec<F>) -> Vec<R>
    where
        F: FnOnce() -> R + Send,
        R: Send;
}

/// Runs tasks one after another on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialPool;

impl TaskPool for SequentialPool {
    fn num_workers(&self) -> usize {
        1
    }

    fn submit<F, R>(&self, task: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, handle) = TaskHandle::channel();
        // The buffer holds one result, so this never blocks.
        let _ = sender.send(task());
        handle
    }

    fn map<F, R>(&self, tasks: Vec<F>) -> Vec<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        tasks.into_iter().map(|task| task()).collect()
    }
}

/// Runs tasks on a rayon thread pool.
#[derive(Debug)]
pub struct RayonPool {
    pool: Option<ThreadPool>,
}

impl RayonPool {
    /// Builds a dedicated pool with `num_threads` workers (`0` lets rayon choose).
    pub fn new(num_threads: usize) -> Result<Self, SpectralError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("slq-worker-{i}"))
            .build()
            .map_err(|e| ErrorKind::PoolError(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Uses rayon's global pool.
    pub fn global() -> Self {
        Self { pool: None }
    }
}

impl TaskPool for RayonPool {
    fn num_workers(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn submit<F, R>(&self, task: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, handle) = TaskHandle::channel();
        // A panic must not reach rayon, whose default handler aborts the process.
        let job = move || {
            if let Ok(result) = panic::catch_unwind(AssertUnwindSafe(task)) {
                let _ = sender.send(result);
            }
        };
        match &self.pool {
            Some(pool) => pool.spawn(job),
            None => rayon::spawn(job),
        }
        handle
    }

    fn map<F, R>(&self, tasks: Vec<F>) -> Vec<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        let run = move || tasks.into_par_iter().map(|task| task()).collect::<Vec<R>>();
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}
