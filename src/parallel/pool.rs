//! Worker pool for sweep workloads.
//!
//! A sweep's runs are independent, so the only tunable is how many of
//! them execute at once. [`WorkerPool::with_workers`] builds a dedicated
//! Rayon pool up front and reuses it across sweeps;
//! [`WorkerPool::default_workers`] defers to the global pool instead.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::sim::error::{SimError, SimResult};

/// Bounds how many sweep runs execute concurrently.
#[derive(Debug, Default)]
pub struct WorkerPool {
    /// Dedicated pool; `None` means the global Rayon pool (all cores).
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    /// Use the global Rayon pool (all available CPU cores).
    pub fn default_workers() -> Self {
        Self::default()
    }

    /// Build a dedicated pool with exactly `n` worker threads.
    pub fn with_workers(n: usize) -> SimResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|err| SimError::Config(format!("worker pool: {err}")))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Worker count, or 0 when deferring to the global pool.
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(0, ThreadPool::current_num_threads)
    }

    /// Run a closure inside this pool's scope.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}
