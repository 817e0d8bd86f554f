use super::error::EngineError;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Fixed-size pool for independent (variable, geography) units.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, EngineError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("factfinder-worker-{}", i))
            .build()
            .map_err(|e| EngineError::Pool(e.to_string()))?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Maps every item in parallel; results keep item order. The first
    /// failure fails the whole call.
    pub fn map<T, R, E, F>(&self, items: &[T], f: F) -> Result<Vec<R>, E>
    where
        T: Sync,
        R: Send,
        E: Send,
        F: Fn(&T) -> Result<R, E> + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(|item| f(item)).collect())
    }

    /// Like [`WorkerPool::map`] but keeps every outcome.
    pub fn map_all<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(|item| f(item)).collect())
    }
}
