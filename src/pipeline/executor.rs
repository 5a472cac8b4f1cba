use std::num::NonZeroUsize;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Worker count used when running under CI.
pub const CONSTRAINED_WORKERS: usize = 2;

/// `min(limit, hardware)`、制約環境では常に2。
#[must_use]
pub fn worker_count(limit: NonZeroUsize, hardware: usize, constrained: bool) -> usize {
    if constrained {
        return CONSTRAINED_WORKERS;
    }
    limit.get().min(hardware.max(1))
}

/// ステージ間で使い回す有界ワーカープール。
///
/// Built once per app run. `map` preserves input order and fails fast.
#[derive(Debug)]
pub struct ParallelMapExecutor {
    pool: ThreadPool,
}

impl ParallelMapExecutor {
    /// # Errors
    /// Returns [`PipelineError::Configuration`] if the pool cannot be spawned.
    pub fn new(workers: usize) -> PipelineResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|idx| format!("insight-worker-{idx}"))
            .build()
            .map_err(|err| PipelineError::config(format!("failed to build worker pool: {err}")))?;
        debug!(workers = pool.current_num_threads(), "worker pool started");
        Ok(Self { pool })
    }

    /// Sizes the pool from the configured limit and the available cores.
    ///
    /// # Errors
    /// See [`ParallelMapExecutor::new`].
    pub fn from_limit(limit: NonZeroUsize, constrained: bool) -> PipelineResult<Self> {
        Self::new(worker_count(limit, num_cpus::get(), constrained))
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Applies `transform` to every item; `result[i] == transform(items[i])`.
    ///
    /// The first error aborts the call and no partial output is returned.
    ///
    /// # Errors
    /// Propagates the error returned by `transform`.
    pub fn map<T, U, F>(&self, items: Vec<T>, transform: F) -> PipelineResult<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> PipelineResult<U> + Send + Sync,
    {
        self.pool
            .install(|| items.into_par_iter().map(&transform).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    fn limit(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).expect("non-zero")
    }

    #[rstest]
    #[case(8, 4, false, 4)]
    #[case(2, 16, false, 2)]
    #[case(8, 0, false, 1)]
    #[case(8, 64, true, 2)]
    #[case(1, 1, true, 2)]
    fn worker_count_follows_limits(
        #[case] configured: usize,
        #[case] hardware: usize,
        #[case] constrained: bool,
        #[case] expected: usize,
    ) {
        assert_eq!(worker_count(limit(configured), hardware, constrained), expected);
    }

    #[test]
    fn constrained_pool_has_two_workers() {
        let executor = ParallelMapExecutor::from_limit(limit(32), true).expect("pool");
        assert_eq!(executor.workers(), 2);
    }

    #[test]
    fn map_preserves_input_order() {
        let executor = ParallelMapExecutor::new(4).expect("pool");
        let items: Vec<u64> = (0..200).collect();

        let results = executor
            .map(items, |item| {
                // later items finish first
                std::thread::sleep(Duration::from_micros(200 - item));
                Ok(item * 2)
            })
            .expect("map succeeds");

        assert_eq!(results, (0..200).map(|item| item * 2).collect::<Vec<_>>());
    }

    #[test]
    fn map_fails_fast_on_worker_error() {
        let executor = ParallelMapExecutor::new(2).expect("pool");

        let result = executor.map((0..50).collect::<Vec<u32>>(), |item| {
            if item == 17 {
                Err(PipelineError::WorkerExecution {
                    stage: "test",
                    review_id: item.to_string(),
                    reason: "boom".into(),
                })
            } else {
                Ok(item)
            }
        });

        assert!(matches!(
            result,
            Err(PipelineError::WorkerExecution { ref review_id, .. }) if review_id == "17"
        ));
    }

    #[test]
    fn pool_is_reusable_across_calls() {
        let executor = ParallelMapExecutor::new(2).expect("pool");
        let first = executor.map(vec![1, 2, 3], |x| Ok(x + 1)).expect("first");
        let second = executor.map(first, |x| Ok(x * 10)).expect("second");
        assert_eq!(second, vec![20, 30, 40]);
    }
}
