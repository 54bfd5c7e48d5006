//! Scene-level worker pool
//!
//! Scenes share no data, so the per-scene pipeline is mapped over a rayon
//! pool. Results always come back in input order.

use dswe_core::Result;

/// How independent work items are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing on the global pool (all available cores)
    #[default]
    Parallel,
    /// Parallel on a dedicated pool with this many workers
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for an optional worker count from the command line
    pub fn from_threads(threads: Option<usize>) -> Self {
        match threads {
            Some(1) => ProcessingMode::Sequential,
            Some(n) if n > 1 => ProcessingMode::ParallelWith(n),
            _ => ProcessingMode::Parallel,
        }
    }

    /// Map `f` over `items`, preserving order
    pub fn map<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            match self {
                ProcessingMode::Sequential => Ok(items.iter().map(f).collect()),
                ProcessingMode::Parallel => Ok(items.par_iter().map(f).collect()),
                ProcessingMode::ParallelWith(threads) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(*threads)
                        .build()
                        .map_err(|e| dswe_core::Error::Other(format!("cannot build worker pool: {e}")))?;
                    Ok(pool.install(|| items.par_iter().map(f).collect()))
                }
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            Ok(items.iter().map(f).collect())
        }
    }
}

/// Number of workers the default mode uses
pub fn num_workers() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}
