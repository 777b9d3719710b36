//! Executor for the per-tick body and controller work lists.
//!
//! Both modes run the same closure over the same slice; only the dispatch
//! differs. Each unit must touch nothing but its own state and
//! internally-locked backend calls.

use bevy_ecs::prelude::Resource;
use log::{info, warn};
use rayon::prelude::*;

use super::simconfig::SimConfig;

#[derive(Resource)]
pub enum UpdateExecutor {
    /// Units run one after another in list order.
    Sequential,
    /// Units run on a fixed rayon pool.
    Pool(rayon::ThreadPool),
}

impl UpdateExecutor {
    /// Build the executor described by `[threads]`.
    pub fn from_config(config: &SimConfig) -> Self {
        if !config.parallel {
            return UpdateExecutor::Sequential;
        }
        Self::pool(config.workers)
    }

    /// Pool executor with `workers` threads (0 = one per core).
    pub fn pool(workers: usize) -> Self {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("robosim-worker-{i}"))
            .build()
        {
            Ok(pool) => {
                info!("Update pool started with {} workers", pool.current_num_threads());
                UpdateExecutor::Pool(pool)
            }
            Err(e) => {
                warn!("Failed to start update pool, running sequentially: {}", e);
                UpdateExecutor::Sequential
            }
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, UpdateExecutor::Pool(_))
    }

    /// Apply `f` to every unit.
    pub fn run<T, F>(&self, units: &mut [T], f: F)
    where
        T: Send,
        F: Fn(&mut T) + Sync + Send,
    {
        match self {
            UpdateExecutor::Sequential => units.iter_mut().for_each(f),
            UpdateExecutor::Pool(pool) => pool.install(|| units.par_iter_mut().for_each(f)),
        }
    }
}
