//! Parallel execution strategy
//!
//! This module provides a bounded worker pool built on a tokio multi-threaded
//! runtime. Work is split into one contiguous chunk per worker; each chunk runs
//! in its own task and the chunk results are reassembled in chunk order.
//!
//! # Architecture
//!
//! ```text
//! ParallelStrategy
//!     ├── BatchConfig (workers, parallel_threshold)
//!     └── tokio runtime (worker_threads = workers)
//!         ├── task: chunk 0 ─┐
//!         ├── task: chunk 1 ─┼── join in spawn order → results in input order
//!         └── task: chunk N ─┘
//! ```
//!
//! Blocking work (file I/O, AI calls) runs directly inside the tasks; the
//! pool size bounds how many of those run at once.

use crate::core::{CategorizationEngine, StatementParser};
use crate::strategy::{ExecutionStrategy, FileOutcome, SequentialStrategy};
use crate::types::{StatementError, Transaction, UNCATEGORIZED};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Configuration for batch processing
///
/// Controls the worker pool size and the input volume at which the pool is used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Minimum number of items before the worker pool is used
    pub parallel_threshold: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            parallel_threshold: 100,
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// A worker count of zero falls back to the default.
    pub fn new(workers: usize, parallel_threshold: usize) -> Self {
        let default = Self::default();

        let workers = if workers == 0 {
            warn!(
                "invalid worker count ({}), using default ({})",
                workers, default.workers
            );
            default.workers
        } else {
            workers
        };

        Self {
            workers,
            parallel_threshold,
        }
    }
}

/// Worker-pool strategy
#[derive(Debug, Clone)]
pub struct ParallelStrategy {
    workers: usize,
}

impl ParallelStrategy {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Run `work` over every item on the pool, returning results in input order
    ///
    /// Items of a chunk whose task panicked are mapped through `recover`.
    fn run_chunked<T, R, W, F>(&self, items: Vec<T>, work: W, recover: F) -> Result<Vec<R>, String>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        W: Fn(&T) -> Option<R> + Send + Sync + 'static,
        F: Fn(&T) -> R,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.workers)
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let items = Arc::new(items);
        let work = Arc::new(work);
        let chunk_size = items.len().div_ceil(self.workers);

        let chunk_results = runtime.block_on(async {
            let mut tasks = Vec::new();
            for start in (0..items.len()).step_by(chunk_size) {
                let end = (start + chunk_size).min(items.len());
                let items = Arc::clone(&items);
                let work = Arc::clone(&work);
                let task = tokio::spawn(async move {
                    let mut out = Vec::with_capacity(end - start);
                    for item in &items[start..end] {
                        match work(item) {
                            Some(result) => out.push(result),
                            None => break,
                        }
                    }
                    out
                });
                tasks.push((start..end, task));
            }

            let mut results = Vec::with_capacity(tasks.len());
            for (range, task) in tasks {
                results.push((range, task.await));
            }
            results
        });

        let mut results = Vec::with_capacity(items.len());
        for (range, chunk) in chunk_results {
            match chunk {
                Ok(chunk) => results.extend(chunk),
                Err(e) => {
                    error!("Task panicked: {:?}", e);
                    results.extend(items[range].iter().map(&recover));
                }
            }
        }
        Ok(results)
    }
}

impl ExecutionStrategy for ParallelStrategy {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn parse_files(
        &self,
        files: &[PathBuf],
        parser: Arc<dyn StatementParser>,
        cancel: &CancellationToken,
    ) -> Vec<FileOutcome> {
        let token = cancel.clone();
        let worker_parser = Arc::clone(&parser);
        let result = self.run_chunked(
            files.to_vec(),
            move |path: &PathBuf| {
                if token.is_cancelled() {
                    return None;
                }
                Some(FileOutcome {
                    path: path.clone(),
                    result: worker_parser.load(path),
                })
            },
            |path: &PathBuf| FileOutcome {
                path: path.clone(),
                result: Err(StatementError::parse(
                    path.display().to_string(),
                    None,
                    "parser worker panicked",
                )),
            },
        );

        match result {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(error = %e, "worker pool unavailable, parsing sequentially");
                SequentialStrategy.parse_files(files, parser, cancel)
            }
        }
    }

    fn categorize(
        &self,
        engine: Arc<CategorizationEngine>,
        transactions: Vec<Transaction>,
    ) -> Vec<Transaction> {
        let worker_engine = Arc::clone(&engine);
        // Keep a copy so the sequential fallback still sees every transaction
        let fallback = transactions.clone();
        let result = self.run_chunked(
            transactions,
            move |tx: &Transaction| Some(worker_engine.categorize_transaction(tx)),
            |tx: &Transaction| tx.with_category(UNCATEGORIZED),
        );

        match result {
            Ok(categorized) => categorized,
            Err(e) => {
                warn!(error = %e, "worker pool unavailable, categorizing sequentially");
                SequentialStrategy.categorize(engine, fallback)
            }
        }
    }
}
