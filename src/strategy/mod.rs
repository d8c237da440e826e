//! Execution strategies for per-file parsing and per-transaction categorization
//!
//! Small inputs run sequentially on the calling thread; once the number of
//! items reaches the configured threshold a bounded worker pool takes over.
//! Both strategies return results in input order, so callers never observe
//! which worker finished first.

use crate::core::{CategorizationEngine, StatementParser};
use crate::types::{StatementError, Transaction};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod parallel;
pub mod sequential;

pub use parallel::{BatchConfig, ParallelStrategy};
pub use sequential::SequentialStrategy;

/// Result of loading one statement file
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<Vec<Transaction>, StatementError>,
}

/// Processing strategy for the batch pipeline's parallelizable steps
pub trait ExecutionStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Validate and parse each file
    ///
    /// Returns one outcome per file actually visited, in input order. Files
    /// not yet started when `cancel` fires are omitted.
    fn parse_files(
        &self,
        files: &[PathBuf],
        parser: Arc<dyn StatementParser>,
        cancel: &CancellationToken,
    ) -> Vec<FileOutcome>;

    /// Categorize every transaction, preserving input order and count
    fn categorize(
        &self,
        engine: Arc<CategorizationEngine>,
        transactions: Vec<Transaction>,
    ) -> Vec<Transaction>;
}

/// Pick a strategy for `item_count` items
///
/// Parallel processing is used once the count reaches the threshold and
/// more than one worker is configured.
pub fn select(item_count: usize, config: &BatchConfig) -> Box<dyn ExecutionStrategy> {
    if config.workers > 1 && item_count >= config.parallel_threshold {
        debug!(item_count, workers = config.workers, "using parallel strategy");
        Box::new(ParallelStrategy::new(config.workers))
    } else {
        debug!(item_count, "using sequential strategy");
        Box::new(SequentialStrategy)
    }
}
