//! Per-account transaction aggregation
//!
//! Parses every file of a [`FileGroup`] through the injected
//! [`StatementParser`], concatenates the results in group order, and flags
//! (but keeps) duplicate transactions. One bad file never aborts the group.

use crate::batch::account::FileGroup;
use crate::core::StatementParser;
use crate::strategy::{self, BatchConfig};
use crate::types::{DateRange, DuplicateKey, StatementError, Transaction};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Union of one group's transactions
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub account_id: String,
    /// Concatenated in group file order, duplicates retained
    pub transactions: Vec<Transaction>,
    /// Files that contributed transactions
    pub source_files: Vec<PathBuf>,
    /// Files skipped because validation or parsing failed
    pub skipped_files: Vec<(PathBuf, StatementError)>,
    /// Number of distinct duplicate keys seen more than once
    pub duplicate_clusters: usize,
    /// Filename period if available, otherwise the transaction date span
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Error)]
pub enum AggregationError {
    /// Cancellation observed between files; carries the files finished so far
    #[error("aggregation of account {} cancelled after {} file(s)", .0.account_id, .0.source_files.len() + .0.skipped_files.len())]
    Cancelled(Aggregation),
}

/// Count duplicate clusters, warning once per cluster
///
/// Two transactions are duplicates when date, amount, party, and currency
/// match. Nothing is removed.
pub fn detect_duplicates(account_id: &str, transactions: &[Transaction]) -> usize {
    let mut seen: HashMap<DuplicateKey, usize> = HashMap::with_capacity(transactions.len());
    let mut clusters = 0;

    for tx in transactions {
        let count = seen.entry(tx.duplicate_key()).or_insert(0);
        *count += 1;
        if *count == 2 {
            clusters += 1;
            warn!(account = %account_id, key = %tx.duplicate_key(), "possible duplicate transaction");
        }
    }
    clusters
}

/// Stable ascending sort by (date, value date, amount)
pub fn sort_transactions(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.value_date.cmp(&b.value_date))
            .then_with(|| a.amount.cmp(&b.amount))
    });
}

/// Prefer the filename period; fall back to the transaction date span
pub fn resolve_date_range(
    filename_range: Option<DateRange>,
    transactions: &[Transaction],
) -> Option<DateRange> {
    match filename_range {
        Some(range) if !range.is_zero() => Some(range),
        _ => DateRange::from_transactions(transactions),
    }
}

/// Aggregates file groups through an injected parser
pub struct BatchAggregator {
    parser: Arc<dyn StatementParser>,
    config: BatchConfig,
}

impl BatchAggregator {
    pub fn new(parser: Arc<dyn StatementParser>, config: BatchConfig) -> Self {
        Self { parser, config }
    }

    /// Validate, parse, and union every file of a group
    ///
    /// Invalid or unreadable files are logged and skipped. If `cancel` fires
    /// before all files were visited, the finished part comes back inside
    /// [`AggregationError::Cancelled`].
    pub fn aggregate_transactions(
        &self,
        group: &FileGroup,
        cancel: &CancellationToken,
    ) -> Result<Aggregation, AggregationError> {
        let strategy = strategy::select(group.files.len(), &self.config);
        debug!(
            account = %group.account_id,
            files = group.files.len(),
            strategy = strategy.name(),
            "aggregating group"
        );

        let outcomes = strategy.parse_files(&group.files, Arc::clone(&self.parser), cancel);
        let visited = outcomes.len();

        let mut transactions = Vec::new();
        let mut source_files = Vec::new();
        let mut skipped_files = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(parsed) => {
                    debug!(file = %outcome.path.display(), count = parsed.len(), "parsed file");
                    transactions.extend(parsed);
                    source_files.push(outcome.path);
                }
                Err(e) => {
                    warn!(file = %outcome.path.display(), error = %e, "skipping file");
                    skipped_files.push((outcome.path, e));
                }
            }
        }

        let duplicate_clusters = detect_duplicates(&group.account_id, &transactions);
        let date_range = resolve_date_range(group.date_range, &transactions);

        let aggregation = Aggregation {
            account_id: group.account_id.clone(),
            transactions,
            source_files,
            skipped_files,
            duplicate_clusters,
            date_range,
        };

        if visited < group.files.len() {
            return Err(AggregationError::Cancelled(aggregation));
        }
        Ok(aggregation)
    }
}
