//! Sequential execution strategy
//!
//! Processes every item on the calling thread. Used below the parallel
//! threshold, where spinning up a worker pool costs more than it saves.

use crate::core::{CategorizationEngine, StatementParser};
use crate::strategy::{ExecutionStrategy, FileOutcome};
use crate::types::Transaction;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Single-threaded strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialStrategy;

impl ExecutionStrategy for SequentialStrategy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn parse_files(
        &self,
        files: &[PathBuf],
        parser: Arc<dyn StatementParser>,
        cancel: &CancellationToken,
    ) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for path in files {
            if cancel.is_cancelled() {
                break;
            }
            outcomes.push(FileOutcome {
                path: path.clone(),
                result: parser.load(path),
            });
        }
        outcomes
    }

    fn categorize(
        &self,
        engine: Arc<CategorizationEngine>,
        transactions: Vec<Transaction>,
    ) -> Vec<Transaction> {
        transactions
            .iter()
            .map(|tx| engine.categorize_transaction(tx))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CategoryStore, StorePaths};
    use crate::io::CsvStatementParser;
    use crate::types::Category;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "Date,ValueDate,Amount,Currency,PartyName,IsDebtor,Description,Category,SubCategory\n";

    #[test]
    fn test_parse_files_keeps_input_order_and_reports_failures() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        let missing = dir.path().join("missing.csv");
        fs::write(&a, format!("{}2025-01-02,,-10.00,CHF,Coop,true,food,,\n", HEADER)).unwrap();
        fs::write(&b, format!("{}2025-01-01,,-5.00,CHF,SBB,true,ticket,,\n", HEADER)).unwrap();

        let files = vec![a.clone(), missing.clone(), b.clone()];
        let outcomes = SequentialStrategy.parse_files(&files, Arc::new(CsvStatementParser), &CancellationToken::new());

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].path, a);
        assert_eq!(outcomes[0].result.as_ref().unwrap().len(), 1);
        assert!(outcomes[1].result.is_err());
        assert_eq!(outcomes[2].path, b);
    }

    #[test]
    fn test_parse_files_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = SequentialStrategy.parse_files(
            &[PathBuf::from("a.csv")],
            Arc::new(CsvStatementParser),
            &cancel,
        );
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_categorize_preserves_order() {
        let store = Arc::new(CategoryStore::with_tables(
            StorePaths::in_dir("unused"),
            vec![Category::new("Transport", vec!["sbb".into()])],
            &[],
            &[],
        ));
        let engine = Arc::new(CategorizationEngine::new(store));
        let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let txs = vec![
            Transaction::new(date, rust_decimal::Decimal::ONE, "CHF", "SBB", true, ""),
            Transaction::new(date, rust_decimal::Decimal::TWO, "CHF", "Other", true, ""),
        ];

        let categorized = SequentialStrategy.categorize(engine, txs);
        assert_eq!(categorized[0].category, "Transport");
        assert_eq!(categorized[1].category, "Uncategorized");
    }
}
