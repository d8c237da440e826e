//! Batch consolidation runner
//!
//! Drives one run through
//! `Idle → Discovering → Grouping → {Aggregating → Sorting → Writing}* → Done`.
//! Failures are contained per file and per group; only a missing or empty
//! input directory, an input where every file is rejected, or an unusable
//! output directory aborts the run.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     ├── BatchAggregator ── StatementParser (validate + parse per file)
//!     ├── CategorizationEngine (shared, Arc)
//!     └── StatementWriter
//! ```

use crate::batch::account::{group_files_by_account, FileGroup};
use crate::batch::aggregator::{sort_transactions, AggregationError, BatchAggregator};
use crate::batch::naming::{generate_output_filename, generate_source_file_header};
use crate::core::{CategorizationEngine, StatementParser, StatementWriter};
use crate::strategy::{self, BatchConfig};
use crate::types::{StatementError, Transaction};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Processing phase of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Discovering,
    Grouping,
    Aggregating,
    Sorting,
    Writing,
    Done,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchPhase::Idle => "idle",
            BatchPhase::Discovering => "discovering",
            BatchPhase::Grouping => "grouping",
            BatchPhase::Aggregating => "aggregating",
            BatchPhase::Sorting => "sorting",
            BatchPhase::Writing => "writing",
            BatchPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub files_total: usize,
    pub groups_total: usize,
    pub groups_written: usize,
    pub files_skipped: usize,
    pub duplicate_clusters: usize,
    pub transactions_written: usize,
    pub outputs: Vec<PathBuf>,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} account group(s) consolidated, {} transaction(s) written, {} file(s) skipped, {} possible duplicate cluster(s)",
            self.groups_written,
            self.groups_total,
            self.transactions_written,
            self.files_skipped,
            self.duplicate_clusters
        )
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    /// Cancellation observed; carries everything finished before it
    #[error("batch cancelled: {0}")]
    Cancelled(BatchReport),

    /// The run could not start or continue at all
    #[error(transparent)]
    Fatal(#[from] StatementError),
}

/// Batch consolidation runner
pub struct BatchProcessor {
    engine: Arc<CategorizationEngine>,
    parser: Arc<dyn StatementParser>,
    writer: Arc<dyn StatementWriter>,
    aggregator: BatchAggregator,
    config: BatchConfig,
    overwrite_with_backup: bool,
    phase: BatchPhase,
}

impl BatchProcessor {
    /// Create a processor
    ///
    /// # Arguments
    ///
    /// * `engine` - Shared categorization engine (owns the category store)
    /// * `parser` - Statement parser used for every input file
    /// * `writer` - Output writer for consolidated files
    /// * `config` - Worker pool settings
    pub fn new(
        engine: Arc<CategorizationEngine>,
        parser: Arc<dyn StatementParser>,
        writer: Arc<dyn StatementWriter>,
        config: BatchConfig,
    ) -> Self {
        Self {
            aggregator: BatchAggregator::new(Arc::clone(&parser), config.clone()),
            engine,
            parser,
            writer,
            config,
            overwrite_with_backup: false,
            phase: BatchPhase::Idle,
        }
    }

    /// Flush learned mappings with backup-and-overwrite instead of a merge
    pub fn with_overwrite_on_flush(mut self, enabled: bool) -> Self {
        self.overwrite_with_backup = enabled;
        self
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn engine(&self) -> &Arc<CategorizationEngine> {
        &self.engine
    }

    fn enter(&mut self, phase: BatchPhase) {
        debug!(from = %self.phase, to = %phase, "batch phase");
        self.phase = phase;
    }

    /// Consolidate every statement in `input_dir` into `output_dir`
    ///
    /// Learned mappings are flushed at the end of the run, including after a
    /// cancellation; a flush failure is only logged.
    ///
    /// # Errors
    ///
    /// * `BatchError::Fatal` - input directory missing, unreadable, or empty;
    ///   every discovered file skipped; output directory cannot be created
    /// * `BatchError::Cancelled` - `cancel` fired; carries the partial report
    pub fn run(
        &mut self,
        input_dir: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        self.phase = BatchPhase::Idle;

        self.enter(BatchPhase::Discovering);
        let files = discover_files(input_dir)?;
        fs::create_dir_all(output_dir).map_err(StatementError::from)?;

        self.enter(BatchPhase::Grouping);
        let groups = group_files_by_account(&files);
        info!(files = files.len(), groups = groups.len(), "discovered statement files");

        let mut report = BatchReport {
            files_total: files.len(),
            groups_total: groups.len(),
            ..BatchReport::default()
        };
        let mut used_names: HashSet<String> = HashSet::new();

        for group in &groups {
            if cancel.is_cancelled() {
                return Err(self.cancelled(report));
            }

            if let Err(cancelled) =
                self.process_group(group, output_dir, cancel, &mut report, &mut used_names)
            {
                return Err(self.cancelled(cancelled));
            }
        }

        self.flush();
        self.enter(BatchPhase::Done);

        if report.files_skipped == report.files_total {
            return Err(BatchError::Fatal(StatementError::NoReadableFiles {
                path: input_dir.display().to_string(),
                count: report.files_total,
            }));
        }

        info!("{}", report);
        Ok(report)
    }

    /// Returns `Err` with the report when cancellation interrupted the group
    fn process_group(
        &mut self,
        group: &FileGroup,
        output_dir: &Path,
        cancel: &CancellationToken,
        report: &mut BatchReport,
        used_names: &mut HashSet<String>,
    ) -> Result<(), BatchReport> {
        self.enter(BatchPhase::Aggregating);
        let aggregation = match self.aggregator.aggregate_transactions(group, cancel) {
            Ok(aggregation) => aggregation,
            Err(AggregationError::Cancelled(partial)) => {
                report.files_skipped += partial.skipped_files.len();
                warn!(
                    account = %partial.account_id,
                    parsed = partial.transactions.len(),
                    "group interrupted, partial result not written"
                );
                return Err(report.clone());
            }
        };

        report.files_skipped += aggregation.skipped_files.len();
        report.duplicate_clusters += aggregation.duplicate_clusters;

        let date_range = match aggregation.date_range {
            Some(range) if !aggregation.transactions.is_empty() => range,
            _ => {
                warn!(account = %group.account_id, "no transactions in group, skipping");
                return Ok(());
            }
        };

        let categorized = self.categorize(aggregation.transactions);

        self.enter(BatchPhase::Sorting);
        let mut transactions = categorized;
        sort_transactions(&mut transactions);

        self.enter(BatchPhase::Writing);
        let file_name = unique_name(
            generate_output_filename(&aggregation.account_id, &date_range),
            used_names,
        );
        let output = output_dir.join(&file_name);
        let sources: Vec<String> = aggregation
            .source_files
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect();
        let header = generate_source_file_header(&sources);

        match self.writer.write(&transactions, &output, &header) {
            Ok(()) => {
                info!(
                    account = %aggregation.account_id,
                    output = %output.display(),
                    transactions = transactions.len(),
                    "wrote consolidated statement"
                );
                report.groups_written += 1;
                report.transactions_written += transactions.len();
                report.outputs.push(output);
            }
            Err(e) => {
                warn!(account = %aggregation.account_id, error = %e, "failed to write group, skipping");
            }
        }
        Ok(())
    }

    fn categorize(&self, transactions: Vec<Transaction>) -> Vec<Transaction> {
        let strategy = strategy::select(transactions.len(), &self.config);
        strategy.categorize(Arc::clone(&self.engine), transactions)
    }

    fn cancelled(&mut self, report: BatchReport) -> BatchError {
        warn!("cancellation requested, stopping batch run");
        self.flush();
        self.enter(BatchPhase::Done);
        BatchError::Cancelled(report)
    }

    fn flush(&self) {
        let result = if self.overwrite_with_backup {
            if self.engine.store().pending_changes() == 0 {
                Ok(())
            } else {
                self.engine.store().overwrite_with_backup().map(|backups| {
                    info!(backups = backups.len(), "mapping tables overwritten");
                })
            }
        } else {
            self.engine.flush()
        };

        if let Err(e) = result {
            warn!(error = %e, "failed to persist learned mappings");
        }
    }

    /// Categorize and sort a single statement file
    ///
    /// Returns the number of transactions written.
    pub fn categorize_file(&self, input: &Path, output: &Path) -> Result<usize, StatementError> {
        let transactions = self.parser.load(input)?;
        let mut categorized = self.categorize(transactions);
        sort_transactions(&mut categorized);

        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.writer
            .write(&categorized, output, &generate_source_file_header(&[name]))?;
        self.flush();
        Ok(categorized.len())
    }
}

/// Regular, non-hidden files directly inside `dir`, sorted by name
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, StatementError> {
    if !dir.is_dir() {
        return Err(StatementError::FileNotFound {
            path: dir.display().to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }

    if files.is_empty() {
        return Err(StatementError::NoInputFiles {
            path: dir.display().to_string(),
        });
    }

    files.sort();
    Ok(files)
}

fn unique_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }

    let stem = name.trim_end_matches(".csv");
    let mut counter = 2;
    loop {
        let candidate = format!("{}_{}.csv", stem, counter);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CategoryStore, StorePaths};
    use crate::io::{CsvStatementParser, CsvStatementWriter};
    use crate::types::Category;
    use tempfile::TempDir;

    const HEADER: &str = "Date,ValueDate,Amount,Currency,PartyName,IsDebtor,Description,Category,SubCategory\n";

    fn processor(config_dir: &Path) -> BatchProcessor {
        let store = Arc::new(CategoryStore::with_tables(
            StorePaths::in_dir(config_dir),
            vec![Category::new("Transport", vec!["sbb".into()])],
            &[],
            &[("Coop", "Food")],
        ));
        BatchProcessor::new(
            Arc::new(CategorizationEngine::new(store)),
            Arc::new(CsvStatementParser),
            Arc::new(CsvStatementWriter),
            BatchConfig::new(1, 100),
        )
    }

    #[test]
    fn test_discover_files_skips_hidden_and_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.csv"), HEADER).unwrap();
        fs::write(dir.path().join("a.csv"), HEADER).unwrap();
        fs::write(dir.path().join(".DS_Store"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let files = discover_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_owned()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_discover_files_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_files(dir.path()),
            Err(StatementError::NoInputFiles { .. })
        ));
        assert!(matches!(
            discover_files(&dir.path().join("missing")),
            Err(StatementError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_name("a.csv".to_string(), &mut used), "a.csv");
        assert_eq!(unique_name("a.csv".to_string(), &mut used), "a_2.csv");
        assert_eq!(unique_name("a.csv".to_string(), &mut used), "a_3.csv");
    }

    #[test]
    fn test_run_consolidates_and_skips_empty_groups() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = TempDir::new().unwrap();

        fs::write(
            input.path().join("CAMT.053_111_2025-04-01_2025-04-30_1.csv"),
            format!("{}2025-04-03,,-5.00,CHF,SBB,true,ticket,,\n", HEADER),
        )
        .unwrap();
        fs::write(
            input.path().join("CAMT.053_111_2025-05-01_2025-05-31_1.csv"),
            format!("{}2025-05-02,,-20.00,CHF,Coop,true,food,,\n", HEADER),
        )
        .unwrap();
        fs::write(input.path().join("empty.csv"), HEADER).unwrap();

        let mut processor = processor(config.path());
        let report = processor
            .run(input.path(), output.path(), &CancellationToken::new())
            .unwrap();

        assert_eq!(report.groups_total, 2);
        assert_eq!(report.groups_written, 1);
        assert_eq!(report.transactions_written, 2);
        assert_eq!(processor.phase(), BatchPhase::Done);

        let expected = output.path().join("111_2025-04-01_2025-05-31.csv");
        assert_eq!(report.outputs, vec![expected.clone()]);

        let written = CsvStatementParser.parse(&expected).unwrap();
        assert_eq!(written[0].category, "Transport");
        assert_eq!(written[1].category, "Food");

        let content = fs::read_to_string(&expected).unwrap();
        assert!(content.contains("#   - CAMT.053_111_2025-04-01_2025-04-30_1.csv"));
    }

    #[test]
    fn test_run_fails_on_empty_input() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = TempDir::new().unwrap();

        let result = processor(config.path()).run(input.path(), output.path(), &CancellationToken::new());
        assert!(matches!(
            result,
            Err(BatchError::Fatal(StatementError::NoInputFiles { .. }))
        ));
    }

    #[test]
    fn test_run_fails_when_every_file_is_rejected() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = TempDir::new().unwrap();
        fs::write(input.path().join("a.csv"), "foo,bar\n1,2\n").unwrap();
        fs::write(input.path().join("b.csv"), "foo,bar\n3,4\n").unwrap();

        let mut processor = processor(config.path());
        let result = processor.run(input.path(), output.path(), &CancellationToken::new());
        assert!(matches!(
            result,
            Err(BatchError::Fatal(StatementError::NoReadableFiles { count: 2, .. }))
        ));
        assert_eq!(processor.phase(), BatchPhase::Done);
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_run_cancelled_before_first_group() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = TempDir::new().unwrap();
        fs::write(input.path().join("a.csv"), HEADER).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        match processor(config.path()).run(input.path(), output.path(), &cancel) {
            Err(BatchError::Cancelled(report)) => {
                assert_eq!(report.groups_total, 1);
                assert_eq!(report.groups_written, 0);
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[test]
    fn test_categorize_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out").join("categorized.csv");
        fs::write(
            &input,
            format!(
                "{}2025-05-02,,-20.00,CHF,Coop,true,food,,\n2025-05-01,,-5.00,CHF,Bus,true,sbb ticket,,\n",
                HEADER
            ),
        )
        .unwrap();

        let count = processor(dir.path()).categorize_file(&input, &output).unwrap();
        assert_eq!(count, 2);

        let written = CsvStatementParser.parse(&output).unwrap();
        assert_eq!(written[0].party_name, "Bus");
        assert_eq!(written[0].category, "Transport");
        assert_eq!(written[1].category, "Food");
    }
}
