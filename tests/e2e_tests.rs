//! End-to-end integration tests
//!
//! These tests drive the complete batch pipeline: discovery, grouping,
//! aggregation, categorization, sorting, and writing. They use:
//! - the fixture in tests/fixtures/two_month_account (input directory,
//!   mapping files, and the expected consolidated output)
//! - statement files generated into temporary directories
//!
//! Each test runs once with the sequential strategy and once with the
//! worker pool (threshold 0 forces the pool for every step).

#[cfg(test)]
mod tests {
    use bank_statement_engine::batch::{BatchError, BatchProcessor, BatchReport};
    use bank_statement_engine::core::{
        AiClient, AiRequest, CategorizationEngine, CategoryStore, RateLimiter, StatementParser,
        StorePaths,
    };
    use bank_statement_engine::io::{CsvStatementParser, CsvStatementWriter};
    use bank_statement_engine::strategy::BatchConfig;
    use bank_statement_engine::types::StatementError;
    use rstest::rstest;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    const HEADER: &str =
        "Date,ValueDate,Amount,Currency,PartyName,IsDebtor,Description,Category,SubCategory\n";

    #[derive(Debug, Clone, Copy)]
    enum Mode {
        Sequential,
        Parallel,
    }

    impl Mode {
        fn config(self) -> BatchConfig {
            match self {
                Mode::Sequential => BatchConfig::new(1, 100),
                Mode::Parallel => BatchConfig::new(4, 0),
            }
        }
    }

    /// AI backend answering every request with the same label
    struct FixedAnswer {
        label: String,
        calls: AtomicUsize,
    }

    impl AiClient for FixedAnswer {
        fn categorize(&self, _request: &AiRequest) -> Result<String, StatementError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.label.clone())
        }
    }

    fn copy_dir(from: &Path, to: &Path) {
        fs::create_dir_all(to).unwrap();
        for entry in fs::read_dir(from).unwrap() {
            let entry = entry.unwrap();
            fs::copy(entry.path(), to.join(entry.file_name())).unwrap();
        }
    }

    fn processor(config_dir: &Path, mode: Mode) -> BatchProcessor {
        let store = CategoryStore::load(StorePaths::in_dir(config_dir))
            .unwrap_or_else(|e| panic!("Failed to load store: {}", e));
        BatchProcessor::new(
            Arc::new(CategorizationEngine::new(Arc::new(store))),
            Arc::new(CsvStatementParser),
            Arc::new(CsvStatementWriter),
            mode.config(),
        )
    }

    fn run(processor: &mut BatchProcessor, input: &Path, output: &Path) -> BatchReport {
        processor
            .run(input, output, &CancellationToken::new())
            .unwrap_or_else(|e| panic!("Batch run failed: {}", e))
    }

    fn normalized(content: &str) -> String {
        content.replace("\r\n", "\n")
    }

    /// Write `rows` (without header) to `dir/name`
    fn statement(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
        let path = dir.join(name);
        let mut content = String::from(HEADER);
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// `count` rows for one month, one distinct party per row
    fn month_rows(month: u32, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                format!(
                    "2025-{:02}-{:02},,-{}.{:02},CHF,Shop {} {},true,purchase {},,",
                    month,
                    (i % 28) + 1,
                    i + 1,
                    i % 100,
                    month,
                    i,
                    i
                )
            })
            .collect()
    }

    #[rstest]
    fn test_fixture_matches_expected_output(
        #[values(Mode::Sequential, Mode::Parallel)] mode: Mode,
    ) {
        let fixture = Path::new("tests/fixtures/two_month_account");
        let work = TempDir::new().unwrap();
        let config_dir = work.path().join("config");
        copy_dir(&fixture.join("config"), &config_dir);
        let output = work.path().join("out");

        let mut processor = processor(&config_dir, mode);
        let report = run(&mut processor, &fixture.join("input"), &output);

        assert_eq!(report.groups_total, 2, "{:?}", report);
        assert_eq!(report.groups_written, 1);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.duplicate_clusters, 1);
        assert_eq!(report.transactions_written, 6);

        let written = output.join("54293249_2025-04-01_2025-05-31.csv");
        assert_eq!(report.outputs, vec![written.clone()]);

        let actual = fs::read_to_string(&written).unwrap();
        let expected = fs::read_to_string(fixture.join("expected.csv")).unwrap();
        assert_eq!(
            normalized(&actual),
            normalized(&expected),
            "\n\nOutput mismatch (mode: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            mode,
            actual,
            expected
        );
    }

    #[rstest]
    fn test_counts_are_preserved_and_output_sorted(
        #[values(Mode::Sequential, Mode::Parallel)] mode: Mode,
    ) {
        let work = TempDir::new().unwrap();
        let input = work.path().join("in");
        fs::create_dir(&input).unwrap();

        let mut expected_total = 0;
        for month in 1..=6u32 {
            let rows = month_rows(month, 40 + month as usize);
            expected_total += rows.len();
            statement(
                &input,
                &format!("CAMT.053_777_2025-{:02}-01_2025-{:02}-28_{}.csv", month, month, month),
                &rows,
            );
        }

        let mut processor = processor(&work.path().join("config"), mode);
        let report = run(&mut processor, &input, &work.path().join("out"));

        assert_eq!(report.groups_written, 1);
        assert_eq!(report.transactions_written, expected_total);

        let output = work.path().join("out").join("777_2025-01-01_2025-06-28.csv");
        let transactions = CsvStatementParser.parse(&output).unwrap();
        assert_eq!(transactions.len(), expected_total);
        assert!(transactions.windows(2).all(|pair| {
            (pair[0].date, pair[0].value_date, pair[0].amount)
                <= (pair[1].date, pair[1].value_date, pair[1].amount)
        }));
    }

    #[rstest]
    fn test_duplicates_are_kept_and_counted_once_per_cluster(
        #[values(Mode::Sequential, Mode::Parallel)] mode: Mode,
    ) {
        let work = TempDir::new().unwrap();
        let input = work.path().join("in");
        fs::create_dir(&input).unwrap();

        let repeated = "2025-03-05,,-9.90,CHF,Kiosk,true,coffee,,".to_string();
        let other = "2025-03-06,,-20.00,EUR,Hotel,true,night,,".to_string();
        statement(
            &input,
            "X_acc_2025-03-01_2025-03-15_1.csv",
            &[repeated.clone(), repeated.clone(), other.clone()],
        );
        statement(
            &input,
            "X_acc_2025-03-16_2025-03-31_2.csv",
            &[repeated.clone(), other],
        );

        let mut processor = processor(&work.path().join("config"), mode);
        let report = run(&mut processor, &input, &work.path().join("out"));

        assert_eq!(report.transactions_written, 5);
        assert_eq!(report.duplicate_clusters, 2);
    }

    #[rstest]
    fn test_output_independent_of_file_distribution(
        #[values(Mode::Sequential, Mode::Parallel)] mode: Mode,
    ) {
        let rows: Vec<String> = month_rows(2, 60);
        let work = TempDir::new().unwrap();

        // Same transactions split differently across files and file names
        let split_a = work.path().join("a");
        fs::create_dir(&split_a).unwrap();
        statement(&split_a, "B_9_2025-02-01_2025-02-14_1.csv", &rows[..30]);
        statement(&split_a, "B_9_2025-02-15_2025-02-28_2.csv", &rows[30..]);

        let split_b = work.path().join("b");
        fs::create_dir(&split_b).unwrap();
        let reversed: Vec<String> = rows.iter().rev().cloned().collect();
        statement(&split_b, "B_9_2025-02-01_2025-02-10_1.csv", &reversed[..10]);
        statement(&split_b, "B_9_2025-02-11_2025-02-20_2.csv", &reversed[10..45]);
        statement(&split_b, "B_9_2025-02-21_2025-02-28_3.csv", &reversed[45..]);

        let out_a = work.path().join("out_a");
        let out_b = work.path().join("out_b");
        run(&mut processor(&work.path().join("config"), mode), &split_a, &out_a);
        run(&mut processor(&work.path().join("config"), mode), &split_b, &out_b);

        let name = "9_2025-02-01_2025-02-28.csv";
        let a = CsvStatementParser.parse(&out_a.join(name)).unwrap();
        let b = CsvStatementParser.parse(&out_b.join(name)).unwrap();
        assert_eq!(a, b);
    }

    #[rstest]
    fn test_ai_answers_are_learned_and_persisted(
        #[values(Mode::Sequential, Mode::Parallel)] mode: Mode,
    ) {
        let work = TempDir::new().unwrap();
        let input = work.path().join("in");
        let config_dir = work.path().join("config");
        fs::create_dir(&input).unwrap();
        fs::create_dir(&config_dir).unwrap();
        fs::write(config_dir.join("debtors.yaml"), "Coop: Food\n").unwrap();
        fs::write(
            config_dir.join("categories.yaml"),
            "categories:\n  - name: Food\n  - name: Leisure\n",
        )
        .unwrap();

        let rows: Vec<String> = (1..=20)
            .map(|day| format!("2025-07-{:02},,-15.00,CHF,Cinema Palace,true,evening,,", day))
            .collect();
        statement(&input, "CAMT.053_42_2025-07-01_2025-07-31_1.csv", &rows);

        let store = Arc::new(CategoryStore::load(StorePaths::in_dir(&config_dir)).unwrap());
        let client = Arc::new(FixedAnswer {
            label: "leisure".to_string(),
            calls: AtomicUsize::new(0),
        });
        let engine = Arc::new(CategorizationEngine::with_ai(
            Arc::clone(&store),
            Arc::clone(&client) as Arc<dyn AiClient>,
            Arc::new(RateLimiter::per_minute(100)),
        ));
        let mut processor = BatchProcessor::new(
            engine,
            Arc::new(CsvStatementParser),
            Arc::new(CsvStatementWriter),
            mode.config(),
        );
        run(&mut processor, &input, &work.path().join("out"));

        let output = work.path().join("out").join("42_2025-07-01_2025-07-31.csv");
        let transactions = CsvStatementParser.parse(&output).unwrap();
        assert!(transactions.iter().all(|tx| tx.category == "Leisure"));
        // Concurrent workers may race on the first lookups; later ones hit the learned mapping
        assert!(client.calls.load(Ordering::SeqCst) < rows.len());

        let reloaded = CategoryStore::load(StorePaths::in_dir(&config_dir)).unwrap();
        assert_eq!(reloaded.lookup_debtor("cinema palace"), Some("Leisure".to_string()));
        assert_eq!(reloaded.lookup_debtor("Coop"), Some("Food".to_string()));
    }

    #[test]
    fn test_missing_input_directory_is_fatal() {
        let work = TempDir::new().unwrap();
        let result = processor(&work.path().join("config"), Mode::Sequential).run(
            &work.path().join("does-not-exist"),
            &work.path().join("out"),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(BatchError::Fatal(_))));
    }

    #[rstest]
    fn test_input_with_only_unreadable_files_is_fatal(
        #[values(Mode::Sequential, Mode::Parallel)] mode: Mode,
    ) {
        let work = TempDir::new().unwrap();
        let input = work.path().join("in");
        let output = work.path().join("out");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("CAMT.053_77_2025-01-01_2025-01-31_1.csv"), "foo,bar\n1,2\n").unwrap();
        fs::write(input.join("notes.csv"), "foo,bar\n3,4\n").unwrap();

        let result = processor(&work.path().join("config"), mode).run(
            &input,
            &output,
            &CancellationToken::new(),
        );

        match result {
            Err(BatchError::Fatal(error)) => {
                assert_eq!(
                    error,
                    StatementError::NoReadableFiles {
                        path: input.display().to_string(),
                        count: 2,
                    }
                );
                assert!(error.is_fatal());
            }
            other => panic!("expected fatal error, got {:?}", other),
        }
        assert_eq!(fs::read_dir(&output).unwrap().count(), 0);
    }

    #[test]
    fn test_cancelled_run_reports_partial_progress() {
        let work = TempDir::new().unwrap();
        let input = work.path().join("in");
        fs::create_dir(&input).unwrap();
        statement(&input, "A_1_2025-01-01_2025-01-31_1.csv", &month_rows(1, 5));
        statement(&input, "A_2_2025-01-01_2025-01-31_1.csv", &month_rows(1, 5));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = processor(&work.path().join("config"), Mode::Sequential).run(
            &input,
            &work.path().join("out"),
            &cancel,
        );

        match result {
            Err(BatchError::Cancelled(report)) => {
                assert_eq!(report.groups_total, 2);
                assert!(report.outputs.is_empty());
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
    }
}
