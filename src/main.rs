//! Bank Statement Engine CLI
//!
//! # Usage
//!
//! ```bash
//! cargo run -- batch --input statements/ --output consolidated/
//! cargo run -- categorize --input statement.csv --output categorized.csv
//! AI_API_KEY=sk-... cargo run -- --workers 8 batch -i statements/ -o consolidated/
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success (including runs where some files or groups were skipped)
//! - 1: Fatal error (missing or empty input, no readable statement file, corrupt mapping files)
//! - 130: Cancelled with Ctrl-C

use bank_statement_engine::batch::BatchError;
use bank_statement_engine::cli::{self, Command};
use bank_statement_engine::logging;
use std::process;
use std::thread;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

const EXIT_FATAL: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

/// Cancel `token` on the first Ctrl-C
fn watch_ctrl_c(token: CancellationToken) {
    let spawned = thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!(error = %e, "Ctrl-C handling unavailable");
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing current file");
                    token.cancel();
                }
            });
        });

    if let Err(e) = spawned {
        warn!(error = %e, "Ctrl-C handling unavailable");
    }
}

fn main() {
    let args = cli::parse_args();
    logging::init_tracing(args.verbose);

    let config = args.to_app_config();
    let mut processor = match cli::build_processor(&config) {
        Ok(processor) => processor,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            process::exit(EXIT_FATAL);
        }
    };

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    match &args.command {
        Command::Batch { input, output } => match processor.run(input, output, &cancel) {
            Ok(report) => {
                let stats = processor.engine().stats();
                println!("{}", report);
                println!(
                    "categorized: {} direct, {} keyword, {} ai, {} uncategorized",
                    stats.direct, stats.keyword, stats.ai, stats.uncategorized
                );
            }
            Err(BatchError::Cancelled(report)) => {
                eprintln!("Cancelled: {}", report);
                process::exit(EXIT_CANCELLED);
            }
            Err(BatchError::Fatal(e)) => {
                eprintln!("Error: {}", e);
                process::exit(EXIT_FATAL);
            }
        },
        Command::Categorize { input, output } => match processor.categorize_file(input, output) {
            Ok(count) => println!("{} transaction(s) written to {}", count, output.display()),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(EXIT_FATAL);
            }
        },
    }
}
