// CLI module
// Command-line interface, argument parsing, and wiring of the runtime pieces

mod args;

pub use args::{CliArgs, Command};

use crate::batch::BatchProcessor;
use crate::config::AppConfig;
use crate::core::{AiClient, CategorizationEngine, CategoryStore, RateLimiter};
use crate::io::{CsvStatementParser, CsvStatementWriter, HttpAiClient};
use crate::types::StatementError;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

/// Parse command-line arguments using clap
///
/// On invalid arguments or `--help`, clap prints the message and exits.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Load the category store and build the engine for `config`
///
/// # Errors
///
/// Returns an error if a mapping file is malformed or the AI client cannot
/// be created.
pub fn build_engine(config: &AppConfig) -> Result<CategorizationEngine, StatementError> {
    let store = Arc::new(CategoryStore::load(config.store.paths())?);

    if !config.ai.enabled {
        info!("AI tier disabled");
        return Ok(CategorizationEngine::new(store));
    }

    let client: Arc<dyn AiClient> = Arc::new(HttpAiClient::new(&config.ai)?);
    let limiter = Arc::new(RateLimiter::per_minute(config.ai.requests_per_minute));
    info!(
        model = %config.ai.model,
        requests_per_minute = config.ai.requests_per_minute,
        "AI tier enabled"
    );
    Ok(CategorizationEngine::with_ai(store, client, limiter))
}

/// Build a processor with the CSV collaborators
pub fn build_processor(config: &AppConfig) -> Result<BatchProcessor, StatementError> {
    let engine = Arc::new(build_engine(config)?);
    Ok(BatchProcessor::new(
        engine,
        Arc::new(CsvStatementParser),
        Arc::new(CsvStatementWriter),
        config.batch.clone(),
    )
    .with_overwrite_on_flush(config.store.overwrite_with_backup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_engine_loads_store() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("categories.yaml"),
            "categories:\n  - name: Food\n    keywords: [coop]\n",
        )
        .unwrap();

        let config = AppConfig {
            store: StoreConfig {
                config_dir: dir.path().to_path_buf(),
                overwrite_with_backup: false,
            },
            ..AppConfig::default()
        };
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.store().category_names(), vec!["Food".to_string()]);
    }

    #[test]
    fn test_build_engine_rejects_corrupt_mapping() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("creditors.yaml"), "- just\n- a list\n").unwrap();

        let config = AppConfig {
            store: StoreConfig {
                config_dir: dir.path().to_path_buf(),
                overwrite_with_backup: false,
            },
            ..AppConfig::default()
        };
        assert!(build_engine(&config).is_err());
    }
}
