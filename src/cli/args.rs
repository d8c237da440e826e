use crate::config::{
    AiConfig, AppConfig, StoreConfig, DEFAULT_AI_BASE_URL, DEFAULT_AI_MODEL, DEFAULT_AI_TIMEOUT_SECS,
    DEFAULT_CONFIG_DIR, DEFAULT_REQUESTS_PER_MINUTE,
};
use crate::strategy::BatchConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Categorize and consolidate bank statement files
#[derive(Parser, Debug)]
#[command(name = "bank-statement-engine")]
#[command(about = "Categorize and consolidate bank statement files", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding categories.yaml, creditors.yaml and debtors.yaml
    #[arg(
        long = "config-dir",
        value_name = "DIR",
        env = "STATEMENT_ENGINE_CONFIG_DIR",
        default_value = DEFAULT_CONFIG_DIR,
        global = true
    )]
    pub config_dir: PathBuf,

    /// Number of worker threads
    #[arg(
        long = "workers",
        value_name = "COUNT",
        global = true,
        help = "Worker threads for parallel processing (default: CPU cores)"
    )]
    pub workers: Option<usize>,

    /// Item count at which the worker pool is used
    #[arg(
        long = "parallel-threshold",
        value_name = "COUNT",
        global = true,
        help = "Files or transactions needed before processing in parallel (default: 100)"
    )]
    pub parallel_threshold: Option<usize>,

    /// AI calls allowed per minute
    #[arg(
        long = "ai-requests-per-minute",
        value_name = "COUNT",
        env = "AI_REQUESTS_PER_MINUTE",
        default_value_t = DEFAULT_REQUESTS_PER_MINUTE,
        global = true
    )]
    pub ai_requests_per_minute: u32,

    /// AI request timeout in seconds
    #[arg(
        long = "ai-timeout",
        value_name = "SECONDS",
        env = "AI_TIMEOUT_SECONDS",
        default_value_t = DEFAULT_AI_TIMEOUT_SECS,
        global = true
    )]
    pub ai_timeout_seconds: u64,

    /// API key for the AI service; the AI tier is off without one
    #[arg(long = "ai-api-key", env = "AI_API_KEY", hide_env_values = true, global = true)]
    pub ai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible AI service
    #[arg(long = "ai-base-url", env = "AI_BASE_URL", default_value = DEFAULT_AI_BASE_URL, global = true)]
    pub ai_base_url: String,

    /// Model name sent to the AI service
    #[arg(long = "ai-model", env = "AI_MODEL", default_value = DEFAULT_AI_MODEL, global = true)]
    pub ai_model: String,

    /// Disable the AI tier even when a key is configured
    #[arg(long = "no-ai", global = true)]
    pub no_ai: bool,

    /// Back up and overwrite the mapping files instead of merging on save
    #[arg(long = "overwrite-mappings", global = true)]
    pub overwrite_mappings: bool,

    /// Debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Consolidate every statement in a directory, one output per account
    Batch {
        #[arg(short = 'i', long = "input", value_name = "DIR")]
        input: PathBuf,
        #[arg(short = 'o', long = "output", value_name = "DIR")]
        output: PathBuf,
    },
    /// Categorize and sort a single statement file
    Categorize {
        #[arg(short = 'i', long = "input", value_name = "FILE")]
        input: PathBuf,
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: PathBuf,
    },
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Values not given on the command line use the defaults; zero worker
    /// counts fall back to the default with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.workers.is_some() || self.parallel_threshold.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.workers.unwrap_or(default.workers),
                self.parallel_threshold.unwrap_or(default.parallel_threshold),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Assemble the complete runtime configuration
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            store: StoreConfig {
                config_dir: self.config_dir.clone(),
                overwrite_with_backup: self.overwrite_mappings,
            },
            ai: AiConfig::new(
                self.ai_api_key.clone(),
                self.no_ai,
                self.ai_requests_per_minute,
                self.ai_timeout_seconds,
            )
            .with_endpoint(self.ai_base_url.clone(), self.ai_model.clone()),
            batch: self.to_batch_config(),
        }
    }
}
