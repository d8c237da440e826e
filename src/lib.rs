//! Bank Statement Engine Library
//! # Overview
//!
//! This library categorizes bank statement transactions and consolidates the
//! statement files of each account into one chronologically ordered output.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Transaction, Category, DateRange, errors)
//! - [`core`] - Categorization:
//!   - [`core::engine`] - Tier chain orchestration and auto-learning
//!   - [`core::category_store`] - Category rules and learned party mappings
//!   - [`core::rate_limiter`] - Call budget for the AI tier
//! - [`batch`] - Account grouping, aggregation, naming, and the batch run
//! - [`strategy`] - Sequential and worker-pool execution
//! - [`io`] - CSV statement parser/writer and the HTTP AI client
//! - [`config`], [`logging`], [`cli`] - Runtime configuration and wiring
//!
//! # Categorization Tiers
//!
//! Each transaction runs through the tiers in a fixed order; the first match wins:
//!
//! - **Direct**: exact (case-insensitive) party mapping, creditor or debtor table
//! - **Keyword**: first loaded category with a keyword in the description or party
//! - **AI**: rate-limited external service; answers are learned as direct mappings
//!
//! A transaction matching no tier is "Uncategorized"; categorization never fails a run.

// Module declarations
pub mod batch;
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use batch::{BatchError, BatchProcessor, BatchReport};
pub use core::{CategorizationEngine, CategoryStore, RateLimiter};
pub use io::{CsvStatementParser, CsvStatementWriter};
pub use types::{CategorizationResult, Category, DateRange, StatementError, Tier, Transaction};
