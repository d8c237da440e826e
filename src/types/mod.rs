//! Types module
//!
//! Contains core data structures used throughout the application:
//! - `transaction`: normalized transactions, duplicate keys, date ranges
//! - `category`: categories, tiers, and categorization results
//! - `error`: error types for the statement engine

pub mod category;
pub mod error;
pub mod transaction;

pub use category::{CategorizationResult, Category, Tier, UNCATEGORIZED};
pub use error::StatementError;
pub use transaction::{DateRange, DuplicateKey, Transaction};
