//! Core traits for categorization tiers and external collaborators
//!
//! The engine and the batch pipeline only ever talk to these abstractions, so
//! parsers, writers, and the AI backend can be swapped (or mocked in tests)
//! without touching the orchestration code.

use crate::types::{Category, StatementError, Tier, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;

/// One stage of the categorization decision chain
///
/// Returning `None` means "not matched" and lets the engine try the next
/// tier; it is never an error.
pub trait CategorizationStrategy: Send + Sync {
    /// Tier reported in the categorization result
    fn tier(&self) -> Tier;

    /// Try to categorize a transaction
    fn try_match(&self, tx: &Transaction) -> Option<Category>;
}

/// Per-format statement parser
pub trait StatementParser: Send + Sync {
    /// Parse a statement file into normalized transactions
    fn parse(&self, path: &Path) -> Result<Vec<Transaction>, StatementError>;

    /// Check whether a file looks like this parser's format
    ///
    /// `Ok(false)` means "readable but not this format"; `Err` means the file
    /// could not be inspected at all.
    fn validate_format(&self, path: &Path) -> Result<bool, StatementError>;

    /// Validate, then parse
    ///
    /// A file that is readable but not in this format becomes a `Validation` error.
    fn load(&self, path: &Path) -> Result<Vec<Transaction>, StatementError> {
        if !self.validate_format(path)? {
            return Err(StatementError::validation(
                path.display().to_string(),
                "unrecognized statement format",
            ));
        }
        self.parse(path)
    }
}

/// Output writer for categorized transactions
pub trait StatementWriter: Send + Sync {
    /// Write transactions to `output`, prepending `header_comment` verbatim
    fn write(
        &self,
        transactions: &[Transaction],
        output: &Path,
        header_comment: &str,
    ) -> Result<(), StatementError>;
}

/// Request sent to the external categorization service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiRequest {
    pub party_name: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    /// Category names the answer must be drawn from (may be empty)
    #[serde(skip)]
    pub allowed_categories: Vec<String>,
}

impl AiRequest {
    pub fn from_transaction(tx: &Transaction, allowed_categories: Vec<String>) -> Self {
        Self {
            party_name: tx.party_name.clone(),
            description: tx.description.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            allowed_categories,
        }
    }
}

/// External AI categorization backend
///
/// Implementations return the raw category label; validation against the
/// loaded rule set happens in the AI tier.
pub trait AiClient: Send + Sync {
    fn categorize(&self, request: &AiRequest) -> Result<String, StatementError>;
}
