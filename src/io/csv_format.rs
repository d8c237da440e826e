//! CSV statement format handling
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to transactions
//! - [`CsvStatementParser`] and [`CsvStatementWriter`] collaborators
//!
//! The format is the engine's own output format, so consolidated files can be
//! fed back in:
//!
//! ```text
//! # comment lines (source-file manifests) are ignored
//! Date,ValueDate,Amount,Currency,PartyName,IsDebtor,Description,Category,SubCategory
//! 2025-04-01,2025-04-01,-12.50,CHF,Coop,true,Groceries,Food,
//! ```
//!
//! Only `Date`, `Amount` and `PartyName` are required; the other columns may
//! be absent or empty.
//!
//! # Amounts
//!
//! Apostrophes and spaces are grouping and are dropped. When both `,` and `.`
//! appear, the last one is the decimal mark and the other is grouping
//! (`1.234,50` and `1,234.50` are both 1234.50); a repeated decimal mark makes
//! the row invalid. A single `,` followed by exactly three digits is a
//! thousands separator (`1,234` is 1234); any other single `,` is a decimal
//! comma (`7,25`). A repeated separator of one kind is always grouping. A
//! single `.` is always the decimal mark.

use crate::core::{StatementParser, StatementWriter};
use crate::types::{StatementError, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Output column order
pub const CSV_HEADERS: [&str; 9] = [
    "Date",
    "ValueDate",
    "Amount",
    "Currency",
    "PartyName",
    "IsDebtor",
    "Description",
    "Category",
    "SubCategory",
];

const REQUIRED_COLUMNS: [&str; 3] = ["Date", "Amount", "PartyName"];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

/// CSV record structure for deserialization
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "ValueDate", default)]
    pub value_date: Option<String>,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "Currency", default)]
    pub currency: Option<String>,
    #[serde(rename = "PartyName")]
    pub party_name: String,
    #[serde(rename = "IsDebtor", default)]
    pub is_debtor: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(rename = "SubCategory", default)]
    pub sub_category: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn parse_amount(value: &str) -> Option<Decimal> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\'' | ' ' | '\u{a0}'))
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // Both present: the later one is the decimal mark
        (Some(comma), Some(dot)) => {
            let (decimal, grouping) = if comma > dot { (',', '.') } else { ('.', ',') };
            if cleaned.matches(decimal).count() != 1 {
                return None;
            }
            cleaned.replace(grouping, "").replace(decimal, ".")
        }
        (Some(comma), None) => {
            let single = cleaned.matches(',').count() == 1;
            let fraction = cleaned.len() - comma - 1;
            if single && fraction != 3 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "debit" => Some(true),
        "false" | "0" | "no" | "n" | "credit" => Some(false),
        _ => None,
    }
}

/// Convert a CsvRecord to a Transaction
///
/// This function:
/// - Parses the booking and value dates (value date defaults to the booking date)
/// - Parses the amount into an exact Decimal
/// - Derives the debit flag from the amount sign when `IsDebtor` is absent
pub fn convert_csv_record(record: CsvRecord) -> Result<Transaction, String> {
    let date = parse_date(&record.date)
        .ok_or_else(|| format!("Invalid date '{}'", record.date))?;

    let value_date = match non_empty(record.value_date) {
        Some(raw) => parse_date(&raw).ok_or_else(|| format!("Invalid value date '{}'", raw))?,
        None => date,
    };

    let amount = parse_amount(&record.amount)
        .ok_or_else(|| format!("Invalid amount '{}'", record.amount))?;

    let is_debtor = match non_empty(record.is_debtor) {
        Some(raw) => parse_flag(&raw).ok_or_else(|| format!("Invalid IsDebtor value '{}'", raw))?,
        None => amount.is_sign_negative(),
    };

    Ok(Transaction {
        date,
        value_date,
        amount,
        currency: non_empty(record.currency).unwrap_or_default().to_uppercase(),
        party_name: record.party_name.trim().to_string(),
        is_debtor,
        description: non_empty(record.description).unwrap_or_default(),
        category: non_empty(record.category).unwrap_or_default(),
        sub_category: non_empty(record.sub_category).unwrap_or_default(),
    })
}

fn reader_for(path: &Path) -> Result<csv::Reader<fs::File>, StatementError> {
    if !path.exists() {
        return Err(StatementError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| StatementError::from(e).in_file(path))
}

/// Parser for the CSV statement format
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvStatementParser;

impl StatementParser for CsvStatementParser {
    fn parse(&self, path: &Path) -> Result<Vec<Transaction>, StatementError> {
        let mut reader = reader_for(path)?;
        let mut transactions = Vec::new();

        for result in reader.deserialize::<CsvRecord>() {
            match result {
                Ok(record) => match convert_csv_record(record) {
                    Ok(tx) => transactions.push(tx),
                    Err(e) => warn!(path = %path.display(), "skipping row: {}", e),
                },
                Err(e) => {
                    let error = StatementError::from(e).in_file(path);
                    warn!("skipping row: {}", error);
                }
            }
        }

        debug!(path = %path.display(), count = transactions.len(), "parsed statement");
        Ok(transactions)
    }

    fn validate_format(&self, path: &Path) -> Result<bool, StatementError> {
        let mut reader = reader_for(path)?;
        let headers = reader
            .headers()
            .map_err(|e| StatementError::from(e).in_file(path))?;

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|required| !headers.iter().any(|h| h == *required))
            .collect();

        if missing.is_empty() {
            Ok(true)
        } else {
            debug!(path = %path.display(), ?missing, "required columns missing");
            Ok(false)
        }
    }
}

fn format_amount(amount: Decimal) -> String {
    if amount.scale() < 2 {
        format!("{:.2}", amount)
    } else {
        amount.to_string()
    }
}

/// Write transactions as CSV
///
/// `header_comment` is written verbatim before the CSV header; every line of
/// it should start with `#` so the file parses again.
pub fn write_transactions_csv(
    transactions: &[Transaction],
    header_comment: &str,
    output: &mut dyn Write,
) -> Result<(), StatementError> {
    if !header_comment.is_empty() {
        output.write_all(header_comment.as_bytes())?;
        if !header_comment.ends_with('\n') {
            output.write_all(b"\n")?;
        }
    }

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(CSV_HEADERS)?;

    for tx in transactions {
        writer.write_record([
            tx.date.format("%Y-%m-%d").to_string(),
            tx.value_date.format("%Y-%m-%d").to_string(),
            format_amount(tx.amount),
            tx.currency.clone(),
            tx.party_name.clone(),
            tx.is_debtor.to_string(),
            tx.description.clone(),
            tx.category.clone(),
            tx.sub_category.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// File writer for the CSV statement format
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvStatementWriter;

impl StatementWriter for CsvStatementWriter {
    fn write(
        &self,
        transactions: &[Transaction],
        output: &Path,
        header_comment: &str,
    ) -> Result<(), StatementError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(output)?;
        write_transactions_csv(transactions, header_comment, &mut file)?;
        debug!(path = %output.display(), count = transactions.len(), "wrote statement");
        Ok(())
    }
}
