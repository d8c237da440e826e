//! I/O module
//!
//! Concrete collaborators for the core traits.
//!
//! # Components
//!
//! - `csv_format` - CSV statement parser and writer
//! - `ai_client` - HTTP client for the AI categorization tier

pub mod ai_client;
pub mod csv_format;

pub use ai_client::HttpAiClient;
pub use csv_format::{
    convert_csv_record, write_transactions_csv, CsvRecord, CsvStatementParser, CsvStatementWriter,
    CSV_HEADERS,
};
