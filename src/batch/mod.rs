//! Batch account aggregation
//!
//! # Components
//!
//! - `account` - Account identification from filenames and file grouping
//! - `aggregator` - Per-group parse, union, duplicate flagging, and sort
//! - `naming` - Output filenames and source-file manifests
//! - `processor` - The batch run state machine

pub mod account;
pub mod aggregator;
pub mod naming;
pub mod processor;

pub use account::{group_files_by_account, AccountIdentifier, FileGroup, FileIdentity};
pub use aggregator::{
    detect_duplicates, resolve_date_range, sort_transactions, Aggregation, AggregationError,
    BatchAggregator,
};
pub use naming::{generate_output_filename, generate_source_file_header, sanitize};
pub use processor::{discover_files, BatchError, BatchPhase, BatchProcessor, BatchReport};
