//! Account identification from statement filenames
//!
//! Bank exports follow `{PREFIX}_{ACCOUNT}_{START}_{END}_{SEQ}.{ext}`, e.g.
//! `CAMT.053_54293249_2025-04-01_2025-04-30_1.csv`. Files sharing an ACCOUNT
//! are consolidated together; anything else is its own group keyed by the
//! sanitized base filename.

use crate::batch::naming::sanitize;
use crate::types::DateRange;
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static FILENAME_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^([^_]+)_([^_]+)_(\d{4}-\d{2}-\d{2})_(\d{4}-\d{2}-\d{2})_(\d+)\.(\w+)$").ok()
});

/// Parts of a filename that follows the bank naming pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFilename {
    pub prefix: String,
    pub account_id: String,
    pub range: DateRange,
    pub sequence: u32,
    pub extension: String,
}

/// Account identity derived from one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub account_id: String,
    /// Period embedded in the filename, if any
    pub range: Option<DateRange>,
    /// Whether the filename matched the bank pattern
    pub matched: bool,
}

/// Files determined to belong to one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub account_id: String,
    /// Ordered by filename start date, then filename
    pub files: Vec<PathBuf>,
    /// Merged filename period; `None` when no file carried one
    pub date_range: Option<DateRange>,
}

/// Stateless account identifier
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountIdentifier;

impl AccountIdentifier {
    /// Parse a bare filename against the bank pattern
    pub fn parse_filename(name: &str) -> Option<StatementFilename> {
        let pattern = FILENAME_PATTERN.as_ref()?;
        let caps = pattern.captures(name)?;

        let start = NaiveDate::parse_from_str(&caps[3], "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(&caps[4], "%Y-%m-%d").ok()?;

        Some(StatementFilename {
            prefix: caps[1].to_string(),
            account_id: caps[2].to_string(),
            range: DateRange::new(start, end),
            sequence: caps[5].parse().ok()?,
            extension: caps[6].to_string(),
        })
    }

    /// Derive the account identity of a path
    pub fn identify(path: &Path) -> FileIdentity {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match Self::parse_filename(&name) {
            Some(parsed) => FileIdentity {
                account_id: parsed.account_id,
                range: Some(parsed.range),
                matched: true,
            },
            None => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or(name);
                debug!(file = %path.display(), "filename does not follow the bank pattern");
                FileIdentity {
                    account_id: sanitize(&stem),
                    range: None,
                    matched: false,
                }
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Group files by account
///
/// Matching files sharing an account form one group whose date range is the
/// merge of every file's range. Non-matching files become single-file
/// groups. Groups come back ordered by account id, so the result does not
/// depend on the order of `files`.
pub fn group_files_by_account(files: &[PathBuf]) -> Vec<FileGroup> {
    let mut matched: BTreeMap<String, Vec<(Option<DateRange>, PathBuf)>> = BTreeMap::new();
    let mut singles: Vec<FileGroup> = Vec::new();

    for path in files {
        let identity = AccountIdentifier::identify(path);
        if identity.matched {
            matched
                .entry(identity.account_id)
                .or_default()
                .push((identity.range, path.clone()));
        } else {
            singles.push(FileGroup {
                account_id: identity.account_id,
                files: vec![path.clone()],
                date_range: None,
            });
        }
    }

    let mut groups: Vec<FileGroup> = matched
        .into_iter()
        .map(|(account_id, mut entries)| {
            entries.sort_by(|(a_range, a_path), (b_range, b_path)| {
                a_range
                    .map(|r| r.start)
                    .cmp(&b_range.map(|r| r.start))
                    .then_with(|| file_name(a_path).cmp(&file_name(b_path)))
            });

            let date_range = entries
                .iter()
                .filter_map(|(range, _)| *range)
                .fold(None, |acc, range| Some(DateRange::merge_opt(acc, range)));

            FileGroup {
                account_id,
                files: entries.into_iter().map(|(_, path)| path).collect(),
                date_range,
            }
        })
        .collect();

    groups.extend(singles);
    groups.sort_by(|a, b| {
        a.account_id
            .cmp(&b.account_id)
            .then_with(|| a.files.cmp(&b.files))
    });
    groups
}
