//! Output naming and source manifests

use crate::types::DateRange;

const UNSAFE_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replace filesystem-unsafe characters with `_`
///
/// Whitespace and control characters are replaced as well; leading and
/// trailing dots are removed so the result is never hidden or a relative path
/// component. An input with nothing usable left becomes `"unknown"`.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| {
            if UNSAFE_CHARS.contains(&c) || c.is_whitespace() || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        String::from("unknown")
    } else {
        trimmed.to_string()
    }
}

/// Consolidated output filename: `{account}_{start}_{end}.csv`
pub fn generate_output_filename(account_id: &str, range: &DateRange) -> String {
    format!(
        "{}_{}_{}.csv",
        sanitize(account_id),
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d")
    )
}

/// Comment block listing every source file merged into an output
///
/// Every line starts with `#`, so the block can be prepended to a CSV file
/// without breaking re-parsing.
pub fn generate_source_file_header<S: AsRef<str>>(names: &[S]) -> String {
    let mut header = format!("# Consolidated from {} source file(s):\n", names.len());
    for name in names {
        header.push_str("#   - ");
        header.push_str(name.as_ref());
        header.push('\n');
    }
    header
}
