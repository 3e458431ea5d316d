//! Domain list loading and normalization.

use std::path::Path;

use crate::error::AppError;

/// Reads the domain list from a headerless CSV file.
///
/// With `column = None` the domain column is inferred per row: a row of at
/// least two fields whose first field is an integer rank (`1,example.com`,
/// as in Tranco lists) uses the second field, otherwise the first field is
/// used. Entries are normalized with [`normalize_domain`]; entries that
/// normalize to nothing are skipped.
pub fn load_domains(path: &Path, column: Option<usize>) -> Result<Vec<String>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to open domain list {}: {e}",
                path.display()
            ))
        })?;

    let mut domains = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            AppError::ConfigError(format!(
                "Invalid domain list {} at row {}: {e}",
                path.display(),
                line + 1
            ))
        })?;

        let index = column.unwrap_or_else(|| {
            let ranked = record.len() >= 2
                && record
                    .get(0)
                    .is_some_and(|first| first.trim().parse::<u64>().is_ok());
            usize::from(ranked)
        });

        if let Some(domain) = record.get(index).and_then(normalize_domain) {
            domains.push(domain);
        }
    }

    tracing::debug!(path = %path.display(), count = domains.len(), "Loaded domain list");
    Ok(domains)
}

/// Reduces a list entry to a bare, lowercase DNS name.
///
/// Strips whitespace, an `http://` or `https://` prefix, any path, port or
/// query, and the trailing root dot. Returns `None` for empty entries.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    let host = host.trim_end_matches('.');

    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// URL the browser probe loads for a domain.
pub fn probe_url(domain: &str) -> String {
    format!("https://{domain}")
}
