//! Pattern list loading.
//!
//! A pattern file holds one glob per line. Surrounding whitespace is trimmed,
//! blank lines and `#` comments are ignored, and repeated patterns keep only
//! their first occurrence.

use crate::error::{ArchseekError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read a pattern file.
pub fn load_patterns(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| ArchseekError::Config {
        reason: format!("cannot read pattern file {}: {}", path.display(), e),
    })?;
    let patterns = parse_patterns(&content);
    debug!(path = %path.display(), patterns = patterns.len(), "Loaded patterns");
    Ok(patterns)
}

/// Parse pattern file content.
pub fn parse_patterns(content: &str) -> Vec<String> {
    ordered_dedupe(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string),
    )
}

/// Drop repeated items, keeping first occurrences in their original order.
pub fn ordered_dedupe<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
