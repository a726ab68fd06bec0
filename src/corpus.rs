//! Corpus file loading for `ragline index`

use crate::error::{RaglineError, Result};
use std::path::Path;

/// Read a corpus file
///
/// `*.json` files must hold an array of strings. Anything else is read as
/// plain text with one document per non-empty line; surrounding whitespace
/// is trimmed from each line.
pub fn read_corpus(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| RaglineError::Io {
        source: e,
        context: format!("Failed to read corpus file: {:?}", path),
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).map_err(|e| RaglineError::Json {
            source: e,
            context: format!("Corpus {:?} must be a JSON array of strings", path),
        })
    } else {
        Ok(parse_lines(&content))
    }
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
