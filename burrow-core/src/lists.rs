//! Newline-delimited inputs: wordlists, blacklists, whitelists and URL lists.

use crate::error::{EngineError, Result};
use std::fs;
use std::path::Path;

/// Split text into trimmed, non-empty lines.
pub fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        EngineError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Ok(parse_lines(&content))
}

/// Like [`load_lines`] but drops `#` comment lines and refuses an empty list.
pub fn load_wordlist(path: &Path) -> Result<Vec<String>> {
    let words: Vec<String> = load_lines(path)?
        .into_iter()
        .filter(|line| !line.starts_with('#'))
        .collect();

    if words.is_empty() {
        return Err(EngineError::Config(format!(
            "Wordlist {} is empty or contains only comments",
            path.display()
        )));
    }

    Ok(words)
}
