//! Word-list file loading and the whitelist store.
//!
//! Both the filter list and the whitelist use the same plain-text format:
//! one entry per line, `#` starts a comment, blank lines are skipped.
//! Entries are lowercased on load.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Load a word-list file into lowercase entries, preserving file order.
pub fn load_word_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read word list: {}", path.display()))?;

    let words: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect();

    info!(path = %path.display(), entries = words.len(), "loaded word list");
    Ok(words)
}

/// Immutable set of terms that are safe when a pattern appears embedded
/// inside them ("ass" inside "assassin").
///
/// Rebuilds produce a fresh store swapped in behind an `Arc`; the set is
/// never mutated in place.
#[derive(Debug, Default)]
pub struct WhitelistStore {
    words: HashSet<String>,
}

impl WhitelistStore {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        WhitelistStore { words }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_words(load_word_file(path)?))
    }

    /// Membership test; `word` is matched case-insensitively.
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
