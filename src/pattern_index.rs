//! Aho-Corasick pattern index over the prohibited-word list.
//!
//! The index is built once from a word list and shared behind an `Arc`;
//! a reload builds a fresh index and swaps the `Arc`, it never mutates.
//! Lookups report every overlapping occurrence of every pattern, so a
//! single scan of the message covers standalone and embedded matches.

use aho_corasick::AhoCorasick;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Identifier of a pattern inside a built index.
pub type PatternId = usize;

/// Build-time warning threshold. ~77k patterns build in well under this;
/// exceeding it usually means a pathological word list.
const BUILD_WARN_THRESHOLD: Duration = Duration::from_millis(500);

/// Index construction failure.
#[derive(Debug)]
pub enum BuildError {
    /// No usable patterns remained after sanitization.
    Empty,
    /// The automaton itself failed to build.
    Automaton(aho_corasick::BuildError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Empty => write!(f, "word list contains no usable patterns"),
            BuildError::Automaton(e) => write!(f, "failed to build pattern automaton: {e}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Empty => None,
            BuildError::Automaton(e) => Some(e),
        }
    }
}

/// Sanitization and build statistics, reported once per (re)build.
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub loaded: usize,
    pub removed_empty: usize,
    pub removed_non_latin: usize,
    pub removed_duplicates: usize,
    pub final_count: usize,
    pub build_time: Duration,
    /// Up to ten rejected non-Latin entries, kept for diagnostics.
    pub non_latin_examples: Vec<String>,
}

/// Whether the character is in the Latin repertoire the index accepts:
/// ASCII alphanumerics plus the Latin-1 Supplement and Latin Extended-A/B
/// blocks.
pub(crate) fn is_latin_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c as u32, 0x00C0..=0x00FF | 0x0100..=0x017F | 0x0180..=0x024F)
}

fn is_latin_word(word: &str) -> bool {
    word.chars().all(is_latin_char)
}

/// Case fold that never changes the character count. Multi-character
/// lowercase expansions (e.g. İ) keep the original character so all
/// match offsets stay valid for the unfolded text.
pub fn fold_case(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

pub struct PatternIndex {
    automaton: AhoCorasick,
    patterns: Vec<String>,
    /// Char length per pattern, so callers can derive match starts.
    char_lens: Vec<usize>,
    stats: BuildStats,
}

impl PatternIndex {
    /// Build an index from raw word-list entries.
    ///
    /// Entries are lowercased and deduplicated; empty lines, `#` comments,
    /// and non-Latin entries are counted and dropped. An empty result is a
    /// hard error: a detector that matches nothing must not look healthy.
    pub fn build<I, S>(words: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let start = Instant::now();
        let mut loaded = 0usize;
        let mut removed_empty = 0usize;
        let mut removed_non_latin = 0usize;
        let mut removed_duplicates = 0usize;
        let mut non_latin_examples = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut patterns: Vec<String> = Vec::new();

        for word in words {
            loaded += 1;
            let word = word.as_ref().trim();
            if word.is_empty() || word.starts_with('#') {
                removed_empty += 1;
                continue;
            }
            let word = word.to_lowercase();
            if !is_latin_word(&word) {
                removed_non_latin += 1;
                if non_latin_examples.len() < 10 {
                    non_latin_examples.push(word);
                }
                continue;
            }
            if !seen.insert(word.clone()) {
                removed_duplicates += 1;
                continue;
            }
            patterns.push(word);
        }

        if patterns.is_empty() {
            return Err(BuildError::Empty);
        }

        let automaton = AhoCorasick::new(&patterns).map_err(BuildError::Automaton)?;
        let char_lens = patterns.iter().map(|p| p.chars().count()).collect();

        let stats = BuildStats {
            loaded,
            removed_empty,
            removed_non_latin,
            removed_duplicates,
            final_count: patterns.len(),
            build_time: start.elapsed(),
            non_latin_examples,
        };

        info!(
            loaded = stats.loaded,
            final_count = stats.final_count,
            removed_empty = stats.removed_empty,
            removed_non_latin = stats.removed_non_latin,
            removed_duplicates = stats.removed_duplicates,
            build_ms = stats.build_time.as_millis() as u64,
            "pattern index built"
        );
        if stats.build_time > BUILD_WARN_THRESHOLD {
            warn!(
                build_ms = stats.build_time.as_millis() as u64,
                threshold_ms = BUILD_WARN_THRESHOLD.as_millis() as u64,
                "pattern index build exceeded threshold"
            );
        }

        Ok(PatternIndex {
            automaton,
            patterns,
            char_lens,
            stats,
        })
    }

    /// Find every overlapping occurrence of every pattern in `text`,
    /// case-insensitively.
    ///
    /// Returns `(end_offset, id)` pairs where `end_offset` is the
    /// **inclusive character offset** of the last matched character.
    pub fn search(&self, text: &str) -> Vec<(usize, PatternId)> {
        // Fold preserves char count, so char offsets into the folded text
        // are valid for the original.
        let folded: String = text.chars().map(fold_case).collect();

        // Byte offset of each char in the folded text, for byte->char
        // translation of automaton match positions.
        let char_starts: Vec<usize> = folded.char_indices().map(|(b, _)| b).collect();

        self.automaton
            .find_overlapping_iter(&folded)
            .map(|m| {
                // Index of the last char whose start byte is < m.end().
                let end_char = char_starts.partition_point(|&b| b < m.end()) - 1;
                (end_char, m.pattern().as_usize())
            })
            .collect()
    }

    pub fn pattern(&self, id: PatternId) -> &str {
        &self.patterns[id]
    }

    /// Char length of the pattern, for deriving match starts from the
    /// inclusive end offsets `search` reports.
    pub fn pattern_char_len(&self, id: PatternId) -> usize {
        self.char_lens[id]
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.patterns.iter().any(|p| *p == word)
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }
}
