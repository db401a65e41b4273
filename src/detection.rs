//! Multi-tier prohibited-word detection.
//!
//! A message moves through a fixed sequence per call: collapse spaced-out
//! letter runs, scan the collapsed text with the pattern index, classify
//! each hit as standalone / embedding / stripped-window, then apply the
//! whitelist exemption. Everything is deterministic and allocation-local;
//! the engine itself is immutable and cheap to clone.

use crate::config::DetectionConfig;
use crate::pattern_index::{fold_case, is_latin_char, PatternIndex};
use crate::transforms::fancy::{self, FancyStyle, NUMERAL_SEPARATOR};
use crate::wordlist::WhitelistStore;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One flagged occurrence, tagged by how it was found.
///
/// All offsets are character offsets into the **collapsed** text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionMatch {
    /// The containing token is exactly the prohibited word.
    Standalone { filtered_word: String, position: usize },
    /// The word appears inside a longer token.
    Embedding {
        filtered_word: String,
        full_word: String,
        token_start: usize,
        /// Inclusive offset of the last matched character.
        match_char_end: usize,
    },
    /// The word only appears when a window of adjacent tokens is joined
    /// and filter-stripped, i.e. it crosses a token junction.
    StrippedWindow {
        filtered_word: String,
        /// Char span from the first token's start to the last token's end.
        window_range: (usize, usize),
    },
}

impl DetectionMatch {
    pub fn filtered_word(&self) -> &str {
        match self {
            DetectionMatch::Standalone { filtered_word, .. }
            | DetectionMatch::Embedding { filtered_word, .. }
            | DetectionMatch::StrippedWindow { filtered_word, .. } => filtered_word,
        }
    }

    /// Char span of the text region an edit must break to clear this match.
    pub fn target_span(&self) -> (usize, usize) {
        match self {
            DetectionMatch::Standalone {
                filtered_word,
                position,
            } => (*position, position + filtered_word.chars().count()),
            DetectionMatch::Embedding {
                filtered_word,
                match_char_end,
                ..
            } => (
                match_char_end + 1 - filtered_word.chars().count(),
                match_char_end + 1,
            ),
            DetectionMatch::StrippedWindow { window_range, .. } => *window_range,
        }
    }
}

impl fmt::Display for DetectionMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = self.target_span();
        match self {
            DetectionMatch::Standalone { filtered_word, .. } => {
                write!(f, "{filtered_word} [standalone] at {start}..{end}")
            }
            DetectionMatch::Embedding {
                filtered_word,
                full_word,
                ..
            } => {
                write!(f, "{filtered_word} [embedded in \"{full_word}\"] at {start}..{end}")
            }
            DetectionMatch::StrippedWindow { filtered_word, .. } => {
                write!(f, "{filtered_word} [split across tokens] at {start}..{end}")
            }
        }
    }
}

/// Record of one collapsed spaced-out letter run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollapseEntry {
    /// Char span in the raw text.
    pub original_span: (usize, usize),
    /// Char span in the collapsed text.
    pub collapsed_span: (usize, usize),
    pub collapsed_token: String,
    /// True when the run looked like deliberate spacing evasion; matches
    /// covered by such a span never get the whitelist exemption.
    pub evasion_sourced: bool,
}

/// Result of one detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionOutcome {
    pub clean: bool,
    /// Flagged occurrences, ordered left to right.
    pub flagged: Vec<DetectionMatch>,
    pub collapsed_text: String,
    pub collapse_mapping: Vec<CollapseEntry>,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) text: String,
}

/// Python-style word character, used for collapse boundaries.
fn is_boundary_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_latin_letter(c: char) -> bool {
    c.is_alphabetic() && is_latin_char(c)
}

#[derive(Clone)]
pub struct DetectionEngine {
    index: Arc<PatternIndex>,
    whitelist: Arc<WhitelistStore>,
    window_width: usize,
    fancy_style: FancyStyle,
    special_char: char,
}

impl DetectionEngine {
    pub fn new(
        index: Arc<PatternIndex>,
        whitelist: Arc<WhitelistStore>,
        config: DetectionConfig,
    ) -> Self {
        DetectionEngine {
            index,
            whitelist,
            window_width: config.window_width(),
            fancy_style: config.fancy_text_style,
            special_char: config.effective_special_char(),
        }
    }

    pub fn index(&self) -> &PatternIndex {
        &self.index
    }

    pub fn fancy_style(&self) -> FancyStyle {
        self.fancy_style
    }

    pub fn special_char(&self) -> char {
        self.special_char
    }

    /// Full detection pass: collapse, then scan the collapsed text.
    pub fn detect(&self, text: &str) -> DetectionOutcome {
        let (collapsed, mapping) = self.collapse(text);
        self.detect_collapsed(&collapsed, &mapping)
    }

    /// Collapse spaced-out single-letter runs ("f u c k" -> "fuck").
    ///
    /// A run is three or more isolated Latin letters separated by
    /// non-word characters (or underscores), starting and ending on a
    /// word boundary. Each collapse is recorded with both spans and
    /// marked evasion-sourced.
    pub fn collapse(&self, text: &str) -> (String, Vec<CollapseEntry>) {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut out_len = 0usize;
        let mut mapping = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let at_boundary = i == 0 || !is_boundary_word_char(chars[i - 1]);
            if at_boundary && is_latin_letter(chars[i]) {
                let mut letters = vec![i];
                let mut j = i + 1;
                loop {
                    let sep_start = j;
                    while j < chars.len() && !is_boundary_word_char(chars[j]) {
                        j += 1;
                    }
                    if j == sep_start {
                        break;
                    }
                    if j < chars.len() && is_latin_letter(chars[j]) {
                        letters.push(j);
                        j += 1;
                    } else {
                        break;
                    }
                }
                // The run must end on a boundary; a trailing "c" in
                // "f u ck" is not an isolated letter.
                if let Some(&last) = letters.last() {
                    if last + 1 < chars.len() && is_boundary_word_char(chars[last + 1]) {
                        letters.pop();
                    }
                }
                if letters.len() >= 3 {
                    let last = *letters.last().unwrap();
                    let token: String = letters.iter().map(|&k| chars[k]).collect();
                    let token_len = letters.len();
                    debug!(token = %token, span = ?(i, last + 1), "collapsed letter run");
                    mapping.push(CollapseEntry {
                        original_span: (i, last + 1),
                        collapsed_span: (out_len, out_len + token_len),
                        collapsed_token: token.clone(),
                        evasion_sourced: true,
                    });
                    out.push_str(&token);
                    out_len += token_len;
                    i = last + 1;
                    continue;
                }
            }
            out.push(chars[i]);
            out_len += 1;
            i += 1;
        }

        (out, mapping)
    }

    /// Detection over already-collapsed text. The optimizer calls this
    /// directly so candidate edits are judged against the same mapping.
    pub fn detect_collapsed(&self, collapsed: &str, mapping: &[CollapseEntry]) -> DetectionOutcome {
        let tokens = self.tokenize(collapsed);
        let mut flagged = Vec::new();

        // Tier 1 and 2: direct scan of the collapsed text. Patterns are
        // pure Latin, so every hit lies inside a single token.
        for (end, id) in self.index.search(collapsed) {
            let word = self.index.pattern(id);
            let start = end + 1 - self.index.pattern_char_len(id);
            let Some(token) = tokens.iter().find(|t| t.start <= start && end < t.end) else {
                continue;
            };
            let folded: String = token.text.chars().map(fold_case).collect();
            if folded == word {
                flagged.push(DetectionMatch::Standalone {
                    filtered_word: word.to_string(),
                    position: token.start,
                });
            } else if self.is_exempt(&folded, word, mapping, (start, end + 1)) {
                debug!(word, full_word = %token.text, "embedding exempted by whitelist");
            } else {
                flagged.push(DetectionMatch::Embedding {
                    filtered_word: word.to_string(),
                    full_word: token.text.clone(),
                    token_start: token.start,
                    match_char_end: end,
                });
            }
        }

        // Tier 3: windows of adjacent tokens joined with fancy glyphs
        // stripped, the way the downstream filter would see them. Widths
        // run small to large so the largest window wins per pattern.
        let mut window_hits: HashMap<usize, (String, (usize, usize))> = HashMap::new();
        for width in 2..=self.window_width {
            for window in tokens.windows(width) {
                let mut combined = String::new();
                let mut sources: Vec<(usize, usize)> = Vec::new();
                for (ti, token) in window.iter().enumerate() {
                    for (ci, c) in token.text.chars().enumerate() {
                        if fancy::is_fancy(c) {
                            continue;
                        }
                        combined.push(fold_case(c));
                        sources.push((ti, token.start + ci));
                    }
                }
                for (end, id) in self.index.search(&combined) {
                    let len = self.index.pattern_char_len(id);
                    let start = end + 1 - len;
                    let (first_tok, first_off) = sources[start];
                    let (last_tok, last_off) = sources[end];
                    // Contiguous within one token means the direct scan
                    // already saw it.
                    if first_tok == last_tok && last_off - first_off + 1 == len {
                        continue;
                    }
                    let range = (window[0].start, window[width - 1].end);
                    window_hits.insert(id, (combined.clone(), range));
                }
            }
        }
        for (id, (combined, range)) in window_hits {
            let word = self.index.pattern(id);
            if self.is_exempt(&combined, word, mapping, range) {
                debug!(word, combined = %combined, "window match exempted by whitelist");
                continue;
            }
            flagged.push(DetectionMatch::StrippedWindow {
                filtered_word: word.to_string(),
                window_range: range,
            });
        }

        flagged.sort_by(|a, b| {
            (a.target_span().0, a.filtered_word()).cmp(&(b.target_span().0, b.filtered_word()))
        });

        DetectionOutcome {
            clean: flagged.is_empty(),
            flagged,
            collapsed_text: collapsed.to_string(),
            collapse_mapping: mapping.to_vec(),
        }
    }

    /// Whitelist exemption for embedded and window matches. Never applies
    /// when the containing text IS the word, or when an evasion-sourced
    /// collapse span covers the match.
    fn is_exempt(
        &self,
        containing: &str,
        word: &str,
        mapping: &[CollapseEntry],
        span: (usize, usize),
    ) -> bool {
        containing != word
            && self.whitelist.contains(containing)
            && !mapping.iter().any(|e| {
                e.evasion_sourced && e.collapsed_span.0 < span.1 && span.0 < e.collapsed_span.1
            })
    }

    /// Split into maximal runs of word characters. Fancy glyphs of the
    /// configured style, the configured special char, and the numeral
    /// separator count as word characters so decorated tokens hold
    /// together.
    pub(crate) fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut start = 0usize;

        for (i, c) in text.chars().enumerate() {
            if self.is_word_char(c) {
                if current.is_empty() {
                    start = i;
                }
                current.push(c);
            } else if !current.is_empty() {
                tokens.push(Token {
                    start,
                    end: i,
                    text: std::mem::take(&mut current),
                });
            }
        }
        if !current.is_empty() {
            let end = start + current.chars().count();
            tokens.push(Token {
                start,
                end,
                text: current,
            });
        }
        tokens
    }

    fn is_word_char(&self, c: char) -> bool {
        is_latin_char(c)
            || c == NUMERAL_SEPARATOR
            || c == self.special_char
            || fancy::in_style(c, self.fancy_style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;

    fn engine(patterns: &[&str], whitelist: &[&str]) -> DetectionEngine {
        DetectionEngine::new(
            Arc::new(PatternIndex::build(patterns.iter().copied()).unwrap()),
            Arc::new(WhitelistStore::from_words(whitelist.iter().copied())),
            DetectionConfig::default(),
        )
    }

    #[test]
    fn test_clean_message() {
        let outcome = engine(&["fuck"], &[]).detect("hello there friend");
        assert!(outcome.clean);
        assert!(outcome.flagged.is_empty());
        assert_eq!(outcome.collapsed_text, "hello there friend");
    }

    #[test]
    fn test_standalone_overrides_whitelist() {
        let outcome = engine(&["ass"], &["ass", "assassin"]).detect("my ass");
        assert_eq!(
            outcome.flagged,
            vec![DetectionMatch::Standalone {
                filtered_word: "ass".into(),
                position: 3,
            }]
        );
    }

    #[test]
    fn test_embedding_whitelisted() {
        let outcome = engine(&["ass"], &["assassin"]).detect("assassin is fun");
        assert!(outcome.clean);
    }

    #[test]
    fn test_embedding_not_whitelisted() {
        let outcome = engine(&["ass"], &[]).detect("grassy field");
        assert_eq!(outcome.flagged.len(), 1);
        match &outcome.flagged[0] {
            DetectionMatch::Embedding {
                filtered_word,
                full_word,
                token_start,
                match_char_end,
            } => {
                assert_eq!(filtered_word, "ass");
                assert_eq!(full_word, "grassy");
                assert_eq!(*token_start, 0);
                assert_eq!(*match_char_end, 4);
            }
            other => panic!("expected embedding, got {other:?}"),
        }
    }

    #[test]
    fn test_collapse_basic() {
        let eng = engine(&["fuck"], &[]);
        let (collapsed, mapping) = eng.collapse("f u c k you");
        assert_eq!(collapsed, "fuck you");
        assert_eq!(
            mapping,
            vec![CollapseEntry {
                original_span: (0, 7),
                collapsed_span: (0, 4),
                collapsed_token: "fuck".into(),
                evasion_sourced: true,
            }]
        );
    }

    #[test]
    fn test_collapse_needs_three_letters() {
        let eng = engine(&["fuck"], &[]);
        assert_eq!(eng.collapse("i s fine").0, "i s fine");
        assert_eq!(eng.collapse("f u ck").0, "f u ck");
    }

    #[test]
    fn test_collapse_not_inside_words() {
        let eng = engine(&["fuck"], &[]);
        // "o u t" is a run, but "go u t" must not collapse across the
        // word "go".
        assert_eq!(eng.collapse("go u t now").0, "go u t now");
    }

    #[test]
    fn test_collapsed_run_is_flagged_standalone() {
        let outcome = engine(&["fuck"], &[]).detect("f.u.c.k you");
        assert_eq!(outcome.collapsed_text, "fuck you");
        assert_eq!(
            outcome.flagged,
            vec![DetectionMatch::Standalone {
                filtered_word: "fuck".into(),
                position: 0,
            }]
        );
    }

    #[test]
    fn test_collapse_suppresses_whitelist() {
        // Spelled-out "a s s a s s i n" collapses to "assassin"; the
        // whitelist must not exempt an evasion-sourced span.
        let outcome = engine(&["ass"], &["assassin"]).detect("a s s a s s i n");
        assert!(!outcome.clean);
        assert!(matches!(
            outcome.flagged[0],
            DetectionMatch::Embedding { .. }
        ));
    }

    #[test]
    fn test_sliding_window_cross_token() {
        let outcome = engine(&["info"], &[]).detect("in fo discord");
        assert_eq!(
            outcome.flagged,
            vec![DetectionMatch::StrippedWindow {
                filtered_word: "info".into(),
                window_range: (0, 13),
            }]
        );
    }

    #[test]
    fn test_two_token_split() {
        let outcome = engine(&["fuck"], &[]).detect("fu ck");
        assert_eq!(
            outcome.flagged,
            vec![DetectionMatch::StrippedWindow {
                filtered_word: "fuck".into(),
                window_range: (0, 5),
            }]
        );
    }

    #[test]
    fn test_window_skips_contiguous_duplicates() {
        // "info" inside "information" is the direct scan's match; the
        // window pass must not report it again.
        let outcome = engine(&["info"], &[]).detect("information leak");
        assert_eq!(outcome.flagged.len(), 1);
        assert!(matches!(
            outcome.flagged[0],
            DetectionMatch::Embedding { .. }
        ));
    }

    #[test]
    fn test_fancy_glyph_breaks_pattern() {
        // Squared C strips away downstream, leaving "fuk": evaded.
        let outcome = engine(&["fuck"], &[]).detect("fu\u{1F132}k");
        assert!(outcome.clean);
    }

    #[test]
    fn test_special_char_breaks_pattern() {
        // The interspersion char survives the downstream strip, so the
        // window sees "f❤uck", not "fuck".
        let outcome = engine(&["fuck"], &[]).detect("f❤uck you");
        assert!(outcome.clean);
    }

    #[test]
    fn test_flagged_ordered_left_to_right() {
        let outcome = engine(&["ass", "fuck"], &[]).detect("fuck that ass");
        let words: Vec<&str> = outcome.flagged.iter().map(|m| m.filtered_word()).collect();
        assert_eq!(words, vec!["fuck", "ass"]);
    }

    #[test]
    fn test_match_display_lines() {
        let outcome = engine(&["ass", "info"], &[]).detect("grassy in fo");
        let lines: Vec<String> = outcome.flagged.iter().map(|m| m.to_string()).collect();
        // The widest window wins for "info", so its range spans all
        // three tokens and it sorts first.
        assert_eq!(
            lines,
            vec![
                "info [split across tokens] at 0..12",
                "ass [embedded in \"grassy\"] at 2..5",
            ]
        );

        let outcome = engine(&["ass"], &[]).detect("my ass");
        assert_eq!(outcome.flagged[0].to_string(), "ass [standalone] at 3..6");
    }

    #[test]
    fn test_detection_is_deterministic() {
        let eng = engine(&["ass", "info", "fuck"], &["assassin"]);
        let text = "in fo and a s s and fuck";
        let first = eng.detect(text);
        for _ in 0..5 {
            assert_eq!(eng.detect(text), first);
        }
    }
}
