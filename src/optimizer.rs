//! Convergence-driven message rewriting.
//!
//! The pipeline edits a flagged message one character at a time, re-running
//! detection after every candidate edit, until the message re-detects as
//! clean or the iteration ceiling is hit. Transforms are tried cheapest
//! first: leet-speak costs nothing, fancy Unicode costs ~3 bytes per glyph,
//! interspacing (when enabled) replaces both. Shorthand and splitting only
//! manage size, never cleanliness.

use crate::config::OptimizeConfig;
use crate::detection::{DetectionEngine, DetectionMatch, DetectionOutcome};
use crate::transforms::{fancy, interspacing, leet, shorthand};
use crate::transforms::fancy::{FancyStyle, NUMERAL_SEPARATOR};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;
use tracing::debug;

/// Ceiling on edit-and-redetect passes. Convergence is bounded by this
/// counter, never by external signals.
const MAX_ITERATIONS: usize = 10;

/// Transform stages, in the order the pipeline applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NumeralDelimiter,
    LinkProtection,
    LeetSpeak,
    FancyUnicode,
    SpecialCharInterspacing,
    Shorthand,
    MultipartSplit,
}

/// Outcome of one `optimize` call, consumed immediately by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub optimized: String,
    pub stages_applied: Vec<Stage>,
    /// Exactly `bytes(optimized) - bytes(input)`.
    pub byte_change: i64,
    pub success: bool,
    /// Unique words flagged by the initial detection, in scan order.
    pub flagged_words: Vec<String>,
    pub links_modified: bool,
    /// Remainder of an over-budget message, for a follow-up send.
    pub paste_part: Option<String>,
    /// Stages ran, the text changed, and the flagged count strictly
    /// decreased, even though the message may not be fully clean.
    pub partial_optimization: bool,
}

fn url_regex() -> &'static Regex {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE.get_or_init(|| {
        Regex::new(
            r"(?:https?://|(?:www\.|[a-zA-Z0-9-]+\.(?:gg|com|net|org|io|tv|me|co)/))[-a-zA-Z0-9$_@.&+/!*(),%]+",
        )
        .expect("URL pattern is a valid regex")
    })
}

fn count_word(outcome: &DetectionOutcome, word: &str) -> usize {
    outcome
        .flagged
        .iter()
        .filter(|m| m.filtered_word() == word)
        .count()
}

/// Char spans of every placeholder occurrence in `text`.
fn placeholder_spans(text: &str, placeholders: &[(String, String)]) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    for (name, _) in placeholders {
        let needle: Vec<char> = name.chars().collect();
        let mut i = 0;
        while i + needle.len() <= chars.len() {
            if chars[i..i + needle.len()] == needle[..] {
                spans.push((i, i + needle.len()));
                i += needle.len();
            } else {
                i += 1;
            }
        }
    }
    spans
}

fn in_spans(spans: &[(usize, usize)], pos: usize) -> bool {
    spans.iter().any(|&(s, e)| (s..e).contains(&pos))
}

fn restore_links(text: &str, placeholders: &[(String, String)]) -> String {
    let mut out = text.to_string();
    for (name, original) in placeholders {
        out = out.replace(name.as_str(), original);
    }
    out
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Force-mode transform of one placeholder-free segment: digit runs get
/// the numeral separator between every digit, vowels go leet (fancy when
/// no leet glyph exists), consonants go fancy.
fn force_transform(segment: &str, style: FancyStyle) -> String {
    let chars: Vec<char> = segment.chars().collect();
    let mut out = String::with_capacity(segment.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            for (k, &d) in chars[start..i].iter().enumerate() {
                if k > 0 {
                    out.push(NUMERAL_SEPARATOR);
                }
                out.push(d);
            }
            continue;
        }
        if c.is_alphabetic() {
            if is_vowel(c) {
                out.push(leet::leet_char(c).unwrap_or_else(|| fancy::convert(c, style)));
            } else {
                out.push(fancy::convert(c, style));
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

pub struct OptimizationPipeline {
    engine: DetectionEngine,
    config: OptimizeConfig,
}

impl OptimizationPipeline {
    pub fn new(engine: DetectionEngine, config: OptimizeConfig) -> Self {
        OptimizationPipeline { engine, config }
    }

    pub fn engine(&self) -> &DetectionEngine {
        &self.engine
    }

    /// Rewrite `text` until it re-detects as clean, then enforce budgets.
    ///
    /// A clean input comes back unchanged apart from budget handling. A
    /// dirty input is worked on in collapsed form; failure to fully clean
    /// is reported via `success=false`, never as an error.
    pub fn optimize(&self, text: &str) -> OptimizationResult {
        let outcome = self.engine.detect(text);
        if outcome.clean {
            let mut stages = Vec::new();
            // Budget handling masks links too, so shorthand can never
            // rewrite URL content.
            let mut protected = text.to_string();
            let placeholders = if self.config.link_protection {
                self.protect_links(&mut protected)
            } else {
                Vec::new()
            };
            let (send, paste) = self.enforce_budget(protected, &placeholders, &mut stages);
            let byte_change = send.len() as i64 - text.len() as i64;
            return OptimizationResult {
                optimized: send,
                stages_applied: stages,
                byte_change,
                success: true,
                flagged_words: Vec::new(),
                links_modified: false,
                paste_part: paste,
                partial_optimization: false,
            };
        }

        let mut flagged_words: Vec<String> = Vec::new();
        for m in &outcome.flagged {
            if !flagged_words.iter().any(|w| w == m.filtered_word()) {
                flagged_words.push(m.filtered_word().to_string());
            }
        }
        let initial_count = outcome.flagged.len();
        debug!(
            flagged = initial_count,
            words = ?flagged_words,
            "optimizing dirty message"
        );

        let mapping = outcome.collapse_mapping.clone();
        let mut stages: Vec<Stage> = Vec::new();
        let mut working: Vec<char> = outcome.collapsed_text.chars().collect();

        // Interspacing mode handles numeric tokens itself; the delimiter
        // pre-stage only runs for the substitution transforms.
        if !self.config.special_char_interspacing && self.numeral_prestage(&mut working, &outcome)
        {
            stages.push(Stage::NumeralDelimiter);
        }

        let mut protected: String = working.iter().collect();
        let placeholders = if self.config.link_protection {
            self.protect_links(&mut protected)
        } else {
            Vec::new()
        };
        let links_modified = !placeholders.is_empty();
        if links_modified {
            stages.push(Stage::LinkProtection);
        }
        working = protected.chars().collect();

        let final_outcome = if self.config.special_char_interspacing {
            self.interspacing_loop(&mut working, &mapping, &placeholders, &mut stages)
        } else {
            self.substitution_loop(&mut working, &mapping, &placeholders, &mut stages)
        };
        // Success is judged with links still masked; the loop never sees
        // or edits URL content.
        let success = final_outcome.clean;
        let final_count = final_outcome.flagged.len();

        let worked: String = working.iter().collect();
        let full_text = restore_links(&worked, &placeholders);
        let changed = full_text != text;
        let (send, paste) = self.enforce_budget(worked, &placeholders, &mut stages);
        let byte_change = send.len() as i64 - text.len() as i64;

        OptimizationResult {
            optimized: send,
            partial_optimization: !stages.is_empty() && changed && final_count < initial_count,
            stages_applied: stages,
            byte_change,
            success,
            flagged_words,
            links_modified,
            paste_part: paste,
        }
    }

    /// Transform every character without consulting detection. Used when
    /// the caller knows the real filter catches things this detector
    /// cannot model.
    pub fn force_optimize(&self, text: &str) -> String {
        let mut protected = text.to_string();
        let placeholders = if self.config.link_protection {
            self.protect_links(&mut protected)
        } else {
            Vec::new()
        };
        let spans = placeholder_spans(&protected, &placeholders);
        let chars: Vec<char> = protected.chars().collect();
        let special = self.engine.special_char();
        let style = self.engine.fancy_style();

        let mut out = String::with_capacity(protected.len() * 2);
        let mut i = 0;
        while i < chars.len() {
            if let Some(&(s, e)) = spans.iter().find(|&&(s, _)| s == i) {
                out.extend(&chars[s..e]);
                i = e;
                continue;
            }
            let seg_end = spans
                .iter()
                .map(|&(s, _)| s)
                .filter(|&s| s > i)
                .min()
                .unwrap_or(chars.len());
            let segment: String = chars[i..seg_end].iter().collect();
            if self.config.special_char_interspacing {
                out.push_str(&interspacing::intersperse_every(&segment, special));
            } else {
                out.push_str(&force_transform(&segment, style));
            }
            i = seg_end;
        }
        restore_links(&out, &placeholders)
    }

    /// Pre-stage for flagged numeric tokens: a pure digit run gets the
    /// numeral separator at its midpoint, a digit-leading token gets its
    /// first letter converted to fancy. Tokens inside URLs are skipped
    /// when link protection is on.
    fn numeral_prestage(&self, working: &mut Vec<char>, outcome: &DetectionOutcome) -> bool {
        let text: String = working.iter().collect();
        let url_spans: Vec<(usize, usize)> = if self.config.link_protection {
            let char_of_byte: Vec<usize> = {
                let mut v = vec![0; text.len() + 1];
                for (ci, (bi, _)) in text.char_indices().enumerate() {
                    v[bi] = ci;
                }
                v[text.len()] = text.chars().count();
                v
            };
            url_regex()
                .find_iter(&text)
                .map(|m| (char_of_byte[m.start()], char_of_byte[m.end()]))
                .collect()
        } else {
            Vec::new()
        };

        let spans: Vec<(usize, usize)> = outcome.flagged.iter().map(|m| m.target_span()).collect();
        enum Edit {
            Insert(usize),
            Replace(usize, char),
        }
        let mut edits: Vec<Edit> = Vec::new();

        for token in self.engine.tokenize(&text) {
            if !spans.iter().any(|&(s, e)| token.start < e && s < token.end) {
                continue;
            }
            if in_spans(&url_spans, token.start) {
                continue;
            }
            let tchars: Vec<char> = token.text.chars().collect();
            if tchars.len() >= 2 && tchars.iter().all(|c| c.is_ascii_digit()) {
                edits.push(Edit::Insert(token.start + tchars.len() / 2));
            } else if tchars[0].is_ascii_digit() {
                if let Some(li) = tchars.iter().position(|c| c.is_alphabetic()) {
                    let converted = fancy::convert(tchars[li], self.engine.fancy_style());
                    if converted != tchars[li] {
                        edits.push(Edit::Replace(token.start + li, converted));
                    }
                }
            }
        }

        let changed = !edits.is_empty();
        edits.sort_by_key(|e| std::cmp::Reverse(match e {
            Edit::Insert(p) | Edit::Replace(p, _) => *p,
        }));
        for edit in edits {
            match edit {
                Edit::Insert(p) => working.insert(p, NUMERAL_SEPARATOR),
                Edit::Replace(p, c) => working[p] = c,
            }
        }
        changed
    }

    fn protect_links(&self, text: &mut String) -> Vec<(String, String)> {
        let mut placeholders = Vec::new();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (i, m) in url_regex().find_iter(text).enumerate() {
            let name = format!("__LINK_{i}__");
            out.push_str(&text[last..m.start()]);
            out.push_str(&name);
            placeholders.push((name, m.as_str().to_string()));
            last = m.end();
        }
        out.push_str(&text[last..]);
        *text = out;
        placeholders
    }

    /// Leet-first, fancy-fallback edit loop. Each pass re-detects, picks
    /// each flagged target, and tries candidate characters inside the
    /// target span until one passes both the simulated-strip check and
    /// the acceptance heuristic. Edited positions are never re-edited.
    fn substitution_loop(
        &self,
        working: &mut Vec<char>,
        mapping: &[crate::detection::CollapseEntry],
        placeholders: &[(String, String)],
        stages: &mut Vec<Stage>,
    ) -> DetectionOutcome {
        let mut edited: HashSet<usize> = HashSet::new();

        for iteration in 0..MAX_ITERATIONS {
            let text: String = working.iter().collect();
            let current = self.engine.detect_collapsed(&text, mapping);
            if current.clean {
                return current;
            }
            let protected = placeholder_spans(&text, placeholders);
            let known: HashSet<String> = current
                .flagged
                .iter()
                .map(|m| m.filtered_word().to_string())
                .collect();

            let mut progressed = false;
            for target in current.flagged.clone() {
                let word = target.filtered_word().to_string();
                let now: String = working.iter().collect();
                let before = self.engine.detect_collapsed(&now, mapping);
                let Some(live) = before.flagged.iter().find(|m| m.filtered_word() == word)
                else {
                    continue; // fixed as a side effect of an earlier edit
                };
                let span = live.target_span();
                if self.try_fix_target(
                    working, mapping, &before, &word, span, &protected, &known, &mut edited,
                    stages,
                ) {
                    progressed = true;
                }
            }
            if !progressed {
                debug!(iteration, "substitution loop stalled");
                break;
            }
        }

        let text: String = working.iter().collect();
        self.engine.detect_collapsed(&text, mapping)
    }

    /// Try to clear one target occurrence. Leet candidates across the
    /// span are tried before any fancy candidate, matching the transform
    /// cost order. Every attempt is transactional: a rejected edit leaves
    /// the buffer untouched.
    #[allow(clippy::too_many_arguments)]
    fn try_fix_target(
        &self,
        working: &mut Vec<char>,
        mapping: &[crate::detection::CollapseEntry],
        before: &DetectionOutcome,
        word: &str,
        span: (usize, usize),
        protected: &[(usize, usize)],
        known: &HashSet<String>,
        edited: &mut HashSet<usize>,
        stages: &mut Vec<Stage>,
    ) -> bool {
        let style = self.engine.fancy_style();
        let mut candidates: Vec<(usize, char, Stage)> = Vec::new();
        if self.config.leet_speak {
            for pos in span.0..span.1.min(working.len()) {
                if let Some(l) = leet::leet_char(working[pos]) {
                    candidates.push((pos, l, Stage::LeetSpeak));
                }
            }
        }
        if self.config.fancy_unicode {
            for pos in span.0..span.1.min(working.len()) {
                let c = working[pos];
                if !c.is_alphanumeric() {
                    continue;
                }
                let converted = fancy::convert(c, style);
                if converted != c {
                    candidates.push((pos, converted, Stage::FancyUnicode));
                }
            }
        }

        for (pos, replacement, stage) in candidates {
            if edited.contains(&pos) || in_spans(protected, pos) {
                continue;
            }
            let original = working[pos];
            working[pos] = replacement;
            let candidate: String = working.iter().collect();

            // Model the downstream filter before committing: the edit is
            // useless if the stripped text still carries the target, and
            // harmful if it manufactures a new flagged term.
            let stripped = fancy::strip_fancy(&candidate);
            let simulated = self.engine.detect_collapsed(&stripped, &[]);
            let reintroduced = simulated.flagged.iter().any(|m| m.filtered_word() == word);
            let new_term = simulated
                .flagged
                .iter()
                .any(|m| !known.contains(m.filtered_word()));
            if reintroduced || new_term {
                working[pos] = original;
                continue;
            }

            let after = self.engine.detect_collapsed(&candidate, mapping);
            if self.accept(before, &after, word) {
                debug!(word, pos, from = %original, to = %replacement, "edit accepted");
                edited.insert(pos);
                if !stages.contains(&stage) {
                    stages.push(stage);
                }
                return true;
            }
            working[pos] = original;
        }
        false
    }

    /// Acceptance heuristic for a candidate edit: fully clean, or the
    /// targeted count dropped with bounded collateral growth, or the
    /// total count dropped outright.
    fn accept(&self, before: &DetectionOutcome, after: &DetectionOutcome, word: &str) -> bool {
        if after.clean {
            return true;
        }
        let target_before = count_word(before, word);
        let target_after = count_word(after, word);
        let total_before = before.flagged.len();
        let total_after = after.flagged.len();
        if target_after < target_before {
            let fixed = target_before - target_after;
            if total_after <= total_before + self.config.relaxed_growth_factor * fixed {
                return true;
            }
        }
        total_after < total_before
    }

    /// Special-character mode: instead of substituting, insert the
    /// configured character after each target's first character and
    /// re-detect. Window matches are deferred while direct matches
    /// remain, since fixing those usually dissolves the window.
    fn interspacing_loop(
        &self,
        working: &mut Vec<char>,
        mapping: &[crate::detection::CollapseEntry],
        placeholders: &[(String, String)],
        stages: &mut Vec<Stage>,
    ) -> DetectionOutcome {
        let special = self.engine.special_char();

        for iteration in 0..MAX_ITERATIONS {
            let text: String = working.iter().collect();
            let current = self.engine.detect_collapsed(&text, mapping);
            if current.clean {
                return current;
            }
            let protected = placeholder_spans(&text, placeholders);
            let has_direct = current
                .flagged
                .iter()
                .any(|m| !matches!(m, DetectionMatch::StrippedWindow { .. }));

            let mut inserts: BTreeSet<usize> = BTreeSet::new();
            for m in &current.flagged {
                if has_direct && matches!(m, DetectionMatch::StrippedWindow { .. }) {
                    continue;
                }
                let pos = m.target_span().0 + 1;
                if pos > working.len() || in_spans(&protected, pos) {
                    continue;
                }
                // already interspersed here
                if working[pos - 1] == special
                    || (pos < working.len() && working[pos] == special)
                {
                    continue;
                }
                inserts.insert(pos);
            }
            if inserts.is_empty() {
                debug!(iteration, "interspacing loop stalled");
                break;
            }
            for &pos in inserts.iter().rev() {
                working.insert(pos, special);
            }
            if !stages.contains(&Stage::SpecialCharInterspacing) {
                stages.push(Stage::SpecialCharInterspacing);
            }
        }

        let text: String = working.iter().collect();
        self.engine.detect_collapsed(&text, mapping)
    }

    /// Restore links, then bring the message under both budgets:
    /// shorthand first (links still masked so URL text is never
    /// rewritten), word-boundary split as the last resort.
    fn enforce_budget(
        &self,
        protected: String,
        placeholders: &[(String, String)],
        stages: &mut Vec<Stage>,
    ) -> (String, Option<String>) {
        let restored = restore_links(&protected, placeholders);
        if self.fits(&restored) {
            return (restored, None);
        }

        let restored = if self.config.shorthand {
            let compressed = shorthand::compress(&protected);
            if compressed != protected && !stages.contains(&Stage::Shorthand) {
                stages.push(Stage::Shorthand);
            }
            restore_links(&compressed, placeholders)
        } else {
            restored
        };
        if self.fits(&restored) {
            return (restored, None);
        }

        let (send, paste) = self.split_at_budget(&restored);
        if paste.is_some() {
            stages.push(Stage::MultipartSplit);
        }
        (send, paste)
    }

    fn fits(&self, text: &str) -> bool {
        text.len() <= self.config.byte_limit
            && text.chars().count() <= self.config.character_limit
    }

    /// Split at the last whitespace boundary whose prefix fits both
    /// budgets. Never mid-word; when even the first word is over budget
    /// the text is returned whole rather than truncated.
    fn split_at_budget(&self, text: &str) -> (String, Option<String>) {
        let chars: Vec<char> = text.chars().collect();
        let mut bytes = 0usize;
        let mut best: Option<usize> = None;
        for (i, &c) in chars.iter().enumerate() {
            if c.is_whitespace() {
                if bytes <= self.config.byte_limit && i <= self.config.character_limit {
                    best = Some(i);
                } else {
                    break;
                }
            }
            bytes += c.len_utf8();
        }
        match best {
            Some(i) => {
                let send: String = chars[..i].iter().collect();
                let paste: String = chars[i..].iter().collect();
                let send = send.trim_end().to_string();
                let paste = paste.trim_start().to_string();
                if paste.is_empty() {
                    (send, None)
                } else {
                    (send, Some(paste))
                }
            }
            None => (text.to_string(), None),
        }
    }
}
