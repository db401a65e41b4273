//! Fancy-Unicode lookalike substitution.
//!
//! Replaces Latin letters with visually similar code points from the
//! enclosed-alphanumeric and mathematical-alphanumeric blocks. Typical
//! overhead is +3 bytes per character, so the optimizer prefers leet-speak
//! and falls back to these glyphs only when leet cannot break a pattern.
//!
//! The downstream filter is modeled as stripping every glyph in
//! [`STRIP_RANGES`] while keeping leet-speak characters and the
//! numeral-separator code point.

use serde::{Deserialize, Serialize};

/// Hangul Jungseong Araea. Inserted into digit runs because the modeled
/// downstream filter does not strip it.
pub const NUMERAL_SEPARATOR: char = '\u{119E}';

/// Available lookalike styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FancyStyle {
    Squared,
    Bold,
    Italic,
    BoldItalic,
    SansSerif,
    Circled,
    NegativeSquared,
    NegativeCircled,
}

impl Default for FancyStyle {
    fn default() -> Self {
        FancyStyle::Squared
    }
}

impl FancyStyle {
    /// Code point range(s) a glyph of this style falls into. Used by the
    /// detection tokenizer so converted letters stay part of their token.
    pub fn ranges(self) -> &'static [(u32, u32)] {
        match self {
            FancyStyle::Squared => &[(0x1F130, 0x1F149)],
            FancyStyle::Bold => &[(0x1D400, 0x1D433)],
            FancyStyle::Italic => &[(0x1D434, 0x1D467)],
            FancyStyle::BoldItalic => &[(0x1D468, 0x1D49B)],
            FancyStyle::SansSerif => &[(0x1D5A0, 0x1D5D3)],
            FancyStyle::Circled => &[(0x24B6, 0x24E9)],
            FancyStyle::NegativeSquared => &[(0x1F170, 0x1F189)],
            FancyStyle::NegativeCircled => &[(0x1F150, 0x1F169)],
        }
    }
}

/// Ranges the modeled downstream filter strips before re-scanning.
/// Covers every style above; leet characters are never in these ranges.
pub const STRIP_RANGES: &[(u32, u32)] = &[
    (0x1F130, 0x1F149), // squared
    (0x1D400, 0x1D7FF), // mathematical alphanumerics (bold, italic, sans serif, ...)
    (0x24B6, 0x24E9),   // circled
    (0x1F150, 0x1F189), // negative circled and negative squared
];

/// Convert one character to the given style, or return it unchanged when
/// the style has no glyph for it (digits, punctuation, non-Latin).
pub fn convert(c: char, style: FancyStyle) -> char {
    let (upper_base, lower_base) = match style {
        // Single-case styles map both cases onto the same glyph row.
        FancyStyle::Squared => (0x1F130, 0x1F130),
        FancyStyle::NegativeSquared => (0x1F170, 0x1F170),
        FancyStyle::NegativeCircled => (0x1F150, 0x1F150),
        FancyStyle::Circled => (0x24B6, 0x24D0),
        FancyStyle::Bold => (0x1D400, 0x1D41A),
        FancyStyle::Italic => (0x1D434, 0x1D44E),
        FancyStyle::BoldItalic => (0x1D468, 0x1D482),
        FancyStyle::SansSerif => (0x1D5A0, 0x1D5BA),
    };

    let mapped = match c {
        'A'..='Z' => upper_base + (c as u32 - 'A' as u32),
        'a'..='z' => lower_base + (c as u32 - 'a' as u32),
        _ => return c,
    };
    char::from_u32(mapped).unwrap_or(c)
}

/// Whether the character is a fancy glyph (any style).
pub fn is_fancy(c: char) -> bool {
    let code = c as u32;
    STRIP_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&code))
}

/// Whether the character belongs to the given style's glyph range(s).
pub fn in_style(c: char, style: FancyStyle) -> bool {
    let code = c as u32;
    style
        .ranges()
        .iter()
        .any(|&(start, end)| (start..=end).contains(&code))
}

/// Simulate the downstream filter: remove fancy glyphs, keep everything
/// else (leet characters, the numeral separator, the interspacing char).
pub fn strip_fancy(text: &str) -> String {
    text.chars().filter(|&c| !is_fancy(c)).collect()
}
