//! Special-character interspacing.
//!
//! Inserts a decorative character inside flagged words so the pattern no
//! longer appears contiguously. The character must survive the downstream
//! filter, so only characters outside the fancy strip ranges are usable,
//! and it must be safe to paste into a chat box.

/// Default interspersion character. Survives the modeled downstream strip.
pub const DEFAULT_CHAR: char = '❤';

/// Characters rejected outright even though they are printable: shell
/// metacharacters, quoting, and path separators.
const FORBIDDEN: &[char] = &[
    '`', '$', ';', '&', '|', '!', '^', '<', '>', '"', '\'', '\\', '/',
];

/// Whether `c` can be used as an interspersion character.
///
/// Control characters, whitespace, and alphanumerics are rejected because
/// they either break message rendering or change the words themselves.
pub fn is_safe_special_char(c: char) -> bool {
    if c.is_control() || c.is_whitespace() || c.is_alphanumeric() {
        return false;
    }
    if super::fancy::is_fancy(c) {
        return false;
    }
    !FORBIDDEN.contains(&c)
}

/// Insert `ch` between every pair of adjacent characters, skipping
/// positions adjacent to a space so word boundaries stay visible.
pub fn intersperse_every(text: &str, ch: char) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() * 2);
    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if i + 1 < chars.len() && c != ' ' && chars[i + 1] != ' ' {
            out.push(ch);
        }
    }
    out
}
