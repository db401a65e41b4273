//! Leet-speak character substitution.
//!
//! Zero byte overhead for the ASCII replacements, so this is always the
//! cheapest transform the optimizer tries first.

/// Leet replacement for a single character, if one exists.
///
/// The table mirrors the substitutions a downstream filter will not fold
/// back to letters: these characters survive the filter's normalization.
pub fn leet_char(c: char) -> Option<char> {
    match c {
        'a' | 'A' => Some('4'),
        'e' => Some('3'),
        'E' => Some('€'),
        'i' | 'I' => Some('!'),
        'o' | 'O' => Some('0'),
        's' => Some('5'),
        'S' => Some('$'),
        'l' | 'L' => Some('|'),
        'z' | 'Z' => Some('2'),
        'c' | 'C' => Some('¢'),
        _ => None,
    }
}

/// Whether the character has a leet replacement.
pub fn is_convertible(c: char) -> bool {
    leet_char(c).is_some()
}

/// Index of the first leet-convertible character in `word`, if any.
pub fn first_convertible(word: &[char]) -> Option<usize> {
    word.iter().position(|&c| is_convertible(c))
}

/// Convert every convertible character (force-mode helper).
pub fn convert_all(text: &str) -> String {
    text.chars().map(|c| leet_char(c).unwrap_or(c)).collect()
}
