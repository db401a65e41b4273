//! Shorthand compression: whole-word abbreviation substitution.
//!
//! The only byte-negative transform. It never participates in filter
//! evasion; the optimizer applies it purely to get an over-budget message
//! back under its byte/character limits.

use regex::Regex;
use std::sync::OnceLock;

/// Abbreviation dictionary, longest key first at build time so multi-word
/// phrases win over their component words ("thank you" before "you").
const SHORTHAND: &[(&str, &str)] = &[
    ("talk to you later", "ttyl"),
    ("as soon as possible", "asap"),
    ("as far as i know", "afaik"),
    ("laughing out loud", "lol"),
    ("i do not know", "idk"),
    ("i don't know", "idk"),
    ("to be honest", "tbh"),
    ("in my opinion", "imo"),
    ("by the way", "btw"),
    ("be right back", "brb"),
    ("not gonna lie", "ngl"),
    ("let me know", "lmk"),
    ("never mind", "nvm"),
    ("oh my god", "omg"),
    ("just kidding", "jk"),
    ("on my way", "omw"),
    ("see you later", "cya"),
    ("good morning", "gm"),
    ("good night", "gn"),
    ("thank you", "ty"),
    ("everything", "everyth"),
    ("nevermind", "nvm"),
    ("definitely", "def"),
    ("appreciate", "apprec8"),
    ("something", "smth"),
    ("seriously", "srsly"),
    ("tomorrow", "tmr"),
    ("everyone", "every1"),
    ("probably", "prob"),
    ("actually", "actly"),
    ("favorite", "fav"),
    ("straight", "str8"),
    ("question", "q"),
    ("important", "impt"),
    ("different", "diff"),
    ("information", "info"),
    ("especially", "esp"),
    ("whatever", "whatev"),
    ("messages", "msgs"),
    ("because", "bc"),
    ("someone", "some1"),
    ("without", "w/o"),
    ("minutes", "mins"),
    ("message", "msg"),
    ("tonight", "2nite"),
    ("picture", "pic"),
    ("thanks", "thx"),
    ("people", "ppl"),
    ("please", "pls"),
    ("really", "rly"),
    ("should", "shld"),
    ("anyone", "any1"),
    ("before", "b4"),
    ("little", "lil"),
    ("pretty", "prtty"),
    ("around", "arnd"),
    ("about", "abt"),
    ("later", "l8r"),
    ("great", "gr8"),
    ("think", "thnk"),
    ("would", "wld"),
    ("could", "cld"),
    ("maybe", "mayb"),
    ("today", "2day"),
    ("though", "tho"),
    ("through", "thru"),
    ("sorry", "sry"),
    ("night", "nite"),
    ("know", "kno"),
    ("wait", "w8"),
    ("mate", "m8"),
    ("late", "l8"),
    ("have", "hv"),
    ("just", "jst"),
    ("very", "v"),
    ("from", "frm"),
    ("with", "w/"),
    ("your", "ur"),
    ("what", "wut"),
    ("okay", "ok"),
    ("yeah", "ye"),
    ("you", "u"),
    ("are", "r"),
    ("and", "n"),
    ("see", "c"),
    ("why", "y"),
    ("too", "2"),
    ("for", "4"),
    ("be", "b"),
    ("to", "2"),
];

fn compiled_table() -> &'static Vec<(Regex, &'static str)> {
    static TABLE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut entries: Vec<_> = SHORTHAND.to_vec();
        // Longest-match-first regardless of table edits above.
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        entries
            .into_iter()
            .filter_map(|(full, short)| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(full));
                Regex::new(&pattern).ok().map(|re| (re, short))
            })
            .collect()
    })
}

/// Case-preserving replacement: ALL CAPS stays caps, Capitalized stays
/// capitalized, everything else is lowercase.
fn preserve_case(matched: &str, short: &str) -> String {
    let mut chars = matched.chars();
    let first_upper = chars.next().is_some_and(|c| c.is_uppercase());
    let all_upper = matched.chars().filter(|c| c.is_alphabetic()).count() > 1
        && matched
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(|c| c.is_uppercase());

    if all_upper {
        short.to_uppercase()
    } else if first_upper {
        let mut out = String::with_capacity(short.len());
        let mut it = short.chars();
        if let Some(c) = it.next() {
            out.extend(c.to_uppercase());
        }
        out.extend(it);
        out
    } else {
        short.to_string()
    }
}

/// Compress text using the abbreviation dictionary.
///
/// Whole words only, longest match first, case preserved.
pub fn compress(text: &str) -> String {
    let mut result = text.to_string();
    for (re, short) in compiled_table() {
        result = re
            .replace_all(&result, |caps: &regex::Captures<'_>| {
                preserve_case(&caps[0], short)
            })
            .into_owned();
    }
    result
}

/// Bytes saved by compressing, negative when compression would grow the text.
pub fn estimated_savings(text: &str) -> i64 {
    text.len() as i64 - compress(text).len() as i64
}
