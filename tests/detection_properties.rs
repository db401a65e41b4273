//! Detection-tier properties exercised through the public API.

use std::sync::Arc;
use veil::{Config, DetectionEngine, DetectionMatch, PatternIndex, WhitelistStore};

fn engine(patterns: &[&str], whitelist: &[&str]) -> DetectionEngine {
    DetectionEngine::new(
        Arc::new(PatternIndex::build(patterns.iter().copied()).unwrap()),
        Arc::new(WhitelistStore::from_words(whitelist.iter().copied())),
        Config::default().detection,
    )
}

#[test]
fn whitelist_exempts_embedded_occurrences() {
    let outcome = engine(&["ass"], &["assassin"]).detect("assassin is fun");
    assert!(outcome.clean, "both embeddings should be exempt");
}

#[test]
fn standalone_is_never_exempt() {
    let outcome = engine(&["ass"], &["ass", "assassin"]).detect("my ass");
    assert_eq!(outcome.flagged.len(), 1);
    assert!(matches!(
        outcome.flagged[0],
        DetectionMatch::Standalone { .. }
    ));
}

#[test]
fn spaced_out_pattern_collapses_and_overrides_whitelist() {
    let outcome = engine(&["fuck"], &["fuck"]).detect("f u c k you");
    assert_eq!(outcome.collapsed_text, "fuck you");
    assert_eq!(outcome.flagged.len(), 1);
    match &outcome.flagged[0] {
        DetectionMatch::Standalone {
            filtered_word,
            position,
        } => {
            assert_eq!(filtered_word, "fuck");
            assert_eq!(*position, 0);
        }
        other => panic!("expected standalone after collapse, got {other:?}"),
    }
    assert_eq!(outcome.collapse_mapping.len(), 1);
    assert!(outcome.collapse_mapping[0].evasion_sourced);
    assert_eq!(outcome.collapse_mapping[0].original_span, (0, 7));
}

#[test]
fn sliding_window_catches_split_words() {
    let outcome = engine(&["info"], &[]).detect("in fo discord");
    assert_eq!(outcome.flagged.len(), 1);
    match &outcome.flagged[0] {
        DetectionMatch::StrippedWindow {
            filtered_word,
            window_range,
        } => {
            assert_eq!(filtered_word, "info");
            assert_eq!(window_range.0, 0);
            assert!(window_range.1 >= 5, "window must span at least both halves");
        }
        other => panic!("expected stripped window, got {other:?}"),
    }
}

#[test]
fn detection_is_deterministic() {
    let eng = engine(&["ass", "fuck", "info"], &["assassin"]);
    let messages = [
        "assassin is fun",
        "my ass",
        "f u c k you",
        "in fo discord",
        "a perfectly ordinary sentence",
    ];
    for message in messages {
        let first = eng.detect(message);
        for _ in 0..10 {
            assert_eq!(eng.detect(message), first, "nondeterminism on {message:?}");
        }
    }
}

#[test]
fn empty_pattern_list_fails_engine_construction() {
    assert!(PatternIndex::build(["", "# nothing real"]).is_err());
}
