//! File-backed word-list loading through to a working engine.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use veil::{Config, DetectionEngine, PatternIndex, WhitelistStore};

fn write_list(lines: &[&str]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(file)
}

#[test]
fn engine_from_files_end_to_end() -> Result<()> {
    let filter = write_list(&["# prohibited words", "ass", "", "FUCK", "ass"])?;
    let whitelist = write_list(&["assassin", "# safe words", "classic"])?;

    let words = veil::load_word_file(filter.path())?;
    let index = PatternIndex::build(words)?;
    assert_eq!(index.len(), 2, "comments, blanks, duplicates dropped");

    let engine = DetectionEngine::new(
        Arc::new(index),
        Arc::new(WhitelistStore::load(whitelist.path())?),
        Config::default().detection,
    );

    assert!(engine.detect("a classic assassin story").clean);
    assert!(!engine.detect("my ass").clean);
    assert!(!engine.detect("fuck").clean);
    Ok(())
}

#[test]
fn snapshot_swap_rebuilds_cleanly() -> Result<()> {
    let first = write_list(&["ass"])?;
    let second = write_list(&["ass", "fuck"])?;

    let build = |path: &std::path::Path| -> Result<Arc<PatternIndex>> {
        Ok(Arc::new(PatternIndex::build(veil::load_word_file(path)?)?))
    };

    let mut index = build(first.path())?;
    let whitelist = Arc::new(WhitelistStore::default());
    let engine = DetectionEngine::new(index.clone(), whitelist.clone(), Config::default().detection);
    assert!(engine.detect("fuck").clean);

    // A rebuild produces a fresh snapshot; the old engine keeps the old
    // index, a new engine picks up the new one.
    index = build(second.path())?;
    let engine2 = DetectionEngine::new(index, whitelist, Config::default().detection);
    assert!(engine.detect("fuck").clean);
    assert!(!engine2.detect("fuck").clean);
    Ok(())
}

#[test]
fn missing_filter_file_is_a_hard_error() {
    assert!(veil::load_word_file(std::path::Path::new("/no/such/list.txt")).is_err());
}
