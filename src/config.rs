//! Runtime configuration.
//!
//! Loaded once (JSON) and passed by value into the engine and pipeline;
//! nothing reads configuration mid-call, so a reload is just a rebuild
//! with the new values.

use crate::transforms::fancy::FancyStyle;
use crate::transforms::interspacing;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Relaxed-acceptance growth ceiling: an edit round that grows the total
/// detection count is still kept when growth stays within this factor of
/// the number of target words it fixed. Overridable via
/// [`OptimizeConfig::relaxed_growth_factor`].
pub const RELAXED_GROWTH_FACTOR: usize = 2;

fn default_window() -> usize {
    3
}
fn default_special_char() -> char {
    interspacing::DEFAULT_CHAR
}
fn default_limit() -> usize {
    80
}
fn default_true() -> bool {
    true
}
fn default_growth_factor() -> usize {
    RELAXED_GROWTH_FACTOR
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Maximum token-window width for cross-token matching, clamped to 2..=5.
    pub max_sliding_window: usize,
    /// Lookalike style the optimizer converts into and the tokenizer
    /// treats as word characters.
    pub fancy_text_style: FancyStyle,
    /// Interspersion character; falls back to the default when unsafe.
    pub special_char: char,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            max_sliding_window: default_window(),
            fancy_text_style: FancyStyle::default(),
            special_char: default_special_char(),
        }
    }
}

impl DetectionConfig {
    /// Window width with the 2..=5 clamp applied.
    pub fn window_width(&self) -> usize {
        self.max_sliding_window.clamp(2, 5)
    }

    /// Interspersion character, substituting the default for unsafe values.
    pub fn effective_special_char(&self) -> char {
        if interspacing::is_safe_special_char(self.special_char) {
            self.special_char
        } else {
            warn!(
                configured = %self.special_char.escape_unicode(),
                fallback = %interspacing::DEFAULT_CHAR,
                "configured special char is unsafe, using default"
            );
            interspacing::DEFAULT_CHAR
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Maximum message size in bytes.
    pub byte_limit: usize,
    /// Maximum message size in characters.
    pub character_limit: usize,
    pub leet_speak: bool,
    pub fancy_unicode: bool,
    pub shorthand: bool,
    pub link_protection: bool,
    /// Interspacing replaces leet/fancy substitution when enabled.
    pub special_char_interspacing: bool,
    pub relaxed_growth_factor: usize,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        OptimizeConfig {
            byte_limit: default_limit(),
            character_limit: default_limit(),
            leet_speak: default_true(),
            fancy_unicode: default_true(),
            shorthand: default_true(),
            link_protection: default_true(),
            special_char_interspacing: false,
            relaxed_growth_factor: default_growth_factor(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub optimization: OptimizeConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.detection.window_width(), 3);
        assert_eq!(config.detection.effective_special_char(), '❤');
        assert_eq!(config.optimization.byte_limit, 80);
        assert!(config.optimization.leet_speak);
        assert!(!config.optimization.special_char_interspacing);
    }

    #[test]
    fn test_window_clamp() {
        let mut detection = DetectionConfig::default();
        detection.max_sliding_window = 1;
        assert_eq!(detection.window_width(), 2);
        detection.max_sliding_window = 99;
        assert_eq!(detection.window_width(), 5);
    }

    #[test]
    fn test_unsafe_special_char_falls_back() {
        let mut detection = DetectionConfig::default();
        detection.special_char = '$';
        assert_eq!(detection.effective_special_char(), '❤');
    }

    #[test]
    fn test_partial_json() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"{{"detection": {{"max_sliding_window": 4}}, "optimization": {{"byte_limit": 120}}}}"#
        )?;
        let config = Config::from_file(file.path())?;
        assert_eq!(config.detection.window_width(), 4);
        assert_eq!(config.detection.fancy_text_style, FancyStyle::Squared);
        assert_eq!(config.optimization.byte_limit, 120);
        assert!(config.optimization.shorthand);
        Ok(())
    }
}
