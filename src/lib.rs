pub mod config;
pub mod detection;
pub mod optimizer;
pub mod pattern_index;
pub mod transforms;
pub mod wordlist;

// Re-export main types for convenient access
pub use config::{Config, DetectionConfig, OptimizeConfig, RELAXED_GROWTH_FACTOR};
pub use detection::{CollapseEntry, DetectionEngine, DetectionMatch, DetectionOutcome};
pub use optimizer::{OptimizationPipeline, OptimizationResult, Stage};
pub use pattern_index::{BuildError, BuildStats, PatternId, PatternIndex};
pub use wordlist::{load_word_file, WhitelistStore};
