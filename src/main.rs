use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use veil::{Config, DetectionEngine, OptimizationPipeline, PatternIndex, WhitelistStore};

#[derive(Parser, Debug)]
#[command(name = "veil")]
#[command(about = "Detect prohibited substrings and rewrite messages to evade a downstream filter")]
#[command(version)]
struct Args {
    /// Message to process; read from stdin when omitted
    message: Option<String>,

    /// Prohibited-word list (one entry per line, # comments)
    #[arg(long)]
    filter: PathBuf,

    /// Safe-when-embedded word list
    #[arg(long)]
    whitelist: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only report detections, do not rewrite
    #[arg(long)]
    detect: bool,

    /// Transform every character without consulting detection
    #[arg(long)]
    force: bool,

    /// Emit machine-readable JSON instead of plain text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // WHY: structured JSON logging enables observability and debugging in production
    tracing_subscriber::fmt()
        .with_target(false)
        .json()
        .init();

    let args = Args::parse();
    info!(?args, "Parsed CLI arguments");

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let words = veil::load_word_file(&args.filter)?;
    let index = Arc::new(PatternIndex::build(words).context("Failed to build pattern index")?);
    let whitelist = Arc::new(match &args.whitelist {
        Some(path) => WhitelistStore::load(path)?,
        None => WhitelistStore::default(),
    });
    info!(
        patterns = index.len(),
        whitelist = whitelist.len(),
        "engine ready"
    );

    let engine = DetectionEngine::new(index, whitelist, config.detection);

    let message = match args.message {
        Some(m) => m,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read message from stdin")?;
            buf.trim_end_matches('\n').to_string()
        }
    };

    if args.detect {
        let outcome = engine.detect(&message);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else if outcome.clean {
            println!("clean");
        } else {
            for m in &outcome.flagged {
                println!("{m}");
            }
        }
        return Ok(());
    }

    let pipeline = OptimizationPipeline::new(engine, config.optimization);

    if args.force {
        println!("{}", pipeline.force_optimize(&message));
        return Ok(());
    }

    let result = pipeline.optimize(&message);
    info!(
        success = result.success,
        stages = ?result.stages_applied,
        byte_change = result.byte_change,
        "optimization finished"
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.optimized);
        if let Some(paste) = &result.paste_part {
            println!("--- paste part ---");
            println!("{paste}");
        }
        if !result.success {
            eprintln!("still flagged: {}", result.flagged_words.join(", "));
        }
    }

    Ok(())
}
