use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use veil::{Config, DetectionEngine, OptimizationPipeline, PatternIndex, WhitelistStore};

/// Synthetic word list approximating the shape of a real ~77k-entry
/// filter: short lowercase Latin words with heavy prefix sharing.
fn synthetic_patterns(count: usize) -> Vec<String> {
    let stems = [
        "fuck", "shit", "ass", "bitch", "damn", "crap", "info", "spam", "scam", "hack",
    ];
    let mut words = Vec::with_capacity(count);
    for i in 0..count {
        let stem = stems[i % stems.len()];
        words.push(format!("{stem}{i}"));
    }
    // Keep a few real hits so detection does actual classification work.
    words.extend(stems.iter().map(|s| s.to_string()));
    words
}

fn engine_with(count: usize) -> DetectionEngine {
    let index = PatternIndex::build(synthetic_patterns(count)).unwrap();
    DetectionEngine::new(
        Arc::new(index),
        Arc::new(WhitelistStore::from_words(["assassin", "classic"])),
        Config::default().detection,
    )
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    group.sample_size(20); // builds are expensive relative to queries
    for count in [1_000, 10_000, 77_000] {
        let words = synthetic_patterns(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &words, |b, words| {
            b.iter(|| {
                let index = PatternIndex::build(words.iter().map(String::as_str)).unwrap();
                black_box(index.len());
            })
        });
    }
    group.finish();
}

fn bench_detection(c: &mut Criterion) {
    let engine = engine_with(77_000);
    let messages = [
        ("clean", "just a perfectly ordinary chat message with nothing in it"),
        ("standalone", "well fuck that was unexpected"),
        ("embedded", "the assassin and the grassy field"),
        ("spaced", "f u c k this whole thing honestly"),
        ("split", "in fo about the dis cord server"),
    ];

    let mut group = c.benchmark_group("detect");
    for (name, message) in messages {
        group.throughput(Throughput::Bytes(message.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| black_box(engine.detect(black_box(message))))
        });
    }
    group.finish();
}

fn bench_optimize(c: &mut Criterion) {
    let pipeline = OptimizationPipeline::new(engine_with(77_000), Config::default().optimization);
    let mut group = c.benchmark_group("optimize");
    for (name, message) in [
        ("clean", "just a perfectly ordinary chat message"),
        ("one_word", "well fuck that"),
        ("several", "fuck this shit and my ass too"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(pipeline.optimize(black_box(message))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_index_build, bench_detection, bench_optimize);
criterion_main!(benches);
