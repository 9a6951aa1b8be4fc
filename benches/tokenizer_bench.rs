//! Tokenizer throughput across the n-gram, blocked-n-gram, and dual
//! variants, over simulated blog-post corpora (small/medium/large).
//!
//! Run with: cargo bench --bench tokenizer_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use inverted_query::tokenizer::blocked::BlockedNgramTokenizer;
use inverted_query::tokenizer::dual::{DualTokenizer, WhitespaceAnalyzer};
use inverted_query::tokenizer::ngram::NgramTokenizer;
use inverted_query::tokenizer::{TokenizeMode, Tokenizer};
use std::time::Duration;

struct BlogSize {
    name: &'static str,
    posts: usize,
    words_per_post: usize,
}

const BLOG_SIZES: &[BlogSize] = &[
    BlogSize { name: "small", posts: 20, words_per_post: 500 },
    BlogSize { name: "medium", posts: 100, words_per_post: 1000 },
    BlogSize { name: "large", posts: 500, words_per_post: 1500 },
];

const VOCABULARY: &[&str] = &[
    "rust", "programming", "search", "inverted", "index", "query", "tokenizer",
    "ngram", "document", "retrieval", "ranking", "boolean", "score", "posting",
    "validate", "canonical", "evaluator", "location", "window", "distance",
];

fn make_post(id: usize, words: usize) -> String {
    let mut s = String::with_capacity(words * 8);
    for i in 0..words {
        let word = VOCABULARY[(id + i) % VOCABULARY.len()];
        s.push_str(word);
        s.push(' ');
    }
    s
}

fn bench_ngram_tokenize(c: &mut Criterion) {
    let tokenizer = NgramTokenizer::new(2, 3).unwrap();
    let mut group = c.benchmark_group("ngram_tokenize");
    for size in BLOG_SIZES {
        let corpus: Vec<String> = (0..size.posts).map(|i| make_post(i, size.words_per_post)).collect();
        let total_bytes: usize = corpus.iter().map(|s| s.len()).sum();
        group.throughput(Throughput::Bytes(total_bytes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size.name), &corpus, |b, corpus| {
            b.iter(|| {
                for doc in corpus {
                    black_box(tokenizer.tokenize(black_box(doc), TokenizeMode::Document).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_blocked_tokenize(c: &mut Criterion) {
    let tokenizer = BlockedNgramTokenizer::parse("ALL:2 KAT:3").unwrap();
    let mut group = c.benchmark_group("blocked_tokenize");
    for size in BLOG_SIZES {
        let corpus: Vec<String> = (0..size.posts).map(|i| make_post(i, size.words_per_post)).collect();
        let total_bytes: usize = corpus.iter().map(|s| s.len()).sum();
        group.throughput(Throughput::Bytes(total_bytes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size.name), &corpus, |b, corpus| {
            b.iter(|| {
                for doc in corpus {
                    black_box(tokenizer.tokenize(black_box(doc), TokenizeMode::Document).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_dual_tokenize(c: &mut Criterion) {
    let inner = NgramTokenizer::new(2, 2).unwrap();
    let tokenizer = DualTokenizer::new(Box::new(WhitespaceAnalyzer), inner);
    let mut group = c.benchmark_group("dual_tokenize");
    for size in BLOG_SIZES {
        let corpus: Vec<String> = (0..size.posts).map(|i| make_post(i, size.words_per_post)).collect();
        let total_bytes: usize = corpus.iter().map(|s| s.len()).sum();
        group.throughput(Throughput::Bytes(total_bytes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size.name), &corpus, |b, corpus| {
            b.iter(|| {
                for doc in corpus {
                    black_box(tokenizer.tokenize(black_box(doc), TokenizeMode::Document).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn tight_confidence() -> Criterion {
    Criterion::default()
        .confidence_level(0.99)
        .sample_size(100)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(2))
        .significance_level(0.01)
        .noise_threshold(0.02)
}

criterion_group!(
    name = benches;
    config = tight_confidence();
    targets = bench_ngram_tokenize, bench_blocked_tokenize, bench_dual_tokenize,
);
criterion_main!(benches);
