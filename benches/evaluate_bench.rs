//! Query validation and evaluation over simulated blog corpora, plus a
//! `tantivy` differential comparison for boolean AND/OR retrieval on the
//! same small corpus (tantivy doubles as a cross-check oracle - see
//! `tests/scenarios.rs` for the correctness-focused comparison).
//!
//! Run with: cargo bench --bench evaluate_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use inverted_query::search::{index_documents, Query};
use inverted_query::tokenizer::ngram::NgramTokenizer;
use inverted_query::validate::ValidateOptions;
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

fn make_corpus(posts: usize, words: usize) -> Vec<String> {
    (0..posts)
        .map(|id| {
            let mut s = String::with_capacity(words * 8);
            for i in 0..words {
                s.push_str(VOCABULARY[(id + i) % VOCABULARY.len()]);
                s.push(' ');
            }
            s
        })
        .collect()
}

fn bench_validate_and_retrieve_boolean(c: &mut Criterion) {
    let tokenizer = NgramTokenizer::new(2, 2).unwrap();
    let options = ValidateOptions::default();
    let mut group = c.benchmark_group("boolean_retrieval");
    for size in BLOG_SIZES {
        let corpus = make_corpus(size.posts, size.words_per_post);
        let file = index_documents(&corpus, &tokenizer).unwrap();
        group.throughput(Throughput::Elements(size.posts as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size.name), &file, |b, file| {
            b.iter(|| {
                let query = Query::parse_and_validate(
                    black_box("rust AND search"),
                    file,
                    &tokenizer,
                    &options,
                )
                .unwrap();
                black_box(query.retrieve_boolean().unwrap());
            });
        });
    }
    group.finish();
}

fn bench_validate_and_retrieve_ranked(c: &mut Criterion) {
    let tokenizer = NgramTokenizer::new(2, 2).unwrap();
    let options = ValidateOptions {
        calculator_name: "tf-idf".to_string(),
        combiner_name: "sum".to_string(),
        ..ValidateOptions::default()
    };
    let mut group = c.benchmark_group("ranked_retrieval");
    for size in BLOG_SIZES {
        let corpus = make_corpus(size.posts, size.words_per_post);
        let file = index_documents(&corpus, &tokenizer).unwrap();
        group.throughput(Throughput::Elements(size.posts as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size.name), &file, |b, file| {
            b.iter(|| {
                let query = Query::parse_and_validate(
                    black_box("rust OR programming"),
                    file,
                    &tokenizer,
                    &options,
                )
                .unwrap();
                black_box(query.retrieve_ranked().unwrap());
            });
        });
    }
    group.finish();
}

mod tantivy_bench {
    use super::*;
    use tantivy::collector::Count;
    use tantivy::query::QueryParser;
    use tantivy::schema::{Schema, TEXT};
    use tantivy::Index;

    /// Build the same small corpus in tantivy and run an equivalent boolean
    /// AND query, so the boolean-retrieval benchmark above has a published
    /// baseline to read alongside it.
    pub fn bench_search(c: &mut Criterion) {
        let mut schema_builder = Schema::builder();
        let body = schema_builder.add_text_field("body", TEXT);
        let schema = schema_builder.build();
        let index = Index::create_in_ram(schema);
        let mut writer = index.writer(16_000_000).unwrap();
        for doc in make_corpus(20, 500) {
            writer.add_document(doc!(body => doc)).unwrap();
        }
        writer.commit().unwrap();

        let reader = index.reader().unwrap();
        let searcher = reader.searcher();
        let parser = QueryParser::for_index(&index, vec![body]);
        let query = parser.parse_query("rust AND search").unwrap();

        c.bench_function("tantivy_boolean_search_small", |b| {
            b.iter(|| {
                black_box(searcher.search(&query, &Count).unwrap());
            });
        });
    }
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
    targets = bench_validate_and_retrieve_boolean, bench_validate_and_retrieve_ranked, tantivy_bench::bench_search,
);
criterion_main!(benches);
