// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! `invq`: a command-line harness around the query-tree model and tokenizer
//! family.
//!
//! ```bash
//! # Tokenize a string with an n-gram tokenizer
//! invq tokenize --tokenizer ngram:2:3 --mode document "hello world"
//!
//! # Build a toy corpus from a directory of .txt files and run a query
//! invq query --corpus ./docs --tokenizer ngram:2:2 "cats AND dogs"
//!
//! # Same, but print the validated tree instead of evaluating it
//! invq explain --corpus ./docs --tokenizer ngram:2:2 "cats OR dogs"
//! ```
//!
//! This is not a production index builder - `--corpus` is tokenized fresh,
//! in memory, on every invocation (see [`inverted_query::search::index_documents`]).
//! On-disk persistence, incremental updates, and distributed execution are
//! explicitly out of scope (§1).

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;

mod cli;
use cli::display::{
    doc_id_value, document_frequency_value, row, score_value, section_bot, section_mid,
    section_top, styled, title, BOLD,
};
use cli::explain::print_tree;
use cli::{Cli, Commands};

use inverted_query::search::Query;
use inverted_query::tokenizer::{parse_description, Tokenizer};
use inverted_query::validate::ValidateOptions;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Tokenize { tokenizer, mode, text } => run_tokenize(&tokenizer, mode.into(), &text),
        Commands::Explain { corpus, tokenizer, query } => run_explain(&corpus, &tokenizer, &query),
        Commands::Query {
            corpus,
            tokenizer,
            calculator,
            combiner,
            rank,
            limit,
            query,
        } => run_query(&corpus, &tokenizer, &calculator, &combiner, rank, limit, &query),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_tokenize(
    tokenizer_desc: &str,
    mode: inverted_query::tokenizer::TokenizeMode,
    text: &str,
) -> anyhow::Result<()> {
    let tokenizer = parse_description(tokenizer_desc)?;
    let out = tokenizer.tokenize(text, mode)?;

    title(&format!("invq tokenize — {tokenizer_desc}"));
    section_top("TOKENS");
    if let Some(short) = &out.short_word_prefix {
        row(&format!("  short word: \"{short}\" (below minLen, needs a range scan)"));
    } else {
        let mut tokens: Vec<_> = out.locations.iter().collect();
        tokens.sort_by(|a, b| a.0.text.cmp(&b.0.text));
        for (token, locations) in tokens {
            let locs: Vec<String> = locations.iter().map(|l| l.get().to_string()).collect();
            row(&format!("  {:<24} @ [{}]", styled(&[BOLD], &token.text), locs.join(", ")));
        }
    }
    section_bot();
    Ok(())
}

/// Read every `*.txt` file in `dir`, sorted by filename, as one document
/// each. Filenames, not contents, determine `DocumentId` assignment so runs
/// are reproducible.
fn read_corpus(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
        .collect();
    paths.sort();
    paths
        .iter()
        .map(|p| std::fs::read_to_string(p).map_err(anyhow::Error::from))
        .collect()
}

fn build_corpus(
    corpus_dir: &Path,
    tokenizer_desc: &str,
) -> anyhow::Result<(inverted_query::inverted::InMemoryInvertedFile, Box<dyn Tokenizer>)> {
    let tokenizer = parse_description(tokenizer_desc)?;
    let documents = read_corpus(corpus_dir)?;
    if documents.is_empty() {
        anyhow::bail!("no .txt documents found under {}", corpus_dir.display());
    }
    let file = inverted_query::search::index_documents(&documents, tokenizer.as_ref())?;
    Ok((file, tokenizer))
}

fn run_explain(corpus_dir: &Path, tokenizer_desc: &str, query_text: &str) -> anyhow::Result<()> {
    let (file, tokenizer) = build_corpus(corpus_dir, tokenizer_desc)?;
    let options = ValidateOptions::default();

    let parsed = inverted_query::search::parse_query(query_text)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let root = inverted_query::validate::validate(&parsed, &file, tokenizer.as_ref(), &options)?;

    title("invq explain");
    section_top("VALIDATED TREE");
    print_tree(&root, 0, inverted_query::inverted::InvertedFile::get_total_document_frequency(&file));
    section_bot();
    println!();
    println!("canonical: {}", inverted_query::query::canon::canonical_string(&root));
    Ok(())
}

fn run_query(
    corpus_dir: &Path,
    tokenizer_desc: &str,
    calculator: &str,
    combiner: &str,
    rank: bool,
    limit: usize,
    query_text: &str,
) -> anyhow::Result<()> {
    let (file, tokenizer) = build_corpus(corpus_dir, tokenizer_desc)?;
    let options = ValidateOptions {
        calculator_name: calculator.to_string(),
        combiner_name: combiner.to_string(),
        ..ValidateOptions::default()
    };

    let query = Query::parse_and_validate(query_text, &file, tokenizer.as_ref(), &options)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    title(&format!("invq query — \"{query_text}\""));
    if rank {
        let hits = query.retrieve_ranked()?;
        section_top(&format!("RANKED RESULTS ({} of {})", hits.len().min(limit), hits.len()));
        row(&format!("  {:>8}  {:>10}", "doc", "score"));
        for hit in hits.iter().take(limit) {
            row(&format!("  {}  {}", doc_id_value(hit.doc_id.get()), score_value(hit.score.get())));
        }
        section_bot();
    } else {
        let docs = query.retrieve_boolean()?;
        let total_df = inverted_query::inverted::InvertedFile::get_total_document_frequency(&file);
        section_top(&format!("BOOLEAN RESULTS ({} of {})", docs.len().min(limit), docs.len()));
        for doc_id in docs.iter().take(limit) {
            row(&format!("  {}", doc_id_value(doc_id.get())));
        }
        section_mid("INFO");
        row(&format!("  total documents: {}", document_frequency_value(total_df, total_df.max(1))));
        section_bot();
    }
    Ok(())
}
