// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! CLI definitions for `invq`.
//!
//! Three subcommands mirror the three dataflow stages of §2's overview:
//! `tokenize` exercises the tokenizer family in isolation, `explain`
//! validates a query against a toy corpus and prints the resulting tree,
//! and `query` runs that same validated tree to completion (boolean or
//! ranked retrieval).

pub mod display;
pub mod explain;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "invq",
    about = "Query-tree model and tokenizer family for boolean and ranked retrieval over an inverted index",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tokenize a string and print the resulting token -> locations map.
    Tokenize {
        /// Tokenizer description (§6.3), e.g. `ngram:2:3`, `blocked:JAP:ALL:2`,
        /// `dual:JAP:ALL:2`.
        #[arg(short, long, default_value = "ngram:2:3")]
        tokenizer: String,

        /// Which of the three tokenization modes (§4.1) to run.
        #[arg(short, long, value_enum, default_value = "document")]
        mode: TokenizeModeArg,

        /// Text to tokenize.
        text: String,
    },

    /// Validate a query against a corpus and print its validated tree.
    Explain {
        /// Directory of `.txt` files; each file is one document, assigned
        /// ascending `DocumentId`s in sorted filename order.
        #[arg(short, long)]
        corpus: std::path::PathBuf,

        /// Tokenizer description (§6.3) used to build the corpus's index
        /// and to validate the query against it.
        #[arg(short, long, default_value = "ngram:2:2")]
        tokenizer: String,

        /// Query string, in the small surface syntax `crate::search::parser`
        /// accepts: bare words, `AND`/`OR`/`NOT`, parentheses, `"phrases"`.
        query: String,
    },

    /// Build a toy in-memory corpus and run a boolean or ranked query
    /// against it.
    Query {
        #[arg(short, long)]
        corpus: std::path::PathBuf,

        #[arg(short, long, default_value = "ngram:2:2")]
        tokenizer: String,

        /// Scoring calculator name (§6.2): `unit`, `tf-idf`, or `bm25`.
        #[arg(long, default_value = "unit")]
        calculator: String,

        /// Scoring combiner name (§6.2): `sum`, `max`, or `weighted`.
        #[arg(long, default_value = "sum")]
        combiner: String,

        /// Rank results by score instead of returning an unordered boolean set.
        #[arg(short, long)]
        rank: bool,

        /// Maximum number of results to print.
        #[arg(short, long, default_value = "10")]
        limit: usize,

        query: String,
    },
}

/// CLI-facing mirror of [`crate::tokenizer::TokenizeMode`] - `clap::ValueEnum`
/// cannot be derived on the library type without pulling `clap` into the
/// library's own dependency graph, so the CLI keeps its own copy and
/// converts at the boundary.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TokenizeModeArg {
    Document,
    Query,
    SimpleQuery,
}

impl From<TokenizeModeArg> for crate::tokenizer::TokenizeMode {
    fn from(value: TokenizeModeArg) -> Self {
        match value {
            TokenizeModeArg::Document => crate::tokenizer::TokenizeMode::Document,
            TokenizeModeArg::Query => crate::tokenizer::TokenizeMode::Query,
            TokenizeModeArg::SimpleQuery => crate::tokenizer::TokenizeMode::SimpleQuery,
        }
    }
}
