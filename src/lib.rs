// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! A polymorphic query-tree model and tokenizer family for boolean and
//! ranked retrieval over an inverted index.
//!
//! This crate is the CORE layer of a full-text search engine: it owns the
//! query node hierarchy, the rough/precise two-stage evaluation protocol,
//! the validation-and-rewrite pipeline that turns a parsed query into an
//! evaluable tree, and the tokenizer family that both indexing and query
//! validation share. Storage, on-disk list encoding, and distributed
//! execution are an external collaborator's job - see [`inverted`] for the
//! narrow trait boundary this crate expects from one.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌──────────────┐
//! │ tokenizer/  │────▶│  validate/    │────▶│   query/     │
//! │ (ngram,     │     │ (parse tree   │     │ (NodeRef,    │
//! │  blocked,   │     │  -> validated │     │  EvalNode,   │
//! │  dual)      │     │  NodeRef)     │     │  retrieve)   │
//! └─────────────┘     └───────────────┘     └──────────────┘
//!        │                    │                     │
//!        ▼                    ▼                     ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                    search/ (Query facade)                 │
//! │     parse_query · Query::validate · retrieve_boolean      │
//! │                   · retrieve_ranked                       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! `inverted`, `location`, `scoring`, and `planner` are the collaborator
//! traits and pluggable strategies this pipeline is built against: an
//! [`inverted::InvertedFile`] supplies posting lists and document
//! frequencies, a [`scoring::ScoreCalculator`]/[`scoring::ScoreCombiner`]
//! pair turns term frequencies into a ranked score, and [`planner`] is the
//! interface-level combinator layer a query planner built on top of this
//! crate would implement.

pub mod contracts;
pub mod error;
pub mod inverted;
pub mod location;
pub mod planner;
pub mod query;
pub mod scoring;
pub mod search;
pub mod tokenizer;
pub mod types;
mod utils;
pub mod validate;

pub use error::{Result, SearchError};
pub use query::{EvalNode, MatchMode, NodeRef, ParsedNode, QueryNode, ResultSet, TermLeafNode};
pub use scoring::RankedHit;
pub use search::{index_documents, parse_query, ParseError, Query, QueryError};
pub use tokenizer::{TokenizeMode, Tokenizer};
pub use types::{DocumentId, Location as TokenLocation, ModeFlags, Score, Token};
pub use validate::ValidateOptions;
