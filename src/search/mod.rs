// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The `Query` facade (§4.3, §4.4's orchestration counterpart one layer
//! down): ties a parsed query string, the validation pipeline, and the
//! evaluation protocol together into the one call a caller actually wants -
//! "validate this, then retrieve".
//!
//! Also hosts [`index_documents`], the toy indexing path that turns plain
//! text documents into an [`crate::inverted::InMemoryInvertedFile`] by
//! running them through a [`Tokenizer`] in [`TokenizeMode::Document`]. This
//! is the CLI demo's corpus builder, not a storage engine: real document
//! ingestion, batching, and on-disk list encoding remain an external
//! collaborator's job per §1/§9.

pub mod parser;

use crate::error::Result;
use crate::inverted::{InMemoryInvertedFile, InvertedFile};
use crate::query::node::{EvalNode, NodeRef, ResultSet};
use crate::query::{canon, ParsedNode};
use crate::tokenizer::{TokenizeMode, Tokenizer};
use crate::types::ModeFlags;
use crate::validate::{self, ValidateOptions};

pub use parser::{parse_query, ParseError};

/// A validated, evaluable query: the result of running a [`ParsedNode`]
/// through [`crate::validate::validate`] against one [`InvertedFile`].
pub struct Query {
    root: NodeRef,
}

impl Query {
    /// Parse `text` with [`parse_query`] and validate it in one step.
    pub fn parse_and_validate(
        text: &str,
        file: &dyn InvertedFile,
        tokenizer: &dyn Tokenizer,
        options: &ValidateOptions,
    ) -> std::result::Result<Query, QueryError> {
        let parsed = parse_query(text).map_err(QueryError::Parse)?;
        Query::validate(&parsed, file, tokenizer, options).map_err(QueryError::Validate)
    }

    /// Validate an already-parsed tree.
    pub fn validate(
        parsed: &ParsedNode,
        file: &dyn InvertedFile,
        tokenizer: &dyn Tokenizer,
        options: &ValidateOptions,
    ) -> Result<Query> {
        let root = validate::validate(parsed, file, tokenizer, options)?;
        Ok(Query { root })
    }

    /// The validated tree's canonical query string (§6.4) - the sharing
    /// pass's dedup key, also useful for `--explain` output.
    pub fn canonical_string(&self) -> String {
        canon::canonical_string(&self.root)
    }

    /// Boolean retrieval: every matching [`crate::types::DocumentId`] in
    /// ascending order.
    pub fn retrieve_boolean(&self) -> Result<Vec<crate::types::DocumentId>> {
        match self.root.retrieve(ModeFlags::NONE)? {
            ResultSet::Boolean(docs) => Ok(docs),
            ResultSet::Ranking(hits) => Ok(hits.into_iter().map(|h| h.doc_id).collect()),
        }
    }

    /// Ranked retrieval: every matching document with its finalized score,
    /// highest first (§4.2.10's two-stage protocol, run end to end).
    pub fn retrieve_ranked(&self) -> Result<Vec<crate::scoring::RankedHit>> {
        match self.root.retrieve(ModeFlags::RANKING_MODE)? {
            ResultSet::Ranking(hits) => Ok(hits),
            ResultSet::Boolean(docs) => Ok(docs
                .into_iter()
                .map(|doc_id| crate::scoring::RankedHit {
                    doc_id,
                    score: crate::types::Score(0.0),
                })
                .collect()),
        }
    }
}

/// Everything that can go wrong building a [`Query`] end to end.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    Parse(ParseError),
    Validate(crate::error::SearchError),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Parse(e) => write!(f, "query parse error: {e}"),
            QueryError::Validate(e) => write!(f, "query validate error: {e}"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Tokenize `documents` (1-origin: `documents[0]` becomes
/// [`crate::types::DocumentId`] 1) in [`TokenizeMode::Document`] and build an
/// [`InMemoryInvertedFile`] whose posting lists carry positions.
pub fn index_documents(documents: &[String], tokenizer: &dyn Tokenizer) -> Result<InMemoryInvertedFile> {
    let mut builder = InMemoryInvertedFile::builder();
    for (i, text) in documents.iter().enumerate() {
        let doc_id = (i + 1) as u32;
        let out = tokenizer.tokenize(text, TokenizeMode::Document)?;
        for (token, locations) in out.locations {
            builder = builder.posting(
                &token.text,
                doc_id,
                locations.into_iter().map(|l| l.get()).collect(),
                true,
            );
        }
        builder = builder.document_length(doc_id, text.chars().count() as u32);
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::ngram::NgramTokenizer;

    #[test]
    fn index_then_query_round_trips_a_boolean_search() {
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let docs = vec!["abcd".to_string(), "abef".to_string(), "xyef".to_string()];
        let file = index_documents(&docs, &tokenizer).unwrap();

        let query = Query::parse_and_validate("ab", &file, &tokenizer, &ValidateOptions::default())
            .unwrap();
        let mut hits = query.retrieve_boolean().unwrap();
        hits.sort();
        assert_eq!(hits, vec![crate::types::DocumentId(1), crate::types::DocumentId(2)]);
    }

    #[test]
    fn ranked_retrieval_orders_by_score() {
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let docs = vec!["ef ef".to_string(), "ef".to_string(), "xy".to_string()];
        let file = index_documents(&docs, &tokenizer).unwrap();
        let options = ValidateOptions {
            calculator_name: "unit".to_string(),
            combiner_name: "sum".to_string(),
            ..ValidateOptions::default()
        };

        let query = Query::parse_and_validate("ef", &file, &tokenizer, &options).unwrap();
        let hits = query.retrieve_ranked().unwrap();
        assert_eq!(hits[0].doc_id, crate::types::DocumentId(1));
    }

    #[test]
    fn canonical_string_is_stable_across_validations() {
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let docs = vec!["abcd".to_string()];
        let file = index_documents(&docs, &tokenizer).unwrap();
        let options = ValidateOptions::default();

        let a = Query::parse_and_validate("ab", &file, &tokenizer, &options).unwrap();
        let b = Query::parse_and_validate("ab", &file, &tokenizer, &options).unwrap();
        assert_eq!(a.canonical_string(), b.canonical_string());
    }
}
