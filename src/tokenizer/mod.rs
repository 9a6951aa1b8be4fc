// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The tokenizer family: N-gram, Blocked-N-gram, and Dual, behind one
//! [`Tokenizer`] contract shared by document indexing and query validation.
//!
//! Every variant emits a `(token -> locations)` map rather than a flat token
//! stream, because the validation pipeline (§4.3) needs each token's 1-origin
//! offset to build an [`crate::query::node::OrderedDistanceNode`]'s
//! `(expected_offset, child)` pairs.

pub mod blocked;
pub mod dual;
pub mod ngram;
pub mod normalize;

use crate::error::{Result, SearchError};
use crate::inverted::IndexingType;
use crate::types::{Location, Token, MAX_INDEX_KEY_LEN};
use std::collections::HashMap;

/// How a call to [`Tokenizer::tokenize`] should segment its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeMode {
    /// Emit every token in `[minLen, maxLen]`, plus shorter tail tokens at
    /// the text's end - used when building the index.
    Document,
    /// Emit only `maxLen`-length tokens, overlapping, covering every
    /// position - the minimal set an `OrderedDistance` can glue back
    /// together into the original term.
    Query,
    /// Emit a minimal non-overlapping set of `maxLen`-length tokens.
    SimpleQuery,
}

/// `token -> sorted 1-origin locations within the tokenized text`.
pub type LocationMap = HashMap<Token, Vec<Location>>;

/// Output of a single [`Tokenizer::tokenize`] call.
#[derive(Debug, Clone, Default)]
pub struct TokenizeOutput {
    pub locations: LocationMap,
    /// Char offset, past the last token emitted; used by multi-result
    /// expansion to know where a subsequent pass should resume.
    pub tokenized_end: usize,
    /// Set when the (normalized) text as a whole is shorter than the
    /// tokenizer's minimum token length: the caller must fall back to a
    /// short-word range scan instead of an index lookup.
    pub short_word_prefix: Option<String>,
    /// Byte offsets of each emitted token's start, parallel-indexed to a
    /// caller-supplied original-text byte map, when requested.
    pub char_offsets: Option<Vec<usize>>,
}

/// One alternate tokenization of a query term: a normalized/expanded target
/// string plus its token->location map and, for short words, the `[from,
/// to)` range of index keys the caller must range-scan.
#[derive(Debug, Clone)]
pub struct QueryTokenizedResult {
    pub target: String,
    pub locations: LocationMap,
    pub short_word_prefix: Option<String>,
    pub short_word_range: Option<(String, String)>,
}

/// Common contract for every tokenizer variant (§4.1).
pub trait Tokenizer {
    /// Segment `text` under `mode`. Does not apply normalization/expansion -
    /// callers that want synonym/normalization variants use
    /// [`Tokenizer::tokenize_multi`].
    fn tokenize(&self, text: &str, mode: TokenizeMode) -> Result<TokenizeOutput>;

    /// Apply the configured normalization/expansion resource to produce N
    /// alternate target strings, then tokenize each. With no expansion
    /// configured (or none produced), returns exactly one result and no
    /// normalization is attempted inside `tokenize` itself.
    fn tokenize_multi(&self, text: &str, mode: TokenizeMode) -> Result<Vec<QueryTokenizedResult>>;

    /// Whether this tokenizer can serve the given indexing scheme.
    fn is_supported(&self, indexing_type: IndexingType) -> bool;
}

/// Shared short-word range helper: `[prefix, prefix + 0xFFFF)`, matching the
/// §8.3 boundary example (`from=that-char`, `to=that-char+0xFFFF`).
pub(crate) fn short_word_range(prefix: &str) -> (String, String) {
    let mut to = prefix.to_string();
    to.push('\u{FFFF}');
    (prefix.to_string(), to)
}

/// Enforce §9's `TooLongIndexKey` check, once per emitted token, in every
/// tokenizer variant.
pub(crate) fn check_token_length(text: &str) -> Result<()> {
    let char_len = text.chars().count();
    if char_len > MAX_INDEX_KEY_LEN {
        return Err(SearchError::TooLongIndexKey {
            token: text.to_string(),
            max_len: MAX_INDEX_KEY_LEN,
        });
    }
    Ok(())
}

pub(crate) fn insert_location(map: &mut LocationMap, text: &str, loc: Location) {
    match map.get_mut(text) {
        Some(locs) => locs.push(loc),
        None => {
            map.insert(Token::new(text), vec![loc]);
        }
    }
}

/// Parse the `@NORMRSCID:n` suffix off a tokenizer description string,
/// returning `(params_without_suffix, resource_id)`. Absence of the suffix
/// defaults to resource id 0 (the default normalizer).
pub(crate) fn split_norm_rsc_id(description: &str) -> (&str, u32) {
    match description.split_once(" @NORMRSCID:") {
        Some((params, id)) => (params, id.trim().parse().unwrap_or(0)),
        None => (description, 0),
    }
}

/// Parse a full `tokenizer_name ":" params` description (§6.3) into the
/// variant it names: `ngram`, `blocked`, or `dual`.
///
/// `blocked` and `dual` both carry the `JAP:` marker this grammar's
/// `blocked_params` production requires but [`blocked::BlockedNgramTokenizer::parse`]
/// does not itself expect, so it is stripped here. `dual`'s own parameter
/// syntax is not standardized by the spec beyond "reuse `blocked_params`";
/// this crate's [`dual::DualTokenizer`] wraps one inner n-gram tokenizer
/// plus a [`dual::WhitespaceAnalyzer`], so only the leading n-gram clause of
/// the description is consulted, defaulting to a 2-gram when absent.
pub fn parse_description(description: &str) -> Result<Box<dyn Tokenizer>> {
    let (name, rest) = description.split_once(':').ok_or_else(|| SearchError::InvalidTokenizerParameter {
        description: description.to_string(),
    })?;
    match name {
        "ngram" => Ok(Box::new(ngram::NgramTokenizer::parse(rest)?)),
        "blocked" => {
            let rest = rest.strip_prefix("JAP:").unwrap_or(rest);
            Ok(Box::new(blocked::BlockedNgramTokenizer::parse(rest)?))
        }
        "dual" => {
            let rest = rest.strip_prefix("JAP:").unwrap_or(rest);
            let (ngram_part, norm_resource_id) = split_norm_rsc_id(rest);
            let first_clause = ngram_part.split_whitespace().next().unwrap_or("2:2");
            let mut inner = ngram::NgramTokenizer::parse(first_clause)
                .unwrap_or(ngram::NgramTokenizer::new(2, 2)?);
            inner.norm_resource_id = norm_resource_id;
            Ok(Box::new(dual::DualTokenizer::new(Box::new(dual::WhitespaceAnalyzer), inner)))
        }
        _ => Err(SearchError::InvalidTokenizerParameter {
            description: description.to_string(),
        }),
    }
}

#[cfg(test)]
mod dispatch_tests {
    use super::*;

    #[test]
    fn ngram_description_dispatches() {
        let t = parse_description("ngram:2:3").unwrap();
        assert!(t.is_supported(IndexingType::Ngram));
    }

    #[test]
    fn blocked_description_strips_jap_marker() {
        let t = parse_description("blocked:JAP:ALL:2").unwrap();
        assert!(t.is_supported(IndexingType::Ngram));
    }

    #[test]
    fn dual_description_dispatches() {
        let t = parse_description("dual:JAP:ALL:2").unwrap();
        assert!(t.is_supported(IndexingType::Dual));
    }

    #[test]
    fn unknown_tokenizer_name_is_rejected() {
        assert!(parse_description("bogus:2:3").is_err());
    }

    #[test]
    fn missing_colon_is_rejected() {
        assert!(parse_description("ngram").is_err());
    }
}
