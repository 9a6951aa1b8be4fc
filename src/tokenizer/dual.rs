// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Dual tokenizer (§4.1.3): emits both word-level tokens (via a pluggable
//! morphological analyzer) and the constituent character N-grams of each
//! surface word, so a single index can answer both `Word`- and
//! `Ngram`-indexed queries.
//!
//! The analyzer is a resource, not a hardcoded algorithm, mirroring how
//! [`super::normalize`] keeps normalization pluggable - grounded on the same
//! registry pattern, since both replace a raw function pointer from the
//! original source with a trait object behind a small integer id.

use super::ngram::NgramTokenizer;
use super::{
    check_token_length, insert_location, short_word_range, LocationMap, QueryTokenizedResult,
    TokenizeMode, TokenizeOutput, Tokenizer,
};
use crate::error::{Result, SearchError};
use crate::inverted::IndexingType;
use crate::types::Location;

/// One segmented surface word, with a morphological analyzer's confidence
/// in that segmentation expressed as `(term_frequency_weight, cost)` -
/// lower cost wins when a [`MorphologicalAnalyzer`] offers more than one
/// candidate segmentation for the same span.
#[derive(Debug, Clone)]
pub struct Morpheme {
    pub surface: String,
    pub cost: f64,
}

/// Pluggable word-level segmentation resource.
pub trait MorphologicalAnalyzer: Send + Sync + std::fmt::Debug {
    /// Segment `text` into its single best-cost morpheme sequence.
    fn segment(&self, text: &str) -> Vec<Morpheme>;
}

/// Whitespace-delimited analyzer: every maximal non-whitespace run is one
/// morpheme at cost `0.0`. Used as the dual tokenizer's built-in default and
/// as a fixture in tests; a real deployment installs a language-specific
/// analyzer instead.
#[derive(Debug, Default)]
pub struct WhitespaceAnalyzer;

impl MorphologicalAnalyzer for WhitespaceAnalyzer {
    fn segment(&self, text: &str) -> Vec<Morpheme> {
        text.split_whitespace()
            .map(|s| Morpheme {
                surface: s.to_string(),
                cost: 0.0,
            })
            .collect()
    }
}

/// Word tokens from an analyzer, plus each word's constituent N-grams via an
/// inner [`NgramTokenizer`].
#[derive(Debug)]
pub struct DualTokenizer {
    analyzer: Box<dyn MorphologicalAnalyzer>,
    ngram: NgramTokenizer,
    /// Top-K morphemes (by ascending cost) kept per segmented span; `0` means
    /// keep all of them.
    pub top_k: usize,
}

impl DualTokenizer {
    pub fn new(analyzer: Box<dyn MorphologicalAnalyzer>, ngram: NgramTokenizer) -> Self {
        DualTokenizer {
            analyzer,
            ngram,
            top_k: 1,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn selected_morphemes(&self, text: &str) -> Vec<Morpheme> {
        let mut morphemes = self.analyzer.segment(text);
        if self.top_k > 0 && morphemes.len() > self.top_k {
            morphemes.sort_by(|a, b| a.cost.total_cmp(&b.cost));
            morphemes.truncate(self.top_k);
        }
        morphemes
    }

    fn tokenize_words(&self, text: &str, mode: TokenizeMode, locations: &mut LocationMap) -> Result<usize> {
        let mut offset_chars = 0usize;
        let mut count = 0usize;
        for morpheme in self.selected_morphemes(text) {
            check_token_length(&morpheme.surface)?;
            let char_len = morpheme.surface.chars().count();
            let loc = Location((offset_chars + 1) as u32);
            insert_location(locations, &morpheme.surface, loc);
            count += 1;
            offset_chars += char_len;
            let _ = mode;
        }
        Ok(count)
    }
}

impl Tokenizer for DualTokenizer {
    fn tokenize(&self, text: &str, mode: TokenizeMode) -> Result<TokenizeOutput> {
        let mut locations = LocationMap::new();
        let word_count = self.tokenize_words(text, mode, &mut locations)?;

        let ngram_out = self.ngram.tokenize(text, mode)?;
        for (token, locs) in ngram_out.locations {
            locations.entry(token).or_default().extend(locs);
        }

        if word_count == 0 && ngram_out.short_word_prefix.is_some() {
            return Ok(TokenizeOutput {
                locations,
                tokenized_end: 0,
                short_word_prefix: ngram_out.short_word_prefix,
                char_offsets: None,
            });
        }

        Ok(TokenizeOutput {
            locations,
            tokenized_end: text.chars().count(),
            short_word_prefix: None,
            char_offsets: None,
        })
    }

    fn tokenize_multi(&self, text: &str, mode: TokenizeMode) -> Result<Vec<QueryTokenizedResult>> {
        let resource = super::normalize::get(self.ngram.norm_resource_id).ok_or(
            SearchError::GetNormalizerFail {
                resource_id: self.ngram.norm_resource_id,
            },
        )?;
        let mut targets = vec![resource.normalize(text)];
        targets.extend(resource.expand(text));

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let out = self.tokenize(&target, mode)?;
            let short_word_range = out.short_word_prefix.as_deref().map(short_word_range);
            results.push(QueryTokenizedResult {
                target,
                locations: out.locations,
                short_word_prefix: out.short_word_prefix,
                short_word_range,
            });
        }
        Ok(results)
    }

    fn is_supported(&self, indexing_type: IndexingType) -> bool {
        matches!(indexing_type, IndexingType::Dual | IndexingType::Word | IndexingType::Ngram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_tokenizer() -> DualTokenizer {
        DualTokenizer::new(Box::new(WhitespaceAnalyzer), NgramTokenizer::new(2, 2).unwrap())
    }

    #[test]
    fn whitespace_analyzer_splits_on_spaces() {
        let a = WhitespaceAnalyzer;
        let morphemes = a.segment("the quick fox");
        let surfaces: Vec<_> = morphemes.iter().map(|m| m.surface.as_str()).collect();
        assert_eq!(surfaces, vec!["the", "quick", "fox"]);
    }

    #[test]
    fn tokenize_emits_both_word_and_ngram_tokens() {
        let t = new_tokenizer();
        let out = t.tokenize("the fox", TokenizeMode::Document).unwrap();
        assert!(out.locations.contains_key("the"));
        assert!(out.locations.contains_key("fox"));
        assert!(out.locations.contains_key("th")); // ngram from "the"
    }

    #[test]
    fn top_k_limits_kept_morphemes() {
        let t = new_tokenizer().with_top_k(1);
        let mut locations = LocationMap::new();
        let count = t
            .tokenize_words("the quick fox jumps", TokenizeMode::Document, &mut locations)
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn is_supported_covers_dual_word_and_ngram() {
        let t = new_tokenizer();
        assert!(t.is_supported(IndexingType::Dual));
        assert!(t.is_supported(IndexingType::Word));
        assert!(t.is_supported(IndexingType::Ngram));
    }
}
