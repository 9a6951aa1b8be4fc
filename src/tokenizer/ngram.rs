// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Character N-gram tokenizer (§4.1.1).

use super::{
    check_token_length, insert_location, short_word_range, split_norm_rsc_id, LocationMap,
    QueryTokenizedResult, TokenizeMode, TokenizeOutput, Tokenizer,
};
use crate::error::{Result, SearchError};
use crate::inverted::IndexingType;
use crate::types::Location;

/// `(minLen, maxLen)` n-gram tokenizer, `1 <= minLen <= maxLen <= 8`.
#[derive(Debug, Clone)]
pub struct NgramTokenizer {
    pub min_len: usize,
    pub max_len: usize,
    pub norm_resource_id: u32,
}

impl NgramTokenizer {
    pub fn new(min_len: usize, max_len: usize) -> Result<Self> {
        if min_len == 0 || min_len > max_len || max_len > 8 {
            return Err(SearchError::InvalidTokenizerParameter {
                description: format!("{min_len}:{max_len}"),
            });
        }
        Ok(NgramTokenizer {
            min_len,
            max_len,
            norm_resource_id: 0,
        })
    }

    /// Parse a `minLen[:maxLen] [@NORMRSCID:n]` description (§6.3).
    pub fn parse(description: &str) -> Result<Self> {
        let (params, norm_resource_id) = split_norm_rsc_id(description);
        let mut parts = params.split(':');
        let min_len: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SearchError::InvalidTokenizerParameter {
                description: description.to_string(),
            })?;
        let max_len: usize = match parts.next() {
            Some(s) => s.parse().map_err(|_| SearchError::InvalidTokenizerParameter {
                description: description.to_string(),
            })?,
            None => min_len,
        };
        if parts.next().is_some() {
            return Err(SearchError::InvalidTokenizerParameter {
                description: description.to_string(),
            });
        }
        let mut t = NgramTokenizer::new(min_len, max_len)?;
        t.norm_resource_id = norm_resource_id;
        Ok(t)
    }

    fn tokenize_document(&self, chars: &[char]) -> Result<TokenizeOutput> {
        let n = chars.len();
        let mut locations = LocationMap::new();
        for head in 0..n {
            let remaining = n - head;
            let hi = remaining.min(self.max_len);
            let lo = if remaining >= self.min_len { self.min_len } else { remaining };
            for len in lo..=hi {
                let text: String = chars[head..head + len].iter().collect();
                check_token_length(&text)?;
                insert_location(&mut locations, &text, Location((head + 1) as u32));
            }
        }
        Ok(TokenizeOutput {
            locations,
            tokenized_end: n,
            short_word_prefix: None,
            char_offsets: None,
        })
    }

    fn tokenize_query(&self, chars: &[char]) -> Result<TokenizeOutput> {
        let n = chars.len();
        if n < self.min_len {
            let short: String = chars.iter().collect();
            return Ok(TokenizeOutput {
                locations: LocationMap::new(),
                tokenized_end: 0,
                short_word_prefix: Some(short),
                char_offsets: None,
            });
        }
        let mut locations = LocationMap::new();
        let mut head = 0usize;
        loop {
            let remaining = n - head;
            if remaining < self.max_len {
                // §4.1.1: stopping mid-stream (not at the first position)
                // emits nothing further - the caller falls back to the
                // short-word path for what's left. At the first position
                // the whole (already-long-enough) text is emitted as one
                // token instead of being dropped.
                if head == 0 {
                    let text: String = chars.iter().collect();
                    check_token_length(&text)?;
                    insert_location(&mut locations, &text, Location(1));
                }
                break;
            }
            let text: String = chars[head..head + self.max_len].iter().collect();
            check_token_length(&text)?;
            insert_location(&mut locations, &text, Location((head + 1) as u32));
            head += 1;
        }
        Ok(TokenizeOutput {
            locations,
            tokenized_end: n,
            short_word_prefix: None,
            char_offsets: None,
        })
    }

    fn tokenize_simple_query(&self, chars: &[char]) -> Result<TokenizeOutput> {
        let n = chars.len();
        if n < self.min_len {
            let short: String = chars.iter().collect();
            return Ok(TokenizeOutput {
                locations: LocationMap::new(),
                tokenized_end: 0,
                short_word_prefix: Some(short),
                char_offsets: None,
            });
        }
        if n < self.max_len {
            let text: String = chars.iter().collect();
            let mut locations = LocationMap::new();
            check_token_length(&text)?;
            insert_location(&mut locations, &text, Location(1));
            return Ok(TokenizeOutput {
                locations,
                tokenized_end: n,
                short_word_prefix: None,
                char_offsets: None,
            });
        }
        let mut locations = LocationMap::new();
        let mut head = 0usize;
        let mut last_head = None;
        while n - head >= self.max_len {
            let text: String = chars[head..head + self.max_len].iter().collect();
            check_token_length(&text)?;
            insert_location(&mut locations, &text, Location((head + 1) as u32));
            last_head = Some(head);
            head += self.max_len;
        }
        // Tail anchor: if the non-overlapping stride doesn't reach the end,
        // add one more maxLen token anchored at the last possible offset so
        // every character is covered by at least one token.
        if let Some(last) = last_head {
            let tail_head = n - self.max_len;
            if tail_head > last {
                let text: String = chars[tail_head..tail_head + self.max_len].iter().collect();
                check_token_length(&text)?;
                insert_location(&mut locations, &text, Location((tail_head + 1) as u32));
            }
        }
        Ok(TokenizeOutput {
            locations,
            tokenized_end: n,
            short_word_prefix: None,
            char_offsets: None,
        })
    }
}

impl Tokenizer for NgramTokenizer {
    fn tokenize(&self, text: &str, mode: TokenizeMode) -> Result<TokenizeOutput> {
        let resource = super::normalize::get(self.norm_resource_id).ok_or(
            SearchError::GetNormalizerFail {
                resource_id: self.norm_resource_id,
            },
        )?;
        let normalized = resource.normalize(text);
        let chars: Vec<char> = normalized.chars().collect();
        match mode {
            TokenizeMode::Document => self.tokenize_document(&chars),
            TokenizeMode::Query => self.tokenize_query(&chars),
            TokenizeMode::SimpleQuery => self.tokenize_simple_query(&chars),
        }
    }

    fn tokenize_multi(&self, text: &str, mode: TokenizeMode) -> Result<Vec<QueryTokenizedResult>> {
        let resource = super::normalize::get(self.norm_resource_id).ok_or(
            SearchError::GetNormalizerFail {
                resource_id: self.norm_resource_id,
            },
        )?;
        let mut targets = vec![resource.normalize(text)];
        targets.extend(resource.expand(text));

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let chars: Vec<char> = target.chars().collect();
            let out = match mode {
                TokenizeMode::Document => self.tokenize_document(&chars),
                TokenizeMode::Query => self.tokenize_query(&chars),
                TokenizeMode::SimpleQuery => self.tokenize_simple_query(&chars),
            }?;
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
        matches!(indexing_type, IndexingType::Ngram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locs(out: &TokenizeOutput, token: &str) -> Vec<u32> {
        let mut v: Vec<u32> = out
            .locations
            .get(token)
            .map(|v| v.iter().map(|l| l.get()).collect())
            .unwrap_or_default();
        v.sort_unstable();
        v
    }

    #[test]
    fn document_mode_emits_all_lengths_plus_tail() {
        let t = NgramTokenizer::new(2, 3).unwrap();
        let out = t.tokenize("abcd", TokenizeMode::Document).unwrap();
        assert_eq!(locs(&out, "ab"), vec![1]);
        assert_eq!(locs(&out, "abc"), vec![1]);
        assert_eq!(locs(&out, "bc"), vec![2]);
        assert_eq!(locs(&out, "bcd"), vec![2]);
        assert_eq!(locs(&out, "cd"), vec![3]); // tail token, length < maxLen
    }

    #[test]
    fn query_mode_emits_only_max_len_overlapping() {
        let t = NgramTokenizer::new(2, 2).unwrap();
        let out = t.tokenize("abcd", TokenizeMode::Query).unwrap();
        assert_eq!(locs(&out, "ab"), vec![1]);
        assert_eq!(locs(&out, "bc"), vec![2]);
        assert_eq!(locs(&out, "cd"), vec![3]);
        assert!(out.short_word_prefix.is_none());
    }

    #[test]
    fn empty_input_produces_no_tokens() {
        let t = NgramTokenizer::new(2, 2).unwrap();
        let out = t.tokenize("", TokenizeMode::Document).unwrap();
        assert!(out.locations.is_empty());
    }

    #[test]
    fn short_single_char_query_sets_short_word_prefix() {
        let t = NgramTokenizer::new(2, 2).unwrap();
        let out = t.tokenize("a", TokenizeMode::Query).unwrap();
        assert!(out.locations.is_empty());
        assert_eq!(out.short_word_prefix.as_deref(), Some("a"));
        let (from, to) = short_word_range("a");
        assert_eq!(from, "a");
        assert_eq!(to, "a\u{FFFF}");
    }

    #[test]
    fn simple_query_mode_is_non_overlapping() {
        let t = NgramTokenizer::new(2, 3).unwrap();
        let out = t.tokenize("abcdefgh", TokenizeMode::SimpleQuery).unwrap();
        // heads 0, 3, 6 (tail-anchored since 6+3=9 > 8, anchored at 5)
        assert!(out.locations.values().map(|v| v.len()).sum::<usize>() >= 2);
    }

    #[test]
    fn invalid_min_greater_than_max_rejected() {
        assert!(NgramTokenizer::new(5, 2).is_err());
    }

    #[test]
    fn parse_reads_min_and_max_and_norm_resource() {
        let t = NgramTokenizer::parse("2:3 @NORMRSCID:7").unwrap();
        assert_eq!(t.min_len, 2);
        assert_eq!(t.max_len, 3);
        assert_eq!(t.norm_resource_id, 7);
    }

    #[test]
    fn tokenize_multi_without_expansion_returns_one_result() {
        let t = NgramTokenizer::new(2, 2).unwrap();
        let results = t.tokenize_multi("abcd", TokenizeMode::Query).unwrap();
        assert_eq!(results.len(), 1);
    }
}
