// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Blocked N-gram tokenizer (§4.1.2): per-character-class token lengths and a
//! restricted set of cross-class token pairs, instead of one uniform
//! `(minLen, maxLen)` for the whole text.
//!
//! Each character is first classified into one of 13 blocks; a run of
//! same-block characters is then n-grammed using that block's own
//! `[min, max]`, and a token may only span two adjacent blocks if the pair
//! is in the configured valid-pair set (e.g. Katakana immediately followed
//! by Kanji). `ALL` in the parameter grammar is not itself a 14th class - it
//! is a wildcard meaning "apply this length clause to every block that has
//! none of its own".

use super::{
    check_token_length, insert_location, short_word_range, split_norm_rsc_id, LocationMap,
    QueryTokenizedResult, TokenizeMode, TokenizeOutput, Tokenizer,
};
use crate::error::{Result, SearchError};
use crate::inverted::IndexingType;
use crate::types::Location;
use std::collections::{HashMap, HashSet};

/// A character's block classification. `Oth` catches anything not claimed by
/// a more specific block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharBlock {
    Oth,
    Asc,
    Sym,
    Dig,
    Alp,
    Hir,
    Kat,
    Grk,
    Rus,
    Kei,
    Kan,
    Han,
    Gai,
}

impl CharBlock {
    pub fn name(self) -> &'static str {
        match self {
            CharBlock::Oth => "OTH",
            CharBlock::Asc => "ASC",
            CharBlock::Sym => "SYM",
            CharBlock::Dig => "DIG",
            CharBlock::Alp => "ALP",
            CharBlock::Hir => "HIR",
            CharBlock::Kat => "KAT",
            CharBlock::Grk => "GRK",
            CharBlock::Rus => "RUS",
            CharBlock::Kei => "KEI",
            CharBlock::Kan => "KAN",
            CharBlock::Han => "HAN",
            CharBlock::Gai => "GAI",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "OTH" => CharBlock::Oth,
            "ASC" => CharBlock::Asc,
            "SYM" => CharBlock::Sym,
            "DIG" => CharBlock::Dig,
            "ALP" => CharBlock::Alp,
            "HIR" => CharBlock::Hir,
            "KAT" => CharBlock::Kat,
            "GRK" => CharBlock::Grk,
            "RUS" => CharBlock::Rus,
            "KEI" => CharBlock::Kei,
            "KAN" => CharBlock::Kan,
            "HAN" => CharBlock::Han,
            "GAI" => CharBlock::Gai,
            _ => return None,
        })
    }

    /// Classify one character. Intentionally approximate - this is not a
    /// byte-for-byte port of any particular Unicode block table, only a
    /// plausible 13-way split a real one would refine.
    pub fn classify(c: char) -> CharBlock {
        match c {
            'a'..='z' | 'A'..='Z' => CharBlock::Asc,
            '0'..='9' => CharBlock::Dig,
            '\u{3040}'..='\u{309F}' => CharBlock::Hir,
            '\u{30A0}'..='\u{30FF}' => CharBlock::Kat,
            '\u{4E00}'..='\u{9FFF}' => CharBlock::Han,
            '\u{0370}'..='\u{03FF}' => CharBlock::Grk,
            '\u{0400}'..='\u{04FF}' => CharBlock::Rus,
            '\u{3000}'..='\u{303F}' => CharBlock::Kei,
            '\u{FF00}'..='\u{FFEF}' => CharBlock::Gai,
            c if c.is_alphabetic() => CharBlock::Alp,
            c if c.is_whitespace() => CharBlock::Oth,
            c if c.is_ascii_punctuation() => CharBlock::Sym,
            _ => CharBlock::Oth,
        }
    }
}

const DEFAULT_MIN_MAX: (usize, usize) = (2, 2);

/// `minLen..=maxLen` for one block, plus which other blocks may extend a
/// token begun in this one.
#[derive(Debug, Clone)]
struct BlockConfig {
    min_len: usize,
    max_len: usize,
}

#[derive(Debug, Clone)]
pub struct BlockedNgramTokenizer {
    configs: HashMap<CharBlock, BlockConfig>,
    /// `(from, to)` pairs that may share one token, in addition to same-block pairs.
    valid_pairs: HashSet<(CharBlock, CharBlock)>,
    pub norm_resource_id: u32,
}

impl BlockedNgramTokenizer {
    pub fn new() -> Self {
        BlockedNgramTokenizer {
            configs: HashMap::new(),
            valid_pairs: HashSet::new(),
            norm_resource_id: 0,
        }
    }

    fn config_for(&self, block: CharBlock) -> BlockConfig {
        self.configs
            .get(&block)
            .cloned()
            .unwrap_or(BlockConfig {
                min_len: DEFAULT_MIN_MAX.0,
                max_len: DEFAULT_MIN_MAX.1,
            })
    }

    fn may_extend(&self, from: CharBlock, to: CharBlock) -> bool {
        from == to || self.valid_pairs.contains(&(from, to))
    }

    /// Parse `BLOCK[:minLen[:maxLen]] ... [@NORMRSCID:n]`, e.g.
    /// `JAP:ALL:2 KAT:3 KAN:1:2 @NORMRSCID:5`. `ALL` assigns the following
    /// length clause to every block lacking its own entry; a bare pair
    /// `BLOCK1:BLOCK2` (no numeric length following) instead registers a
    /// valid cross-block token pair.
    pub fn parse(description: &str) -> Result<Self> {
        let (params, norm_resource_id) = split_norm_rsc_id(description);
        let mut t = BlockedNgramTokenizer::new();
        t.norm_resource_id = norm_resource_id;
        let mut pending_all: Option<(usize, usize)> = None;

        for clause in params.split_whitespace() {
            let mut parts = clause.split(':');
            let first = parts.next().ok_or_else(|| SearchError::InvalidTokenizerParameter {
                description: description.to_string(),
            })?;

            if first == "ALL" {
                let min_len: usize = parts
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| SearchError::InvalidTokenizerParameter {
                        description: description.to_string(),
                    })?;
                let max_len = match parts.next() {
                    Some(s) => s.parse().map_err(|_| SearchError::InvalidTokenizerParameter {
                        description: description.to_string(),
                    })?,
                    None => min_len,
                };
                pending_all = Some((min_len, max_len));
                continue;
            }

            let block = CharBlock::parse(first).ok_or_else(|| SearchError::InvalidTokenizerParameter {
                description: description.to_string(),
            })?;

            match parts.next() {
                None => {
                    // Bare block name: no length clause of its own, adopt ALL if seen.
                    if let Some((min_len, max_len)) = pending_all {
                        t.configs.insert(block, BlockConfig { min_len, max_len });
                    }
                }
                Some(second) => {
                    if let Some(pair_block) = CharBlock::parse(second) {
                        t.valid_pairs.insert((block, pair_block));
                    } else {
                        let min_len: usize = second.parse().map_err(|_| {
                            SearchError::InvalidTokenizerParameter {
                                description: description.to_string(),
                            }
                        })?;
                        let max_len = match parts.next() {
                            Some(s) => s.parse().map_err(|_| SearchError::InvalidTokenizerParameter {
                                description: description.to_string(),
                            })?,
                            None => min_len,
                        };
                        t.configs.insert(block, BlockConfig { min_len, max_len });
                    }
                }
            }
        }

        if let Some((min_len, max_len)) = pending_all {
            for block in [
                CharBlock::Oth,
                CharBlock::Asc,
                CharBlock::Sym,
                CharBlock::Dig,
                CharBlock::Alp,
                CharBlock::Hir,
                CharBlock::Kat,
                CharBlock::Grk,
                CharBlock::Rus,
                CharBlock::Kei,
                CharBlock::Kan,
                CharBlock::Han,
                CharBlock::Gai,
            ] {
                t.configs.entry(block).or_insert(BlockConfig { min_len, max_len });
            }
        }

        Ok(t)
    }

    /// Classify each character and cut the text into maximal runs where
    /// adjacent characters' blocks may share a token (same block, or a
    /// configured valid pair in one direction).
    fn segment(&self, chars: &[char]) -> Vec<(usize, usize, CharBlock)> {
        let mut runs = Vec::new();
        if chars.is_empty() {
            return runs;
        }
        let mut start = 0usize;
        let mut current = CharBlock::classify(chars[0]);
        for i in 1..chars.len() {
            let block = CharBlock::classify(chars[i]);
            if !self.may_extend(current, block) {
                runs.push((start, i, current));
                start = i;
                current = block;
            }
        }
        runs.push((start, chars.len(), current));
        runs
    }

    fn ngram_run(
        &self,
        chars: &[char],
        start: usize,
        end: usize,
        block: CharBlock,
        mode: TokenizeMode,
        locations: &mut LocationMap,
    ) -> Result<()> {
        let config = self.config_for(block);
        let len = end - start;
        match mode {
            TokenizeMode::Document => {
                for head in start..end {
                    let remaining = end - head;
                    let hi = remaining.min(config.max_len);
                    let lo = if remaining >= config.min_len { config.min_len } else { remaining };
                    for l in lo..=hi {
                        let text: String = chars[head..head + l].iter().collect();
                        check_token_length(&text)?;
                        insert_location(locations, &text, Location((head + 1) as u32));
                    }
                }
            }
            TokenizeMode::Query | TokenizeMode::SimpleQuery => {
                if len < config.min_len {
                    return Ok(());
                }
                let stride = if mode == TokenizeMode::SimpleQuery { config.max_len } else { 1 };
                let mut head = start;
                while head < end && end - head >= config.max_len {
                    let text: String = chars[head..head + config.max_len].iter().collect();
                    check_token_length(&text)?;
                    insert_location(locations, &text, Location((head + 1) as u32));
                    head += stride;
                }
                if head < end && mode == TokenizeMode::Query && head == start {
                    let text: String = chars[start..end].iter().collect();
                    check_token_length(&text)?;
                    insert_location(locations, &text, Location((start + 1) as u32));
                }
            }
        }
        Ok(())
    }

    fn tokenize_inner(&self, chars: &[char], mode: TokenizeMode) -> Result<TokenizeOutput> {
        let n = chars.len();
        let runs = self.segment(chars);
        let all_short = n > 0
            && runs.len() == 1
            && n < self.config_for(runs[0].2).min_len
            && mode != TokenizeMode::Document;
        if all_short {
            let short: String = chars.iter().collect();
            return Ok(TokenizeOutput {
                locations: LocationMap::new(),
                tokenized_end: 0,
                short_word_prefix: Some(short),
                char_offsets: None,
            });
        }
        let mut locations = LocationMap::new();
        for (start, end, block) in runs {
            self.ngram_run(chars, start, end, block, mode, &mut locations)?;
        }
        Ok(TokenizeOutput {
            locations,
            tokenized_end: n,
            short_word_prefix: None,
            char_offsets: None,
        })
    }
}

impl Default for BlockedNgramTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for BlockedNgramTokenizer {
    fn tokenize(&self, text: &str, mode: TokenizeMode) -> Result<TokenizeOutput> {
        let resource = super::normalize::get(self.norm_resource_id).ok_or(
            SearchError::GetNormalizerFail {
                resource_id: self.norm_resource_id,
            },
        )?;
        let normalized = resource.normalize(text);
        let chars: Vec<char> = normalized.chars().collect();
        self.tokenize_inner(&chars, mode)
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
            let out = self.tokenize_inner(&chars, mode)?;
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

    #[test]
    fn classify_splits_ascii_and_han() {
        assert_eq!(CharBlock::classify('a'), CharBlock::Asc);
        assert_eq!(CharBlock::classify('9'), CharBlock::Dig);
        assert_eq!(CharBlock::classify('\u{4E2D}'), CharBlock::Han);
        assert_eq!(CharBlock::classify('\u{30AB}'), CharBlock::Kat);
    }

    #[test]
    fn parse_reads_all_wildcard_and_per_block_overrides() {
        let t = BlockedNgramTokenizer::parse("ALL:2 KAN:1:2 @NORMRSCID:5").unwrap();
        assert_eq!(t.norm_resource_id, 5);
        assert_eq!(t.config_for(CharBlock::Asc).min_len, 2);
        assert_eq!(t.config_for(CharBlock::Kan).min_len, 1);
        assert_eq!(t.config_for(CharBlock::Kan).max_len, 2);
    }

    #[test]
    fn parse_reads_valid_cross_block_pair() {
        let t = BlockedNgramTokenizer::parse("KAT:KAN").unwrap();
        assert!(t.valid_pairs.contains(&(CharBlock::Kat, CharBlock::Kan)));
    }

    #[test]
    fn document_mode_emits_tokens_within_a_run() {
        let t = BlockedNgramTokenizer::parse("ALL:2:3").unwrap();
        let out = t.tokenize("abcd", TokenizeMode::Document).unwrap();
        assert!(out.locations.contains_key("ab"));
        assert!(out.locations.contains_key("abc"));
    }

    #[test]
    fn block_boundary_without_valid_pair_splits_tokens() {
        let t = BlockedNgramTokenizer::parse("ALL:1:4").unwrap();
        let out = t.tokenize("ab12", TokenizeMode::Document).unwrap();
        // ASC run "ab" and DIG run "12" never combine into "b1" spanning both.
        assert!(!out.locations.contains_key("b1"));
    }

    #[test]
    fn invalid_description_is_rejected() {
        assert!(BlockedNgramTokenizer::parse("NOPE:xyz").is_err());
    }
}
