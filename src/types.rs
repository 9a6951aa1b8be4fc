// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Core value types shared by the inverted list, query tree, and tokenizer.
//!
//! # Invariants
//!
//! - **DocumentId**: 1-origin; `0` is reserved as [`DocumentId::UNDEFINED`] and
//!   [`DocumentId::SENTINEL_END`] marks "past the end of the collection".
//! - **Location**: 1-origin position within a document.
//! - **Token**: `text` and `char_len` can diverge once normalization/stemming
//!   changes character count; map keys compare on `text` only.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::hash::{Hash, Hasher};

// =============================================================================
// NEWTYPES: type-safe identifiers
// =============================================================================

/// Type-safe document identifier, 1-origin.
///
/// Mirrors the `DocId`/`CharOffset` newtype pattern: a thin `u32` wrapper with
/// validated construction plus cheap `From`/`as_usize` escape hatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DocumentId(pub u32);

impl DocumentId {
    /// Reserved value meaning "no document" / not yet positioned.
    pub const UNDEFINED: DocumentId = DocumentId(0);
    /// Reserved sentinel meaning "past the end of the collection".
    pub const SENTINEL_END: DocumentId = DocumentId(u32::MAX);

    #[inline]
    pub fn new(id: u32) -> Self {
        DocumentId(id)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_sentinel(self) -> bool {
        self == Self::SENTINEL_END
    }

    #[inline]
    pub fn next(self) -> DocumentId {
        if self.0 == u32::MAX {
            self
        } else {
            DocumentId(self.0 + 1)
        }
    }
}

impl From<u32> for DocumentId {
    fn from(id: u32) -> Self {
        DocumentId(id)
    }
}

impl From<DocumentId> for usize {
    fn from(id: DocumentId) -> Self {
        id.0 as usize
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-origin position within a document's token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Location(pub u32);

impl Location {
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Location {
    fn from(loc: u32) -> Self {
        Location(loc)
    }
}

/// Number of occurrences of a token (or a composite match) within one document.
pub type TermFrequency = u32;

/// Number of documents containing a token; collection size is `TotalDocumentFrequency`.
pub type DocumentFrequency = u32;
pub type TotalDocumentFrequency = u32;

/// 64-bit ranking score produced by a [`crate::scoring::ScoreCalculator`] and merged
/// by a [`crate::scoring::ScoreCombiner`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Score(pub f64);

impl Score {
    pub const ZERO: Score = Score(0.0);

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl From<f64> for Score {
    fn from(v: f64) -> Self {
        Score(v)
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

// =============================================================================
// TOKEN
// =============================================================================

/// A unicode token plus its character length.
///
/// Normalization and stemming can change the number of characters in a token
/// without changing its canonical `text`, so the two are tracked separately.
/// Any map keyed by `Token` compares and hashes on `text` alone - see the
/// `Borrow<str>` impl below, which lets such maps be looked up by `&str`.
#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub char_len: u32,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let char_len = text.chars().count() as u32;
        Token { text, char_len }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}
impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Platform-fixed maximum index key length, in characters.
///
/// A token that would exceed this after tokenization is rejected with
/// [`crate::error::SearchError::TooLongIndexKey`].
pub const MAX_INDEX_KEY_LEN: usize = 256;

// =============================================================================
// MODE FLAGS
// =============================================================================

/// Bit flags controlling evaluation behavior, passed to every evaluator call.
///
/// Unrecognized bits are ignored by design - this lets future flags be added
/// without breaking callers that construct a `ModeFlags` from a narrower set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeFlags(pub u32);

impl ModeFlags {
    pub const ROUGH_EVALUATION: ModeFlags = ModeFlags(1 << 0);
    pub const RANKING_MODE: ModeFlags = ModeFlags(1 << 1);
    pub const OR_DOCUMENT_AT_A_TIME: ModeFlags = ModeFlags(1 << 2);
    pub const TOKENIZE_QUERY: ModeFlags = ModeFlags(1 << 3);
    pub const SKIP_NORMALIZING: ModeFlags = ModeFlags(1 << 4);
    pub const SKIP_EXPANSION: ModeFlags = ModeFlags(1 << 5);
    pub const GET_TF_BY_MIN_EVALUATION: ModeFlags = ModeFlags(1 << 6);
    pub const GET_DF_BY_MIN_EVALUATION: ModeFlags = ModeFlags(1 << 7);
    pub const GET_DF_BY_ROUGH_EVALUATION: ModeFlags = ModeFlags(1 << 8);
    pub const CAL_ATOMIC_OR_TF_BY_ADD_CHILD_TF: ModeFlags = ModeFlags(1 << 9);

    pub const NONE: ModeFlags = ModeFlags(0);

    #[inline]
    pub fn contains(self, bit: ModeFlags) -> bool {
        self.0 & bit.0 == bit.0
    }

    #[inline]
    pub fn with(self, bit: ModeFlags) -> ModeFlags {
        ModeFlags(self.0 | bit.0)
    }

    #[inline]
    pub fn without(self, bit: ModeFlags) -> ModeFlags {
        ModeFlags(self.0 & !bit.0)
    }

    #[inline]
    pub fn is_rough(self) -> bool {
        self.contains(Self::ROUGH_EVALUATION)
    }

    #[inline]
    pub fn is_ranking(self) -> bool {
        self.contains(Self::RANKING_MODE)
    }
}

impl std::ops::BitOr for ModeFlags {
    type Output = ModeFlags;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.with(rhs)
    }
}
