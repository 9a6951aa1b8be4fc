// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The pre-validation query tree (§3.2, §4.3): what a query parser builds
//! and what [`crate::validate::validate`] consumes.
//!
//! [`ParsedNode::TermLeaf`] is the one node [`crate::query::node::QueryNode`]
//! has no equivalent for - validation always replaces it with a precise
//! subtree (a [`crate::query::node::SimpleTokenLeafNode`], an
//! `OrderedDistance` chain, an `AtomicOr`, or an `EmptySet`). Keeping the two
//! trees as distinct types means a `QueryNode` is always "whatever validate
//! produced", never a half-migrated mix of raw and resolved leaves.

/// How a [`TermLeafNode`] should be matched against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Tokenize and match on substrings (the default for N-gram indexes).
    StringMode,
    /// Match a Dual/Word index's whole-word token exactly.
    ExactWordMode,
    /// Match only the word-initial N-gram token.
    WordHeadMode,
    /// Match only the word-final N-gram token.
    WordTailMode,
    /// Match a whole word allowing internal Word-boundary slack.
    SimpleWordMode,
    /// Resolve `StringMode` vs `ExactWordMode` at validate time using
    /// [`crate::tokenizer::normalize::is_cjk_like`] (§9 Open Question #4).
    MultiLanguageMode,
}

/// One unvalidated term, as written by a query's author (or parser).
#[derive(Debug, Clone)]
pub struct TermLeafNode {
    pub term: String,
    pub match_mode: MatchMode,
    /// Restricts matching documents tagged with a language outside this set;
    /// empty means "no restriction".
    pub languages: Vec<String>,
}

impl TermLeafNode {
    pub fn new(term: impl Into<String>, match_mode: MatchMode) -> Self {
        TermLeafNode {
            term: term.into(),
            match_mode,
            languages: Vec::new(),
        }
    }
}

/// The tree a query parser produces, before [`crate::validate::validate`]
/// rewrites it into a [`crate::query::node::QueryNode`].
#[derive(Debug, Clone)]
pub enum ParsedNode {
    TermLeaf(TermLeafNode),
    And(Vec<ParsedNode>),
    Or(Vec<ParsedNode>),
    Not(Box<ParsedNode>),
    AndNot(Box<ParsedNode>, Box<ParsedNode>),
    Window {
        left: Box<ParsedNode>,
        right: Box<ParsedNode>,
        min_dist: i64,
        max_dist: i64,
        ordered: bool,
    },
    /// Restrict matches to at or after 1-origin location `k`.
    Location { child: Box<ParsedNode>, k: u32 },
    /// Restrict matches to Word-boundary-aligned positions.
    Word(Box<ParsedNode>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_leaf_defaults_to_no_language_restriction() {
        let leaf = TermLeafNode::new("cats", MatchMode::StringMode);
        assert!(leaf.languages.is_empty());
    }
}
