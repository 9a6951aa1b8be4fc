// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios matching spec.md's numbered §8.4 worked examples.
//!
//! Each test builds a toy three-document character-bigram corpus directly
//! with `InMemoryInvertedFile::builder` (bypassing the tokenizer, since the
//! scenarios specify exact postings) and drives the query tree through the
//! public `QueryNode`/`EvalNode` surface, matching the expected results in
//! the spec verbatim.

use inverted_query::inverted::InMemoryInvertedFile;
use inverted_query::query::node::{
    AndNode, AndNotNode, AtomicOrNode, NodeBase, NodeRef, OrderedDistanceNode, QueryNode,
};
use inverted_query::query::EvalNode;
use inverted_query::scoring::calculator::UnitCalculator;
use inverted_query::types::{DocumentId, ModeFlags};
use inverted_query::ResultSet;
use std::cell::RefCell;
use std::rc::Rc;

fn leaf(file: &InMemoryInvertedFile, token: &str) -> NodeRef {
    use inverted_query::inverted::{InvertedFile, ListLookupMode};
    let list = file
        .get_inverted_list(token, ListLookupMode::Search)
        .unwrap_or_else(|| panic!("token {token:?} missing from toy index"));
    Rc::new(QueryNode::SimpleTokenLeaf(
        inverted_query::query::node::SimpleTokenLeafNode::new(token, list, Box::new(UnitCalculator)),
    ))
}

fn boolean_docs(node: &NodeRef) -> Vec<DocumentId> {
    match node.retrieve(ModeFlags::NONE).unwrap() {
        ResultSet::Boolean(docs) => docs,
        ResultSet::Ranking(hits) => hits.into_iter().map(|h| h.doc_id).collect(),
    }
}

/// Scenario 1: a single term leaf's boolean and ranked retrieval.
///
/// `InvertedList` cursors are forward-only and single-pass, so each full
/// `retrieve` needs its own leaf instance - a second pass over an already
/// exhausted cursor would see nothing, which is the real engine's contract,
/// not a bug to route around.
#[test]
fn scenario_1_single_term_leaf_boolean_and_ranked() {
    let file = InMemoryInvertedFile::builder()
        .posting("ab", 1, vec![1], true)
        .posting("ab", 3, vec![1, 2], true)
        .build();

    assert_eq!(boolean_docs(&leaf(&file, "ab")), vec![DocumentId(1), DocumentId(3)]);

    match leaf(&file, "ab").retrieve(ModeFlags::RANKING_MODE).unwrap() {
        ResultSet::Ranking(hits) => {
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].doc_id, DocumentId(3));
            assert_eq!(hits[0].score.get(), 2.0);
            assert_eq!(hits[1].doc_id, DocumentId(1));
            assert_eq!(hits[1].score.get(), 1.0);
        }
        other => panic!("expected ranking result, got {other:?}"),
    }
}

fn and_of(file: &InMemoryInvertedFile, combiner: Option<RefCell<Box<dyn inverted_query::scoring::ScoreCombiner>>>) -> NodeRef {
    Rc::new(QueryNode::And(AndNode {
        base: NodeBase::default(),
        children: vec![leaf(file, "ab"), leaf(file, "cd")],
        combiner,
        score_buffer: RefCell::new(Vec::new()),
    }))
}

/// Scenario 2: AND of two terms, retrieved set and summed scores.
#[test]
fn scenario_2_and_retrieves_intersection_and_sums_scores() {
    let file = InMemoryInvertedFile::builder()
        .posting("ab", 1, vec![1], true)
        .posting("ab", 2, vec![1], true)
        .posting("ab", 3, vec![1], true)
        .posting("cd", 2, vec![1], true)
        .posting("cd", 3, vec![1], true)
        .posting("cd", 4, vec![1], true)
        .build();

    assert_eq!(boolean_docs(&and_of(&file, None)), vec![DocumentId(2), DocumentId(3)]);

    let ranked = and_of(&file, Some(RefCell::new(Box::new(inverted_query::scoring::combiner::SumCombiner))));
    match ranked.retrieve(ModeFlags::RANKING_MODE).unwrap() {
        ResultSet::Ranking(hits) => {
            assert_eq!(hits.len(), 2);
            for h in &hits {
                assert_eq!(h.score.get(), 2.0); // tf_ab(d) + tf_cd(d) == 1 + 1
            }
        }
        other => panic!("expected ranking result, got {other:?}"),
    }
}

/// Scenario 3: OrderedDistance reconstitutes "abcd" from bigrams at offsets
/// 1,2,3; doc 1's positions align, doc 2's do not (gap between bc@2 and
/// cd@10). The rough AND over the same children would accept both.
#[test]
fn scenario_3_ordered_distance_filters_position_misalignment() {
    let file = InMemoryInvertedFile::builder()
        .posting("ab", 1, vec![1], true)
        .posting("ab", 2, vec![1], true)
        .posting("bc", 1, vec![2], true)
        .posting("bc", 2, vec![2], true)
        .posting("cd", 1, vec![3], true)
        .posting("cd", 2, vec![10], true)
        .build();

    let rough_and = Rc::new(QueryNode::And(AndNode {
        base: NodeBase::default(),
        children: vec![leaf(&file, "ab"), leaf(&file, "bc"), leaf(&file, "cd")],
        combiner: None,
        score_buffer: RefCell::new(Vec::new()),
    }));
    assert_eq!(boolean_docs(&rough_and), vec![DocumentId(1), DocumentId(2)]);

    let ordered = Rc::new(QueryNode::OrderedDistance(OrderedDistanceNode {
        base: NodeBase::default(),
        children: vec![
            (0, leaf(&file, "ab")),
            (1, leaf(&file, "bc")),
            (2, leaf(&file, "cd")),
        ],
        end_offset: None,
        term: "abcd".to_string(),
    }));
    assert_eq!(boolean_docs(&ordered), vec![DocumentId(1)]);
}

/// Scenario 4: short word "a" against a minLen=2 index range-scans
/// `[a, a\u{FFFF})`; only `aa`, `ab`, `ac` fall in range, `ba`/`ca` do not.
#[test]
fn scenario_4_short_word_range_scan_picks_matching_prefix_keys() {
    use inverted_query::inverted::InvertedFile;

    let file = InMemoryInvertedFile::builder()
        .posting("aa", 1, vec![1], true)
        .posting("ab", 1, vec![1], true)
        .posting("ac", 1, vec![1], true)
        .posting("ba", 1, vec![1], true)
        .posting("ca", 1, vec![1], true)
        .build();

    let (from, to) = ("a".to_string(), "a\u{FFFF}".to_string());
    let keys = file.scan_keys(&from, &to);
    assert_eq!(keys, vec!["aa", "ab", "ac"]);

    let atomic_or = Rc::new(QueryNode::AtomicOr(AtomicOrNode {
        base: NodeBase::default(),
        children: keys.iter().map(|k| leaf(&file, k)).collect(),
        calculator: RefCell::new(Box::new(UnitCalculator)),
        short_word_length: 1,
    }));
    assert_eq!(boolean_docs(&atomic_or), vec![DocumentId(1)]);
}

/// Scenario 5: `#or(#term(X), #term(X))` - after validate's sharing pass,
/// both references to the same term resolve to the identical leaf object,
/// and a boolean-mode OR over two pointer-equal children degenerates to
/// that single leaf's own result set.
#[test]
fn scenario_5_or_of_identical_terms_shares_one_leaf() {
    use inverted_query::query::{MatchMode, ParsedNode, TermLeafNode};
    use inverted_query::tokenizer::ngram::NgramTokenizer;
    use inverted_query::validate::{self, ValidateOptions};

    let file = InMemoryInvertedFile::builder()
        .posting("xy", 1, vec![1], true)
        .posting("xy", 2, vec![1], true)
        .build();
    let tokenizer = NgramTokenizer::new(2, 2).unwrap();
    let parsed = ParsedNode::Or(vec![
        ParsedNode::TermLeaf(TermLeafNode::new("xy", MatchMode::StringMode)),
        ParsedNode::TermLeaf(TermLeafNode::new("xy", MatchMode::StringMode)),
    ]);
    let node = validate::validate(&parsed, &file, &tokenizer, &ValidateOptions::default()).unwrap();

    // Sharing collapsed the duplicate term leaf into one object: the Or's
    // "two equal children" case degenerates, during validate's flatten/share
    // passes, to returning that single shared leaf directly rather than a
    // two-child Or wrapping the same `Rc` twice.
    assert!(matches!(*node, QueryNode::SimpleTokenLeaf(_)));
    assert_eq!(boolean_docs(&node), vec![DocumentId(1), DocumentId(2)]);
}

fn and_not_of(file: &InMemoryInvertedFile) -> NodeRef {
    Rc::new(QueryNode::AndNot(AndNotNode {
        base: NodeBase::default(),
        left: leaf(file, "a"),
        right: leaf(file, "b"),
    }))
}

/// Scenario 6: AND-NOT excludes the right side's matches; `lower_bound`
/// past an excluded document sets the memo window so a later `evaluate` at
/// that document is answered without descending.
#[test]
fn scenario_6_and_not_excludes_and_memoizes() {
    let file = InMemoryInvertedFile::builder()
        .posting("a", 1, vec![1], true)
        .posting("a", 2, vec![1], true)
        .posting("a", 3, vec![1], true)
        .posting("b", 2, vec![1], true)
        .build();

    assert_eq!(boolean_docs(&and_not_of(&file)), vec![DocumentId(1), DocumentId(3)]);

    // A fresh tree (fresh, single-pass cursors) for the memoization check
    // itself, which drives `lower_bound` directly rather than through a full
    // `retrieve` pass.
    let and_not = and_not_of(&file);
    let found = and_not
        .lower_bound(DocumentId(2), ModeFlags::NONE)
        .unwrap();
    assert_eq!(found, Some(DocumentId(3)));
    assert_eq!(and_not.base().lower.get(), DocumentId(2));
    assert_eq!(and_not.base().upper.get(), DocumentId(3));

    // Answered from the memo window, not by re-descending the cursor.
    assert!(!and_not.evaluate(DocumentId(2), ModeFlags::NONE).unwrap());
}
