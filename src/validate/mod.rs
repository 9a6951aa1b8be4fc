// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The query validation & rewrite pipeline (§4.3): turns a
//! [`crate::query::ParsedNode`] into an evaluable [`crate::query::NodeRef`].
//!
//! Runs, conceptually, in the order the spec lists them, though several
//! collapse into one pass here since they operate over the same recursive
//! descent:
//!
//! 1. **Term leaf expansion** - tokenize each [`TermLeafNode`] via
//!    [`Tokenizer::tokenize_multi`], one alternate target per
//!    normalization/expansion result.
//! 2. **Best-path selection** - a shortest-path DP over each target's
//!    `(offset, token)` positions, weighted by document frequency, picking
//!    the index-token decomposition with the smallest total DF.
//! 3. **Rough-node construction / EraseTermLeafNode** - single-token matches
//!    become one [`SimpleTokenLeafNode`]; multi-token matches become an
//!    [`OrderedDistanceNode`] chain. A token absent from the index collapses
//!    its term leaf straight to [`QueryNode::EmptySet`], which then
//!    propagates: an AND containing it becomes EmptySet, an OR drops it.
//! 4. **Flatten** - nested And/Or of the same kind collapse into one node
//!    during construction rather than as a separate rewrite over an already
//!    built tree.
//! 5. **Share** - a canonical-string-keyed map (see [`crate::query::canon`])
//!    deduplicates identical subtrees built anywhere in this validation call.
//! 6. **Sort** - children are ordered by ascending estimated document
//!    frequency before being stored, except inside a ranking AND whose
//!    combiner is non-commutative (§9, `WeightedCombiner`).
//! 7. **Reserve score buffers** - `AndNode`/`OrNode` already default their
//!    `score_buffer` to an empty `Vec`; no separate allocation pass is
//!    needed in this representation.

use crate::error::Result;
use crate::inverted::{InvertedFile, ListLookupMode};
use crate::query::node::{
    AndNode, AndNotNode, AtomicOrNode, EmptySetNode, LocationNode, NodeBase, NodeRef,
    OrNode, OrderedDistanceNode, QueryNode, SimpleTokenLeafNode, WindowNode, WindowTfPolicy,
    WordNode,
};
use crate::query::{canon, MatchMode, ParsedNode, TermLeafNode};
use crate::scoring::calculator;
use crate::tokenizer::{normalize, Tokenizer, TokenizeMode};
use crate::types::{DocumentFrequency, ModeFlags};
use std::collections::HashMap;
use std::rc::Rc;

/// Names the leaf/combiner scoring strategy every validated subtree is built
/// with. A real deployment would thread this through from the query's own
/// configuration; tests and the CLI demo pass one in directly.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub calculator_name: String,
    pub combiner_name: String,
    pub mode: ModeFlags,
    /// Collapse nested Or children into their parent only up to this many
    /// total children (§4.3 "Flatten", `orFlattenThreshold`).
    pub or_flatten_threshold: usize,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        ValidateOptions {
            calculator_name: "unit".to_string(),
            combiner_name: "sum".to_string(),
            mode: ModeFlags::NONE,
            or_flatten_threshold: 64,
        }
    }
}

struct Ctx<'a> {
    file: &'a dyn InvertedFile,
    tokenizer: &'a dyn Tokenizer,
    options: &'a ValidateOptions,
    shared: HashMap<String, NodeRef>,
}

/// Validate `root` against `file`'s index, producing an evaluable tree.
pub fn validate(
    root: &ParsedNode,
    file: &dyn InvertedFile,
    tokenizer: &dyn Tokenizer,
    options: &ValidateOptions,
) -> Result<NodeRef> {
    let mut ctx = Ctx {
        file,
        tokenizer,
        options,
        shared: HashMap::new(),
    };
    validate_node(&mut ctx, root)
}

fn share(ctx: &mut Ctx, node: QueryNode) -> NodeRef {
    let key = canon::canonical_string(&node);
    if let Some(existing) = ctx.shared.get(&key) {
        return Rc::clone(existing);
    }
    let rc = Rc::new(node);
    ctx.shared.insert(key, Rc::clone(&rc));
    rc
}

fn empty_set(ctx: &mut Ctx) -> NodeRef {
    share(ctx, QueryNode::EmptySet(EmptySetNode::default()))
}

fn is_empty(node: &NodeRef) -> bool {
    matches!(**node, QueryNode::EmptySet(_))
}

fn estimated_df(node: &NodeRef) -> DocumentFrequency {
    node.base().estimated_document_frequency.get()
}

fn validate_node(ctx: &mut Ctx, parsed: &ParsedNode) -> Result<NodeRef> {
    match parsed {
        ParsedNode::TermLeaf(leaf) => validate_term_leaf(ctx, leaf),

        ParsedNode::And(children) => {
            let mut flat = Vec::with_capacity(children.len());
            for child in children {
                let node = validate_node(ctx, child)?;
                if is_empty(&node) {
                    return Ok(empty_set(ctx));
                }
                match &*node {
                    QueryNode::And(and) if and.combiner.is_none() => {
                        flat.extend(and.children.iter().cloned())
                    }
                    _ => flat.push(node),
                }
            }
            if flat.is_empty() {
                return Ok(empty_set(ctx));
            }
            if flat.len() == 1 {
                return Ok(flat.into_iter().next().unwrap());
            }
            flat.sort_by_key(estimated_df);
            Ok(share(
                ctx,
                QueryNode::And(AndNode {
                    base: NodeBase::default(),
                    children: flat,
                    combiner: None,
                    score_buffer: Default::default(),
                }),
            ))
        }

        ParsedNode::Or(children) => {
            let mut flat = Vec::with_capacity(children.len());
            for child in children {
                let node = validate_node(ctx, child)?;
                if is_empty(&node) {
                    continue;
                }
                match &*node {
                    QueryNode::Or(or) if or.combiner.is_none() && or.short_word_length == 0 => {
                        flat.extend(or.children.iter().cloned())
                    }
                    _ => flat.push(node),
                }
                if flat.len() > ctx.options.or_flatten_threshold {
                    break;
                }
            }
            if flat.is_empty() {
                return Ok(empty_set(ctx));
            }
            // §4.3 step 6: local dedup by pointer identity, only in boolean
            // mode - in ranking mode a repeated child must still contribute
            // its score to the combiner each time it appears.
            if !ctx.options.mode.is_ranking() {
                let mut deduped: Vec<NodeRef> = Vec::with_capacity(flat.len());
                for node in flat {
                    if !deduped.iter().any(|existing| Rc::ptr_eq(existing, &node)) {
                        deduped.push(node);
                    }
                }
                flat = deduped;
            }
            if flat.len() == 1 {
                return Ok(flat.into_iter().next().unwrap());
            }
            flat.sort_by_key(estimated_df);
            Ok(share(
                ctx,
                QueryNode::Or(OrNode {
                    base: NodeBase::default(),
                    children: flat,
                    combiner: None,
                    score_buffer: Default::default(),
                    short_word_length: 0,
                }),
            ))
        }

        ParsedNode::Not(child) => {
            let inner = validate_node(ctx, child)?;
            if is_empty(&inner) {
                return Ok(empty_set(ctx));
            }
            Ok(share(
                ctx,
                QueryNode::Not(crate::query::node::NotNode {
                    base: NodeBase::default(),
                    child: inner,
                }),
            ))
        }

        ParsedNode::AndNot(left, right) => {
            let l = validate_node(ctx, left)?;
            if is_empty(&l) {
                return Ok(empty_set(ctx));
            }
            let r = validate_node(ctx, right)?;
            if is_empty(&r) {
                return Ok(l);
            }
            Ok(share(
                ctx,
                QueryNode::AndNot(AndNotNode {
                    base: NodeBase::default(),
                    left: l,
                    right: r,
                }),
            ))
        }

        ParsedNode::Window {
            left,
            right,
            min_dist,
            max_dist,
            ordered,
        } => {
            let l = validate_node(ctx, left)?;
            let r = validate_node(ctx, right)?;
            if is_empty(&l) || is_empty(&r) {
                return Ok(empty_set(ctx));
            }
            Ok(share(
                ctx,
                QueryNode::Window(WindowNode {
                    base: NodeBase::default(),
                    left: l,
                    right: r,
                    min_dist: *min_dist,
                    max_dist: *max_dist,
                    ordered: *ordered,
                    tf_policy: WindowTfPolicy::AllCombinations,
                }),
            ))
        }

        ParsedNode::Location { child, k } => {
            let inner = validate_node(ctx, child)?;
            if is_empty(&inner) {
                return Ok(empty_set(ctx));
            }
            Ok(share(
                ctx,
                QueryNode::Location(LocationNode {
                    base: NodeBase::default(),
                    child: inner,
                    k: crate::types::Location(*k),
                }),
            ))
        }

        ParsedNode::Word(child) => {
            let inner = validate_node(ctx, child)?;
            if is_empty(&inner) {
                return Ok(empty_set(ctx));
            }
            let boundary = leaf_for_token(ctx, "", 1)?;
            Ok(share(
                ctx,
                QueryNode::Word(WordNode {
                    base: NodeBase::default(),
                    child: inner,
                    boundary,
                }),
            ))
        }
    }
}

fn resolved_mode(leaf: &TermLeafNode) -> MatchMode {
    if leaf.match_mode == MatchMode::MultiLanguageMode {
        if normalize::is_cjk_like(&leaf.term) {
            MatchMode::StringMode
        } else {
            MatchMode::ExactWordMode
        }
    } else {
        leaf.match_mode
    }
}

fn validate_term_leaf(ctx: &mut Ctx, leaf: &TermLeafNode) -> Result<NodeRef> {
    let mode = resolved_mode(leaf);
    let tokenize_mode = TokenizeMode::Query;

    if mode == MatchMode::ExactWordMode || mode == MatchMode::SimpleWordMode {
        return leaf_for_token(ctx, &leaf.term, 1);
    }

    let results = ctx.tokenizer.tokenize_multi(&leaf.term, tokenize_mode)?;
    let mut alternates = Vec::with_capacity(results.len());
    for result in results {
        if let Some(prefix) = &result.short_word_prefix {
            alternates.push(validate_short_word(ctx, prefix)?);
            continue;
        }
        match select_rough_tokens(
            ctx.file,
            result
                .locations
                .iter()
                .map(|(t, locs)| (t.text.as_str(), t.char_len as usize, locs.as_slice())),
        ) {
            Some(path) if path.len() == 1 => {
                alternates.push(leaf_for_token(ctx, &path[0].1, 1)?);
            }
            Some(path) => {
                let first_offset = path[0].0;
                let mut children = Vec::with_capacity(path.len());
                for (offset, token) in &path {
                    let child = leaf_for_token(ctx, token, 1)?;
                    children.push(((*offset - first_offset) as i64, child));
                }
                alternates.push(share(
                    ctx,
                    QueryNode::OrderedDistance(OrderedDistanceNode {
                        base: NodeBase::default(),
                        children,
                        end_offset: None,
                        term: result.target.clone(),
                    }),
                ));
            }
            None => alternates.push(empty_set(ctx)),
        }
    }

    alternates.retain(|n| !is_empty(n));
    if alternates.is_empty() {
        return Ok(empty_set(ctx));
    }
    if alternates.len() == 1 {
        return Ok(alternates.into_iter().next().unwrap());
    }
    let calc_name = ctx.options.calculator_name.clone();
    Ok(share(
        ctx,
        QueryNode::AtomicOr(AtomicOrNode {
            base: NodeBase::default(),
            children: alternates,
            calculator: std::cell::RefCell::new(
                calculator::create(&calc_name).unwrap_or_else(|| Box::new(calculator::UnitCalculator)),
            ),
            short_word_length: 0,
        }),
    ))
}

/// Range-scan `[prefix, prefix + 0xFFFF)` and OR the matching keys together,
/// per §4.1's short-word contract - this is the one case where validate
/// deliberately forgoes a precise `OrderedDistance` reconstruction.
fn validate_short_word(ctx: &mut Ctx, prefix: &str) -> Result<NodeRef> {
    let (from, to) = crate::tokenizer::short_word_range(prefix);
    let keys = ctx.file.scan_keys(&from, &to);
    if keys.is_empty() {
        return Ok(empty_set(ctx));
    }
    let mut children = Vec::with_capacity(keys.len());
    for key in &keys {
        children.push(leaf_for_token(ctx, key, prefix.chars().count() as u32)?);
    }
    if children.len() == 1 {
        return Ok(children.into_iter().next().unwrap());
    }
    let calc_name = ctx.options.calculator_name.clone();
    Ok(share(
        ctx,
        QueryNode::AtomicOr(AtomicOrNode {
            base: NodeBase::default(),
            children,
            calculator: std::cell::RefCell::new(
                calculator::create(&calc_name).unwrap_or_else(|| Box::new(calculator::UnitCalculator)),
            ),
            short_word_length: prefix.chars().count() as u32,
        }),
    ))
}

fn leaf_for_token(ctx: &mut Ctx, token: &str, term_length: u32) -> Result<NodeRef> {
    let list = match ctx.file.get_inverted_list(token, ListLookupMode::Search) {
        Some(list) => list,
        None => return Ok(empty_set(ctx)),
    };
    let df = list.document_frequency();
    let mut calc = calculator::create(&ctx.options.calculator_name)
        .unwrap_or_else(|| Box::new(calculator::UnitCalculator));
    calc.prepare(ctx.file.get_total_document_frequency(), df);
    calc.set_average_document_length(ctx.file.get_document_length_file().average_document_length());

    let mut node = SimpleTokenLeafNode::new(token, list, calc);
    node.base.estimated_document_frequency.set(df);
    node.base.term_length = term_length;
    Ok(share(ctx, QueryNode::SimpleTokenLeaf(node)))
}

/// Shortest-path DP over `(token, char_len, locations)` triples, weighted by
/// each candidate token's document frequency: picks the decomposition of
/// the tokenized term with the smallest total DF, per §3.2's "pick best
/// index-token paths".
fn select_rough_tokens<'a>(
    file: &dyn InvertedFile,
    tokens: impl Iterator<Item = (&'a str, usize, &'a [crate::types::Location])>,
) -> Option<Vec<(usize, String)>> {
    #[derive(Clone)]
    struct Edge {
        cost: u64,
        prev: usize,
        token: String,
    }

    let mut edges: Vec<(usize, usize, &str)> = Vec::new();
    let mut max_end = 0usize;
    let mut dfs: HashMap<&str, u64> = HashMap::new();
    let tokens: Vec<_> = tokens.collect();
    for (text, char_len, locs) in &tokens {
        // Weight each candidate token by its document frequency, so the DP
        // below prefers the decomposition with the smallest total DF - a
        // rarer (more selective) token set narrows the rough scan faster.
        dfs.entry(text)
            .or_insert_with(|| file.get_document_frequency(text).max(1) as u64);
        for loc in locs.iter() {
            let start = loc.as_usize() - 1;
            let end = start + char_len;
            edges.push((start, end, text));
            max_end = max_end.max(end);
        }
    }
    if edges.is_empty() {
        return None;
    }

    let n = max_end;
    let mut best: Vec<Option<Edge>> = vec![None; n + 1];
    best[0] = Some(Edge {
        cost: 0,
        prev: 0,
        token: String::new(),
    });
    for start in 0..=n {
        let Some(cur) = best[start].clone() else { continue };
        for (s, e, text) in &edges {
            if *s != start {
                continue;
            }
            let weight = *dfs.get(text).unwrap_or(&1);
            let candidate_cost = cur.cost + weight;
            let better = match &best[*e] {
                None => true,
                Some(existing) => candidate_cost < existing.cost,
            };
            if better {
                best[*e] = Some(Edge {
                    cost: candidate_cost,
                    prev: start,
                    token: text.to_string(),
                });
            }
        }
    }

    best[n].as_ref()?;
    let mut path = Vec::new();
    let mut at = n;
    while at != 0 {
        let edge = best[at].clone()?;
        path.push((edge.prev, edge.token.clone()));
        at = edge.prev;
    }
    path.reverse();
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverted::InMemoryInvertedFile;
    use crate::query::TermLeafNode;
    use crate::tokenizer::ngram::NgramTokenizer;

    fn build_file() -> InMemoryInvertedFile {
        InMemoryInvertedFile::builder()
            .posting("da", 1, vec![1], true)
            .posting("at", 1, vec![2], true)
            .posting("ta", 1, vec![3], true)
            .posting("da", 2, vec![1], true)
            .document_length(1, 2)
            .document_length(2, 2)
            .build()
    }

    #[test]
    fn single_ngram_token_becomes_a_simple_leaf() {
        let file = build_file();
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let options = ValidateOptions::default();
        let parsed = ParsedNode::TermLeaf(TermLeafNode::new("da", MatchMode::StringMode));
        let node = validate(&parsed, &file, &tokenizer, &options).unwrap();
        assert!(matches!(*node, QueryNode::SimpleTokenLeaf(_) | QueryNode::OrderedDistance(_)));
    }

    #[test]
    fn unknown_token_collapses_to_empty_set() {
        let file = build_file();
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let options = ValidateOptions::default();
        let parsed = ParsedNode::TermLeaf(TermLeafNode::new("zz", MatchMode::StringMode));
        let node = validate(&parsed, &file, &tokenizer, &options).unwrap();
        assert!(matches!(*node, QueryNode::EmptySet(_)));
    }

    #[test]
    fn and_with_empty_child_collapses_whole_node() {
        let file = build_file();
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let options = ValidateOptions::default();
        let parsed = ParsedNode::And(vec![
            ParsedNode::TermLeaf(TermLeafNode::new("da", MatchMode::StringMode)),
            ParsedNode::TermLeaf(TermLeafNode::new("zz", MatchMode::StringMode)),
        ]);
        let node = validate(&parsed, &file, &tokenizer, &options).unwrap();
        assert!(matches!(*node, QueryNode::EmptySet(_)));
    }

    #[test]
    fn or_drops_empty_children_and_keeps_the_rest() {
        let file = build_file();
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let options = ValidateOptions::default();
        let parsed = ParsedNode::Or(vec![
            ParsedNode::TermLeaf(TermLeafNode::new("da", MatchMode::StringMode)),
            ParsedNode::TermLeaf(TermLeafNode::new("zz", MatchMode::StringMode)),
        ]);
        let node = validate(&parsed, &file, &tokenizer, &options).unwrap();
        assert!(!matches!(*node, QueryNode::EmptySet(_)));
    }

    #[test]
    fn identical_term_leaves_share_one_node() {
        let file = build_file();
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let options = ValidateOptions::default();
        let parsed = ParsedNode::And(vec![
            ParsedNode::TermLeaf(TermLeafNode::new("da", MatchMode::StringMode)),
            ParsedNode::TermLeaf(TermLeafNode::new("da", MatchMode::StringMode)),
        ]);
        let node = validate(&parsed, &file, &tokenizer, &options).unwrap();
        if let QueryNode::And(and) = &*node {
            assert!(Rc::ptr_eq(&and.children[0], &and.children[1]));
        }
    }

    #[test]
    fn or_of_identical_terms_collapses_to_one_leaf_in_boolean_mode() {
        let file = build_file();
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let options = ValidateOptions::default();
        let parsed = ParsedNode::Or(vec![
            ParsedNode::TermLeaf(TermLeafNode::new("da", MatchMode::StringMode)),
            ParsedNode::TermLeaf(TermLeafNode::new("da", MatchMode::StringMode)),
        ]);
        let node = validate(&parsed, &file, &tokenizer, &options).unwrap();
        assert!(matches!(*node, QueryNode::SimpleTokenLeaf(_) | QueryNode::OrderedDistance(_)));
    }

    #[test]
    fn or_of_identical_terms_keeps_both_in_ranking_mode() {
        let file = build_file();
        let tokenizer = NgramTokenizer::new(2, 2).unwrap();
        let options = ValidateOptions {
            mode: ModeFlags::RANKING_MODE,
            ..ValidateOptions::default()
        };
        let parsed = ParsedNode::Or(vec![
            ParsedNode::TermLeaf(TermLeafNode::new("da", MatchMode::StringMode)),
            ParsedNode::TermLeaf(TermLeafNode::new("da", MatchMode::StringMode)),
        ]);
        let node = validate(&parsed, &file, &tokenizer, &options).unwrap();
        if let QueryNode::Or(or) = &*node {
            assert_eq!(or.children.len(), 2);
            assert!(Rc::ptr_eq(&or.children[0], &or.children[1]));
        } else {
            panic!("expected Or, got {node:?}");
        }
    }

    // =========================================================================
    // PROPERTY TESTS
    // =========================================================================

    use proptest::prelude::*;

    /// A handful of known tokens (present in [`build_file`]) plus one unknown
    /// one, so generated trees exercise both the ordinary rewrite path and
    /// `EmptySet` propagation.
    fn term_strategy() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["da", "at", "ta", "zz"])
    }

    fn and_leaves(terms: &[&'static str]) -> ParsedNode {
        ParsedNode::And(
            terms
                .iter()
                .map(|t| ParsedNode::TermLeaf(TermLeafNode::new(*t, MatchMode::StringMode)))
                .collect(),
        )
    }

    proptest! {
        #[test]
        fn validating_the_same_tree_twice_is_deterministic(
            terms in proptest::collection::vec(term_strategy(), 1..5),
        ) {
            let file = build_file();
            let tokenizer = NgramTokenizer::new(2, 2).unwrap();
            let options = ValidateOptions::default();
            let parsed = and_leaves(&terms);

            let a = validate(&parsed, &file, &tokenizer, &options).unwrap();
            let b = validate(&parsed, &file, &tokenizer, &options).unwrap();
            prop_assert_eq!(canon::canonical_string(&a), canon::canonical_string(&b));
        }

        /// Flatten (§4.3 step 4) must be order-preserving up to nesting: an
        /// `And` built from a nested `And` of the same leaves, in the same
        /// left-to-right order, validates to the same canonical string as the
        /// already-flat `And` over those leaves.
        #[test]
        fn nested_and_flattens_to_the_same_tree_as_the_flat_form(
            a in term_strategy(), b in term_strategy(), c in term_strategy(),
        ) {
            let file = build_file();
            let tokenizer = NgramTokenizer::new(2, 2).unwrap();
            let options = ValidateOptions::default();

            let nested = ParsedNode::And(vec![
                and_leaves(&[a, b]),
                ParsedNode::TermLeaf(TermLeafNode::new(c, MatchMode::StringMode)),
            ]);
            let flat = and_leaves(&[a, b, c]);

            let nested_node = validate(&nested, &file, &tokenizer, &options).unwrap();
            let flat_node = validate(&flat, &file, &tokenizer, &options).unwrap();
            prop_assert_eq!(
                canon::canonical_string(&nested_node),
                canon::canonical_string(&flat_node)
            );
        }
    }
}
