// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The tagged query-node variant and its evaluation protocol.
//!
//! One `enum QueryNode` with a `NodeBase` embedded in every variant (memo
//! window, sort factor, DF estimate) and a single `EvalNode` trait
//! implementing the five-plus-`reevaluate` protocol of the evaluation
//! contract, per the tagged-variant/single-dispatch design used throughout
//! this crate for the polymorphism that the original driver expressed with
//! multiple inheritance. Nodes are `Rc`-shared (`NodeRef`) since the
//! validation pipeline's sharing pass can give one subtree several parents;
//! all per-node mutable state (the memo window, cached postings, score
//! scratch buffers) lives behind `Cell`/`RefCell` so every method takes `&self`.

use crate::error::{Result, SearchError};
use crate::inverted::{DocumentLengthFile, InvertedList};
use crate::location::LocationIterator;
use crate::scoring::{RankedHit, ScoreCalculator, ScoreCombiner};
use crate::types::{
    DocumentFrequency, DocumentId, Location, ModeFlags, Score, TermFrequency,
    TotalDocumentFrequency,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Shared handle to a validated query node.
pub type NodeRef = Rc<QueryNode>;

/// Bulk result of [`EvalNode::retrieve`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    Boolean(Vec<DocumentId>),
    Ranking(Vec<RankedHit>),
}

/// How a Window node counts TF when multiple position pairs qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTfPolicy {
    AllCombinations,
    UniqueByStartPosition,
    NonOverlapping,
}

/// Fields common to every node variant: the memoized `[lower, upper]`
/// window and the statistics the validate pipeline's sort pass consumes.
#[derive(Debug)]
pub struct NodeBase {
    pub lower: Cell<DocumentId>,
    pub upper: Cell<DocumentId>,
    pub estimated_document_frequency: Cell<DocumentFrequency>,
    pub sort_factor: Cell<u64>,
    pub term_length: u32,
    pub total_document_frequency: Cell<TotalDocumentFrequency>,
    pub first_step_status: Cell<bool>,
    pub need_df: Cell<bool>,
}

impl Default for NodeBase {
    fn default() -> Self {
        NodeBase {
            lower: Cell::new(DocumentId::UNDEFINED),
            upper: Cell::new(DocumentId::UNDEFINED),
            estimated_document_frequency: Cell::new(0),
            sort_factor: Cell::new(0),
            term_length: 0,
            total_document_frequency: Cell::new(0),
            first_step_status: Cell::new(false),
            need_df: Cell::new(true),
        }
    }
}

impl NodeBase {
    /// §4.2.2: before any descent, consult the memo window.
    /// `Some(b)` answers the query from the memo; `None` means "must descend".
    fn memo_lookup(&self, d: DocumentId) -> Option<bool> {
        let upper = self.upper.get();
        if d == upper {
            return Some(true);
        }
        if (d < upper || upper.is_sentinel()) && d >= self.lower.get() {
            return Some(false);
        }
        None
    }

    /// Record a successful descent. Skipped in rough mode unless `force`
    /// (short-word OR, per §4.2.5's documented exception).
    fn memo_store_success(&self, g: DocumentId, found: DocumentId, rough: bool, force: bool) {
        if rough && !force {
            return;
        }
        self.lower.set(g);
        self.upper.set(found);
    }

    /// Record a failed descent: nothing `>= g` matches.
    fn memo_store_failure(&self, g: DocumentId, rough: bool, force: bool) {
        if rough && !force {
            return;
        }
        self.lower.set(g);
        self.upper.set(DocumentId::SENTINEL_END);
    }
}

fn base_of(node: &QueryNode) -> &NodeBase {
    match node {
        QueryNode::EmptySet(n) => &n.base,
        QueryNode::SimpleTokenLeaf(n) => &n.base,
        QueryNode::BooleanResultLeaf(n) => &n.base,
        QueryNode::RankingResultLeaf(n) => &n.base,
        QueryNode::And(n) => &n.base,
        QueryNode::Or(n) => &n.base,
        QueryNode::AtomicOr(n) => &n.base,
        QueryNode::Not(n) => &n.base,
        QueryNode::AndNot(n) => &n.base,
        QueryNode::OrderedDistance(n) => &n.base,
        QueryNode::WordOrderedDistance(n) => &n.base,
        QueryNode::Window(n) => &n.base,
        QueryNode::Location(n) => &n.base,
        QueryNode::End(n) => &n.base,
        QueryNode::Word(n) => &n.base,
        QueryNode::Scale(n) => &n.base,
    }
}

// =============================================================================
// VARIANT PAYLOADS
// =============================================================================

#[derive(Debug, Default)]
pub struct EmptySetNode {
    pub base: NodeBase,
}

/// A leaf wrapping one posting-list cursor; the workhorse variant every
/// internal node ultimately bottoms out at.
#[derive(Debug)]
pub struct SimpleTokenLeafNode {
    pub base: NodeBase,
    pub token: String,
    pub has_positions: bool,
    list: RefCell<Box<dyn InvertedList>>,
    calculator: RefCell<Box<dyn ScoreCalculator>>,
    cached: RefCell<Option<(DocumentId, TermFrequency)>>,
    cached_locations: RefCell<Option<Vec<Location>>>,
}

impl SimpleTokenLeafNode {
    pub fn new(
        token: impl Into<String>,
        list: Box<dyn InvertedList>,
        calculator: Box<dyn ScoreCalculator>,
    ) -> Self {
        let has_positions = list.has_positions();
        SimpleTokenLeafNode {
            base: NodeBase::default(),
            token: token.into(),
            has_positions,
            list: RefCell::new(list),
            calculator: RefCell::new(calculator),
            cached: RefCell::new(None),
            cached_locations: RefCell::new(None),
        }
    }

    /// Advance the underlying cursor to the first posting `>= g`, caching
    /// it so a later `reevaluate` at the same document is free.
    fn advance_to(&self, g: DocumentId) -> Option<DocumentId> {
        if let Some((doc, _)) = *self.cached.borrow() {
            if doc >= g && !doc.is_sentinel() {
                return Some(doc);
            }
        }
        let mut list = self.list.borrow_mut();
        match list.lower_bound(g) {
            Some(mut posting) => {
                let locations = drain_locations(&mut *posting.locations);
                *self.cached.borrow_mut() = Some((posting.doc_id, posting.tf));
                *self.cached_locations.borrow_mut() = Some(locations);
                Some(posting.doc_id)
            }
            None => {
                *self.cached.borrow_mut() = None;
                *self.cached_locations.borrow_mut() = None;
                None
            }
        }
    }

    fn document_frequency(&self) -> DocumentFrequency {
        self.list.borrow().document_frequency()
    }
}

/// A precomputed boolean result, ascending by `DocumentId` - used to splice
/// an already-evaluated subquery back into a larger tree.
#[derive(Debug)]
pub struct BooleanResultLeafNode {
    pub base: NodeBase,
    pub docs: Vec<DocumentId>,
}

/// A precomputed ranking result, ascending by `DocumentId` for stepping.
#[derive(Debug)]
pub struct RankingResultLeafNode {
    pub base: NodeBase,
    pub hits: Vec<RankedHit>,
}

#[derive(Debug)]
pub struct AndNode {
    pub base: NodeBase,
    pub children: Vec<NodeRef>,
    pub combiner: Option<RefCell<Box<dyn ScoreCombiner>>>,
    pub score_buffer: RefCell<Vec<Score>>,
}

#[derive(Debug)]
pub struct OrNode {
    pub base: NodeBase,
    pub children: Vec<NodeRef>,
    pub combiner: Option<RefCell<Box<dyn ScoreCombiner>>>,
    pub score_buffer: RefCell<Vec<Score>>,
    /// Non-zero for a short-word OR (§4.2.5): memo window is written even
    /// in rough mode.
    pub short_word_length: u32,
}

/// An OR whose score is one calculator application over the union of all
/// children's positions, not a combiner over per-child scores.
#[derive(Debug)]
pub struct AtomicOrNode {
    pub base: NodeBase,
    pub children: Vec<NodeRef>,
    pub calculator: RefCell<Box<dyn ScoreCalculator>>,
    pub short_word_length: u32,
}

#[derive(Debug)]
pub struct NotNode {
    pub base: NodeBase,
    pub child: NodeRef,
}

#[derive(Debug)]
pub struct AndNotNode {
    pub base: NodeBase,
    pub left: NodeRef,
    pub right: NodeRef,
}

/// `(expected_offset, leaf)` pairs reconstituting one indexed term from its
/// token decomposition; `end_offset`, when present, adds a trailing
/// constraint against document length (the source's `endNode`).
#[derive(Debug)]
pub struct OrderedDistanceNode {
    pub base: NodeBase,
    pub children: Vec<(i64, NodeRef)>,
    pub end_offset: Option<i64>,
    pub term: String,
}

/// Same positional-AND semantics as [`OrderedDistanceNode`] but over word
/// tokens from a Dual index rather than N-gram tokens.
#[derive(Debug)]
pub struct WordOrderedDistanceNode {
    pub base: NodeBase,
    pub children: Vec<(i64, NodeRef)>,
    pub end_offset: Option<i64>,
}

#[derive(Debug)]
pub struct WindowNode {
    pub base: NodeBase,
    pub left: NodeRef,
    pub right: NodeRef,
    pub min_dist: i64,
    pub max_dist: i64,
    pub ordered: bool,
    pub tf_policy: WindowTfPolicy,
}

#[derive(Debug)]
pub struct LocationNode {
    pub base: NodeBase,
    pub child: NodeRef,
    pub k: Location,
}

#[derive(Debug)]
pub struct EndNode {
    pub base: NodeBase,
    pub child: NodeRef,
    pub k: u32,
    pub lengths: Rc<dyn DocumentLengthFile>,
}

/// `Word` matches positions coinciding with a word-boundary marker -
/// `boundary` is the SimpleTokenLeaf over the Dual index's empty-string
/// boundary token.
#[derive(Debug)]
pub struct WordNode {
    pub base: NodeBase,
    pub child: NodeRef,
    pub boundary: NodeRef,
}

#[derive(Debug)]
pub struct ScaleNode {
    pub base: NodeBase,
    pub child: NodeRef,
    pub factor: f64,
}

#[derive(Debug)]
pub enum QueryNode {
    EmptySet(EmptySetNode),
    SimpleTokenLeaf(SimpleTokenLeafNode),
    BooleanResultLeaf(BooleanResultLeafNode),
    RankingResultLeaf(RankingResultLeafNode),
    And(AndNode),
    Or(OrNode),
    AtomicOr(AtomicOrNode),
    Not(NotNode),
    AndNot(AndNotNode),
    OrderedDistance(OrderedDistanceNode),
    WordOrderedDistance(WordOrderedDistanceNode),
    Window(WindowNode),
    Location(LocationNode),
    End(EndNode),
    Word(WordNode),
    Scale(ScaleNode),
}

impl QueryNode {
    pub fn base(&self) -> &NodeBase {
        base_of(self)
    }

    /// Whether this subtree's position information is trustworthy; a
    /// position-less `SimpleTokenLeaf` is the only source of `false`, but it
    /// propagates through every wrapper so `OrderedDistance`/`Window` can
    /// apply the Open-Question #3 fallback.
    pub fn has_positions(&self) -> bool {
        match self {
            QueryNode::SimpleTokenLeaf(n) => n.has_positions,
            QueryNode::Scale(n) => n.child.has_positions(),
            QueryNode::Location(n) => n.child.has_positions(),
            QueryNode::Word(n) => n.child.has_positions(),
            _ => true,
        }
    }
}

// =============================================================================
// EVALUATION PROTOCOL
// =============================================================================

pub trait EvalNode {
    fn evaluate(&self, d: DocumentId, mode: ModeFlags) -> Result<bool>;
    fn lower_bound(&self, g: DocumentId, mode: ModeFlags) -> Result<Option<DocumentId>>;
    fn evaluate_score(&self, d: DocumentId, mode: ModeFlags) -> Result<Option<Score>>;
    fn lower_bound_score(&self, g: DocumentId, mode: ModeFlags) -> Result<Option<(DocumentId, Score)>>;
    fn retrieve(&self, mode: ModeFlags) -> Result<ResultSet>;
    fn reevaluate(
        &self,
        d: DocumentId,
        mode: ModeFlags,
        locations: &mut Option<Vec<Location>>,
        tf: &mut TermFrequency,
    ) -> Result<bool>;
}

/// §4.2.6: start from `g`, repeatedly ask the last-failing child for a new
/// lower bound and re-check all earlier children, converging once every
/// child agrees on one document.
fn and_converge(children: &[NodeRef], g: DocumentId, mode: ModeFlags) -> Result<Option<DocumentId>> {
    if children.is_empty() {
        return Ok(None);
    }
    let rough_mode = mode.with(ModeFlags::ROUGH_EVALUATION);
    let mut candidate = g;
    'outer: loop {
        for child in children {
            match child.lower_bound(candidate, rough_mode)? {
                Some(d) if d == candidate => continue,
                Some(d) => {
                    candidate = d;
                    continue 'outer;
                }
                None => return Ok(None),
            }
        }
        return Ok(Some(candidate));
    }
}

/// §4.2.5: document-at-a-time union - smallest candidate among children
/// that pass rough evaluation.
fn or_min_lower_bound(children: &[NodeRef], g: DocumentId, mode: ModeFlags) -> Result<Option<DocumentId>> {
    let rough_mode = mode.with(ModeFlags::ROUGH_EVALUATION);
    let mut best: Option<DocumentId> = None;
    for child in children {
        if let Some(d) = child.lower_bound(g, rough_mode)? {
            best = Some(match best {
                Some(b) if b <= d => b,
                _ => d,
            });
        }
    }
    Ok(best)
}

/// Generic bulk retrieval: repeatedly call `lower_bound`/`lower_bound_score`
/// from just past the previous result. Works for every variant without a
/// dedicated per-node accumulation pass.
fn generic_retrieve(node: &QueryNode, mode: ModeFlags) -> Result<ResultSet> {
    if mode.is_ranking() {
        let mut hits = Vec::new();
        let mut g = DocumentId::UNDEFINED.next();
        while let Some((d, score)) = node.lower_bound_score(g, mode)? {
            hits.push(RankedHit { doc_id: d, score });
            if d.is_sentinel() {
                break;
            }
            g = d.next();
        }
        Ok(ResultSet::Ranking(crate::scoring::ranking::finalize(hits)))
    } else {
        let mut docs = Vec::new();
        let mut g = DocumentId::UNDEFINED.next();
        while let Some(d) = node.lower_bound(g, mode)? {
            docs.push(d);
            if d.is_sentinel() {
                break;
            }
            g = d.next();
        }
        Ok(ResultSet::Boolean(docs))
    }
}

fn drain_locations(it: &mut dyn LocationIterator) -> Vec<Location> {
    let mut out = Vec::new();
    while !it.is_end() {
        out.push(it.location());
        it.next();
    }
    out
}

impl EvalNode for QueryNode {
    fn evaluate(&self, d: DocumentId, mode: ModeFlags) -> Result<bool> {
        if let Some(b) = self.base().memo_lookup(d) {
            return Ok(b);
        }
        match self {
            QueryNode::EmptySet(_) => Ok(false),
            QueryNode::SimpleTokenLeaf(n) => Ok(n.advance_to(d) == Some(d)),
            QueryNode::BooleanResultLeaf(n) => Ok(n.docs.binary_search(&d).is_ok()),
            QueryNode::RankingResultLeaf(n) => Ok(n.hits.iter().any(|h| h.doc_id == d)),
            QueryNode::And(n) => {
                for child in &n.children {
                    if !child.evaluate(d, mode.with(ModeFlags::ROUGH_EVALUATION))? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            QueryNode::Or(n) => {
                for child in &n.children {
                    if child.evaluate(d, mode)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            QueryNode::AtomicOr(n) => {
                for child in &n.children {
                    if child.evaluate(d, mode)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            QueryNode::Not(n) => Ok(!n.child.evaluate(d, mode)?),
            QueryNode::AndNot(n) => {
                Ok(n.left.evaluate(d, mode.with(ModeFlags::ROUGH_EVALUATION))? && !n.right.evaluate(d, mode)?)
            }
            QueryNode::OrderedDistance(n) => {
                if mode.is_rough() {
                    for (_, child) in &n.children {
                        if !child.evaluate(d, mode)? {
                            return Ok(false);
                        }
                    }
                    return Ok(true);
                }
                let mut locations = None;
                let mut tf = 0;
                self.reevaluate(d, mode, &mut locations, &mut tf)
            }
            QueryNode::WordOrderedDistance(n) => {
                if mode.is_rough() {
                    for (_, child) in &n.children {
                        if !child.evaluate(d, mode)? {
                            return Ok(false);
                        }
                    }
                    return Ok(true);
                }
                let mut locations = None;
                let mut tf = 0;
                self.reevaluate(d, mode, &mut locations, &mut tf)
            }
            QueryNode::Window(n) => {
                if mode.is_rough() {
                    return Ok(n.left.evaluate(d, mode)? && n.right.evaluate(d, mode)?);
                }
                let mut locations = None;
                let mut tf = 0;
                self.reevaluate(d, mode, &mut locations, &mut tf)
            }
            QueryNode::Location(n) => {
                if mode.is_rough() {
                    return n.child.evaluate(d, mode);
                }
                let mut locations = None;
                let mut tf = 0;
                self.reevaluate(d, mode, &mut locations, &mut tf)
            }
            QueryNode::End(n) => {
                if mode.is_rough() {
                    return n.child.evaluate(d, mode);
                }
                let mut locations = None;
                let mut tf = 0;
                self.reevaluate(d, mode, &mut locations, &mut tf)
            }
            QueryNode::Word(n) => {
                if mode.is_rough() {
                    return n.child.evaluate(d, mode);
                }
                let mut locations = None;
                let mut tf = 0;
                self.reevaluate(d, mode, &mut locations, &mut tf)
            }
            QueryNode::Scale(n) => n.child.evaluate(d, mode),
        }
    }

    fn lower_bound(&self, g: DocumentId, mode: ModeFlags) -> Result<Option<DocumentId>> {
        crate::contracts::check_lower_bound_result(g, None);
        match self {
            QueryNode::EmptySet(_) => Ok(None),
            QueryNode::SimpleTokenLeaf(n) => {
                let found = n.advance_to(g);
                match found {
                    Some(d) => {
                        n.base.memo_store_success(g, d, mode.is_rough(), false);
                        Ok(Some(d))
                    }
                    None => {
                        n.base.memo_store_failure(g, mode.is_rough(), false);
                        Ok(None)
                    }
                }
            }
            QueryNode::BooleanResultLeaf(n) => {
                let idx = n.docs.partition_point(|&x| x < g);
                Ok(n.docs.get(idx).copied())
            }
            QueryNode::RankingResultLeaf(n) => {
                Ok(n.hits.iter().map(|h| h.doc_id).find(|&d| d >= g))
            }
            QueryNode::And(n) => {
                let found = and_converge(&n.children, g, mode)?;
                match found {
                    Some(d) => n.base.memo_store_success(g, d, mode.is_rough(), false),
                    None => n.base.memo_store_failure(g, mode.is_rough(), false),
                }
                Ok(found)
            }
            QueryNode::Or(n) => {
                let found = or_min_lower_bound(&n.children, g, mode)?;
                let force = n.short_word_length != 0;
                match found {
                    Some(d) => n.base.memo_store_success(g, d, mode.is_rough(), force),
                    None => n.base.memo_store_failure(g, mode.is_rough(), force),
                }
                Ok(found)
            }
            QueryNode::AtomicOr(n) => {
                let found = or_min_lower_bound(&n.children, g, mode)?;
                let force = n.short_word_length != 0;
                match found {
                    Some(d) => n.base.memo_store_success(g, d, mode.is_rough(), force),
                    None => n.base.memo_store_failure(g, mode.is_rough(), force),
                }
                Ok(found)
            }
            // NOT has no positive scan; it is only meaningful driven by an
            // enclosing AND, which re-checks candidates via `evaluate`.
            QueryNode::Not(_) => Ok(Some(g)),
            QueryNode::AndNot(n) => {
                let mut candidate = g;
                loop {
                    match n.left.lower_bound(candidate, mode.with(ModeFlags::ROUGH_EVALUATION))? {
                        Some(d) => {
                            if n.right.evaluate(d, mode)? {
                                candidate = d.next();
                                if candidate.is_sentinel() && d.is_sentinel() {
                                    return Ok(None);
                                }
                                continue;
                            }
                            n.base.memo_store_success(g, d, mode.is_rough(), false);
                            return Ok(Some(d));
                        }
                        None => {
                            n.base.memo_store_failure(g, mode.is_rough(), false);
                            return Ok(None);
                        }
                    }
                }
            }
            QueryNode::OrderedDistance(n) => {
                let children: Vec<NodeRef> = n.children.iter().map(|(_, c)| c.clone()).collect();
                let mut candidate = g;
                loop {
                    match and_converge(&children, candidate, mode)? {
                        Some(d) => {
                            if mode.is_rough() || self.evaluate(d, mode)? {
                                n.base.memo_store_success(g, d, mode.is_rough(), false);
                                return Ok(Some(d));
                            }
                            candidate = d.next();
                        }
                        None => {
                            n.base.memo_store_failure(g, mode.is_rough(), false);
                            return Ok(None);
                        }
                    }
                }
            }
            QueryNode::WordOrderedDistance(n) => {
                let children: Vec<NodeRef> = n.children.iter().map(|(_, c)| c.clone()).collect();
                let mut candidate = g;
                loop {
                    match and_converge(&children, candidate, mode)? {
                        Some(d) => {
                            if mode.is_rough() || self.evaluate(d, mode)? {
                                n.base.memo_store_success(g, d, mode.is_rough(), false);
                                return Ok(Some(d));
                            }
                            candidate = d.next();
                        }
                        None => {
                            n.base.memo_store_failure(g, mode.is_rough(), false);
                            return Ok(None);
                        }
                    }
                }
            }
            QueryNode::Window(n) => {
                let pair = vec![n.left.clone(), n.right.clone()];
                let mut candidate = g;
                loop {
                    match and_converge(&pair, candidate, mode)? {
                        Some(d) => {
                            if mode.is_rough() || self.evaluate(d, mode)? {
                                n.base.memo_store_success(g, d, mode.is_rough(), false);
                                return Ok(Some(d));
                            }
                            candidate = d.next();
                        }
                        None => {
                            n.base.memo_store_failure(g, mode.is_rough(), false);
                            return Ok(None);
                        }
                    }
                }
            }
            QueryNode::Location(n) => {
                let mut candidate = g;
                loop {
                    match n.child.lower_bound(candidate, mode.with(ModeFlags::ROUGH_EVALUATION))? {
                        Some(d) => {
                            if mode.is_rough() || self.evaluate(d, mode)? {
                                n.base.memo_store_success(g, d, mode.is_rough(), false);
                                return Ok(Some(d));
                            }
                            candidate = d.next();
                        }
                        None => {
                            n.base.memo_store_failure(g, mode.is_rough(), false);
                            return Ok(None);
                        }
                    }
                }
            }
            QueryNode::End(n) => {
                let mut candidate = g;
                loop {
                    match n.child.lower_bound(candidate, mode.with(ModeFlags::ROUGH_EVALUATION))? {
                        Some(d) => {
                            if mode.is_rough() || self.evaluate(d, mode)? {
                                n.base.memo_store_success(g, d, mode.is_rough(), false);
                                return Ok(Some(d));
                            }
                            candidate = d.next();
                        }
                        None => {
                            n.base.memo_store_failure(g, mode.is_rough(), false);
                            return Ok(None);
                        }
                    }
                }
            }
            QueryNode::Word(n) => {
                let mut candidate = g;
                loop {
                    match n.child.lower_bound(candidate, mode.with(ModeFlags::ROUGH_EVALUATION))? {
                        Some(d) => {
                            if mode.is_rough() || self.evaluate(d, mode)? {
                                n.base.memo_store_success(g, d, mode.is_rough(), false);
                                return Ok(Some(d));
                            }
                            candidate = d.next();
                        }
                        None => {
                            n.base.memo_store_failure(g, mode.is_rough(), false);
                            return Ok(None);
                        }
                    }
                }
            }
            QueryNode::Scale(n) => n.child.lower_bound(g, mode),
        }
    }

    fn evaluate_score(&self, d: DocumentId, mode: ModeFlags) -> Result<Option<Score>> {
        if !self.evaluate(d, mode)? {
            return Ok(None);
        }
        let ranking = mode.with(ModeFlags::RANKING_MODE);
        match self {
            QueryNode::SimpleTokenLeaf(n) => {
                let (doc, tf) = n.cached.borrow().ok_or(SearchError::QueryValidateFail {
                    reason: "evaluate_score called before a successful lower_bound".into(),
                })?;
                debug_assert_eq!(doc, d);
                let calc = n.calculator.borrow();
                let (stage1, matched) = calc.first_step(tf, d);
                if !matched {
                    return Ok(None);
                }
                Ok(Some(calc.second_step(
                    n.document_frequency(),
                    stage1,
                    n.base.total_document_frequency.get(),
                )))
            }
            QueryNode::BooleanResultLeaf(_) => Ok(Some(Score(1.0))),
            QueryNode::RankingResultLeaf(n) => {
                Ok(n.hits.iter().find(|h| h.doc_id == d).map(|h| h.score))
            }
            QueryNode::And(n) => {
                let mut buffer = n.score_buffer.borrow_mut();
                buffer.clear();
                for child in &n.children {
                    match child.evaluate_score(d, ranking)? {
                        Some(s) => buffer.push(s),
                        None => return Ok(None),
                    }
                }
                match &n.combiner {
                    Some(c) => Ok(Some(c.borrow().apply(&buffer))),
                    None => Ok(Some(Score(buffer.iter().map(|s| s.get()).sum()))),
                }
            }
            QueryNode::Or(n) => {
                let mut buffer = n.score_buffer.borrow_mut();
                buffer.clear();
                for child in &n.children {
                    if let Some(s) = child.evaluate_score(d, ranking)? {
                        buffer.push(s);
                    }
                }
                if buffer.is_empty() {
                    return Ok(None);
                }
                match &n.combiner {
                    Some(c) => Ok(Some(c.borrow().apply(&buffer))),
                    None => Ok(Some(Score(buffer.iter().map(|s| s.get()).sum()))),
                }
            }
            QueryNode::AtomicOr(n) => {
                let mut locations = None;
                let mut tf = 0;
                if !self.reevaluate(d, mode, &mut locations, &mut tf)? {
                    return Ok(None);
                }
                let calc = n.calculator.borrow();
                let (stage1, matched) = calc.first_step(tf, d);
                if !matched {
                    return Ok(None);
                }
                Ok(Some(calc.second_step(0, stage1, n.base.total_document_frequency.get())))
            }
            QueryNode::Not(_) | QueryNode::AndNot(_) => Ok(Some(Score(1.0))),
            QueryNode::OrderedDistance(_) | QueryNode::WordOrderedDistance(_) | QueryNode::Window(_) => {
                let mut locations = None;
                let mut tf = 0;
                self.reevaluate(d, mode, &mut locations, &mut tf)?;
                Ok(Some(Score(tf as f64)))
            }
            QueryNode::Location(_) | QueryNode::End(_) | QueryNode::Word(_) => Ok(Some(Score(1.0))),
            QueryNode::Scale(n) => Ok(n
                .child
                .evaluate_score(d, mode)?
                .map(|s| Score(s.get() * n.factor))),
            QueryNode::EmptySet(_) => Ok(None),
        }
    }

    fn lower_bound_score(&self, g: DocumentId, mode: ModeFlags) -> Result<Option<(DocumentId, Score)>> {
        let ranking = mode.with(ModeFlags::RANKING_MODE);
        match self.lower_bound(g, ranking)? {
            Some(d) => Ok(self.evaluate_score(d, ranking)?.map(|s| (d, s))),
            None => Ok(None),
        }
    }

    fn retrieve(&self, mode: ModeFlags) -> Result<ResultSet> {
        generic_retrieve(self, mode)
    }

    fn reevaluate(
        &self,
        d: DocumentId,
        mode: ModeFlags,
        locations: &mut Option<Vec<Location>>,
        tf: &mut TermFrequency,
    ) -> Result<bool> {
        match self {
            QueryNode::EmptySet(_) => Ok(false),
            QueryNode::SimpleTokenLeaf(n) => {
                if n.advance_to(d) != Some(d) {
                    return Ok(false);
                }
                let cached_tf = n.cached.borrow().map(|(_, t)| t).unwrap_or(0);
                *tf = cached_tf;
                *locations = n.cached_locations.borrow().clone();
                Ok(true)
            }
            QueryNode::BooleanResultLeaf(n) => {
                *tf = 1;
                Ok(n.docs.binary_search(&d).is_ok())
            }
            QueryNode::RankingResultLeaf(n) => {
                *tf = 1;
                Ok(n.hits.iter().any(|h| h.doc_id == d))
            }
            QueryNode::And(n) => {
                let mut total = 0;
                for child in &n.children {
                    let mut child_locations = None;
                    let mut child_tf = 0;
                    if !child.reevaluate(d, mode, &mut child_locations, &mut child_tf)? {
                        return Ok(false);
                    }
                    total += child_tf;
                }
                *tf = total;
                Ok(true)
            }
            QueryNode::Or(n) => {
                for child in &n.children {
                    let mut child_locations = None;
                    let mut child_tf = 0;
                    if child.reevaluate(d, mode, &mut child_locations, &mut child_tf)? {
                        *tf = child_tf;
                        *locations = child_locations;
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            QueryNode::AtomicOr(n) => reevaluate_atomic_or(n, d, mode, locations, tf),
            QueryNode::Not(n) => {
                let mut child_locations = None;
                let mut child_tf = 0;
                let matched = n.child.reevaluate(d, mode, &mut child_locations, &mut child_tf)?;
                *tf = 1;
                Ok(!matched)
            }
            QueryNode::AndNot(n) => {
                let mut left_locations = None;
                let mut left_tf = 0;
                if !n.left.reevaluate(d, mode, &mut left_locations, &mut left_tf)? {
                    return Ok(false);
                }
                let mut right_locations = None;
                let mut right_tf = 0;
                let right_matched = n.right.reevaluate(d, mode, &mut right_locations, &mut right_tf)?;
                *tf = left_tf;
                *locations = left_locations;
                Ok(!right_matched)
            }
            QueryNode::OrderedDistance(n) => {
                reevaluate_ordered_distance(&n.children, n.end_offset, d, mode, locations, tf)
            }
            QueryNode::WordOrderedDistance(n) => {
                reevaluate_ordered_distance(&n.children, n.end_offset, d, mode, locations, tf)
            }
            QueryNode::Window(n) => reevaluate_window(n, d, mode, locations, tf),
            QueryNode::Location(n) => {
                let mut child_locations = None;
                let mut child_tf = 0;
                if !n.child.reevaluate(d, mode, &mut child_locations, &mut child_tf)? {
                    return Ok(false);
                }
                let positions = child_locations.unwrap_or_default();
                let matching: Vec<Location> = positions.into_iter().filter(|&p| p == n.k).collect();
                *tf = matching.len() as TermFrequency;
                let matched = !matching.is_empty();
                *locations = Some(matching);
                Ok(matched)
            }
            QueryNode::End(n) => {
                let mut child_locations = None;
                let mut child_tf = 0;
                if !n.child.reevaluate(d, mode, &mut child_locations, &mut child_tf)? {
                    return Ok(false);
                }
                let Some(doc_len) = n.lengths.document_length(d) else {
                    return Ok(false);
                };
                let positions = child_locations.unwrap_or_default();
                let matching: Vec<Location> = positions
                    .into_iter()
                    .filter(|p| doc_len.saturating_sub(p.get()) <= n.k)
                    .collect();
                *tf = matching.len() as TermFrequency;
                let matched = !matching.is_empty();
                *locations = Some(matching);
                Ok(matched)
            }
            QueryNode::Word(n) => {
                let mut child_locations = None;
                let mut child_tf = 0;
                if !n.child.reevaluate(d, mode, &mut child_locations, &mut child_tf)? {
                    return Ok(false);
                }
                let mut boundary_locations = None;
                let mut boundary_tf = 0;
                if !n.boundary.reevaluate(d, mode, &mut boundary_locations, &mut boundary_tf)? {
                    return Ok(false);
                }
                let boundary_set: Vec<Location> = boundary_locations.unwrap_or_default();
                let matching: Vec<Location> = child_locations
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|p| boundary_set.contains(p))
                    .collect();
                *tf = matching.len() as TermFrequency;
                let matched = !matching.is_empty();
                *locations = Some(matching);
                Ok(matched)
            }
            QueryNode::Scale(n) => n.child.reevaluate(d, mode, locations, tf),
        }
    }
}

fn reevaluate_atomic_or(
    n: &AtomicOrNode,
    d: DocumentId,
    mode: ModeFlags,
    locations: &mut Option<Vec<Location>>,
    tf: &mut TermFrequency,
) -> Result<bool> {
    let mut per_child: Vec<(Vec<Location>, TermFrequency)> = Vec::new();
    let mut any_matched = false;
    for child in &n.children {
        let mut child_locations = None;
        let mut child_tf = 0;
        if child.reevaluate(d, mode, &mut child_locations, &mut child_tf)? {
            any_matched = true;
            per_child.push((child_locations.unwrap_or_default(), child_tf));
        }
    }
    if !any_matched {
        return Ok(false);
    }
    let has_positions = n.children.iter().all(|c| c.has_positions());
    if !has_positions {
        // Open Question #1: position-less OR falls back to the max of
        // child TFs, a safe upper bound - not the sum.
        *tf = per_child.iter().map(|(_, t)| *t).max().unwrap_or(0);
        *locations = None;
        return Ok(true);
    }
    // Open Question #2: summing child TFs instead of counting the union of
    // positions requires both a short-word OR *and* the caller-selected
    // `CAL_ATOMIC_OR_TF_BY_ADD_CHILD_TF` mode bit - short-word alone is not
    // sufficient (§4.2.5, ModInvertedAtomicOrNode.cpp's `mode &
    // calAtomicOrTfByAddChildTf` check).
    if n.short_word_length != 0 && mode.contains(ModeFlags::CAL_ATOMIC_OR_TF_BY_ADD_CHILD_TF) {
        *tf = per_child.iter().map(|(_, t)| *t).sum();
    } else {
        let mut merged: Vec<Location> = per_child.iter().flat_map(|(locs, _)| locs.iter().copied()).collect();
        merged.sort_unstable();
        merged.dedup();
        *tf = merged.len() as TermFrequency;
        *locations = Some(merged);
    }
    Ok(true)
}

fn reevaluate_ordered_distance(
    children: &[(i64, NodeRef)],
    end_offset: Option<i64>,
    d: DocumentId,
    mode: ModeFlags,
    locations: &mut Option<Vec<Location>>,
    tf: &mut TermFrequency,
) -> Result<bool> {
    if children.is_empty() {
        return Ok(false);
    }
    let mut per_child: Vec<(i64, Vec<Location>, bool)> = Vec::with_capacity(children.len());
    for (offset, child) in children {
        let mut child_locations = None;
        let mut child_tf = 0;
        if !child.reevaluate(d, mode, &mut child_locations, &mut child_tf)? {
            return Ok(false);
        }
        let has_positions = child.has_positions();
        per_child.push((*offset, child_locations.unwrap_or_default(), has_positions));
    }
    // Open Question #3: a position-less child accepts without a position
    // check; TF falls back to that child's own (per-list) TF.
    if let Some((_, _, false)) = per_child.iter().find(|(_, _, has_pos)| !has_pos) {
        *tf = children
            .iter()
            .map(|(_, c)| {
                let mut l = None;
                let mut t = 0;
                let _ = c.reevaluate(d, mode, &mut l, &mut t);
                t
            })
            .max()
            .unwrap_or(1);
        return Ok(true);
    }
    let (first_offset, first_positions, _) = &per_child[0];
    let mut matches = 0u32;
    let mut match_positions = Vec::new();
    for &p in first_positions {
        let start = p.get() as i64 - first_offset;
        let mut all_align = true;
        for (offset, positions, _) in &per_child[1..] {
            let expected = start + offset;
            if expected < 0 || !positions.iter().any(|loc| loc.get() as i64 == expected) {
                all_align = false;
                break;
            }
        }
        if all_align {
            if let Some(end) = end_offset {
                let expected_end = start + end;
                if expected_end < 0 {
                    continue;
                }
            }
            matches += 1;
            match_positions.push(Location(start.max(0) as u32));
        }
    }
    *tf = matches;
    *locations = Some(match_positions);
    Ok(matches > 0)
}

fn reevaluate_window(
    n: &WindowNode,
    d: DocumentId,
    mode: ModeFlags,
    locations: &mut Option<Vec<Location>>,
    tf: &mut TermFrequency,
) -> Result<bool> {
    let mut left_locations = None;
    let mut left_tf = 0;
    if !n.left.reevaluate(d, mode, &mut left_locations, &mut left_tf)? {
        return Ok(false);
    }
    let mut right_locations = None;
    let mut right_tf = 0;
    if !n.right.reevaluate(d, mode, &mut right_locations, &mut right_tf)? {
        return Ok(false);
    }
    let left_positions = left_locations.unwrap_or_default();
    let right_positions = right_locations.unwrap_or_default();

    let mut used_left = vec![false; left_positions.len()];
    let mut used_right = vec![false; right_positions.len()];
    let mut hits: Vec<(Location, Location)> = Vec::new();

    for (li, &p1) in left_positions.iter().enumerate() {
        for (ri, &p2) in right_positions.iter().enumerate() {
            let dist = p2.get() as i64 - p1.get() as i64;
            let in_window = if n.ordered {
                dist >= n.min_dist && dist <= n.max_dist
            } else {
                dist.abs() >= n.min_dist && dist.abs() <= n.max_dist
            };
            if !in_window {
                continue;
            }
            match n.tf_policy {
                WindowTfPolicy::AllCombinations => hits.push((p1, p2)),
                WindowTfPolicy::UniqueByStartPosition => {
                    if !used_left[li] {
                        used_left[li] = true;
                        hits.push((p1, p2));
                    }
                }
                WindowTfPolicy::NonOverlapping => {
                    if !used_left[li] && !used_right[ri] {
                        used_left[li] = true;
                        used_right[ri] = true;
                        hits.push((p1, p2));
                    }
                }
            }
        }
    }
    *tf = hits.len() as TermFrequency;
    *locations = Some(hits.iter().map(|(p1, _)| *p1).collect());
    Ok(!hits.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverted::{InMemoryInvertedFile, ListLookupMode};
    use crate::scoring::calculator::UnitCalculator;

    fn leaf(file: &InMemoryInvertedFile, token: &str) -> NodeRef {
        let list = file.get_inverted_list(token, ListLookupMode::Search).unwrap();
        Rc::new(QueryNode::SimpleTokenLeaf(SimpleTokenLeafNode::new(
            token,
            list,
            Box::new(UnitCalculator),
        )))
    }

    fn boolean_mode() -> ModeFlags {
        ModeFlags::NONE
    }

    #[test]
    fn simple_token_leaf_retrieves_ascending_docs() {
        let file = InMemoryInvertedFile::builder()
            .posting("ab", 1, vec![1], true)
            .posting("ab", 3, vec![2], true)
            .build();
        let node = leaf(&file, "ab");
        match node.retrieve(boolean_mode()).unwrap() {
            ResultSet::Boolean(docs) => assert_eq!(docs, vec![DocumentId(1), DocumentId(3)]),
            _ => panic!("expected boolean result"),
        }
    }

    #[test]
    fn and_node_intersects_children() {
        let file = InMemoryInvertedFile::builder()
            .posting("ab", 1, vec![1], true)
            .posting("ab", 2, vec![1], true)
            .posting("ab", 3, vec![1], true)
            .posting("cd", 2, vec![2], true)
            .posting("cd", 3, vec![2], true)
            .posting("cd", 4, vec![2], true)
            .build();
        let and = Rc::new(QueryNode::And(AndNode {
            base: NodeBase::default(),
            children: vec![leaf(&file, "ab"), leaf(&file, "cd")],
            combiner: None,
            score_buffer: RefCell::new(Vec::new()),
        }));
        match and.retrieve(boolean_mode()).unwrap() {
            ResultSet::Boolean(docs) => assert_eq!(docs, vec![DocumentId(2), DocumentId(3)]),
            _ => panic!("expected boolean result"),
        }
    }

    #[test]
    fn and_not_excludes_right_matches() {
        let file = InMemoryInvertedFile::builder()
            .posting("a", 1, vec![1], true)
            .posting("a", 2, vec![1], true)
            .posting("a", 3, vec![1], true)
            .posting("b", 2, vec![1], true)
            .build();
        let and_not = Rc::new(QueryNode::AndNot(AndNotNode {
            base: NodeBase::default(),
            left: leaf(&file, "a"),
            right: leaf(&file, "b"),
        }));
        match and_not.retrieve(boolean_mode()).unwrap() {
            ResultSet::Boolean(docs) => assert_eq!(docs, vec![DocumentId(1), DocumentId(3)]),
            _ => panic!("expected boolean result"),
        }
    }

    #[test]
    fn ordered_distance_filters_by_position_alignment() {
        let file = InMemoryInvertedFile::builder()
            .posting("ab", 1, vec![1], true)
            .posting("ab", 2, vec![1], true)
            .posting("bc", 1, vec![2], true)
            .posting("bc", 2, vec![2], true)
            .posting("cd", 1, vec![3], true)
            .posting("cd", 2, vec![10], true)
            .build();
        let ordered = Rc::new(QueryNode::OrderedDistance(OrderedDistanceNode {
            base: NodeBase::default(),
            children: vec![
                (1, leaf(&file, "ab")),
                (2, leaf(&file, "bc")),
                (3, leaf(&file, "cd")),
            ],
            end_offset: None,
            term: "abcd".into(),
        }));
        match ordered.retrieve(boolean_mode()).unwrap() {
            ResultSet::Boolean(docs) => assert_eq!(docs, vec![DocumentId(1)]),
            _ => panic!("expected boolean result"),
        }
    }

    #[test]
    fn atomic_or_unions_positions_without_duplicates() {
        let file = InMemoryInvertedFile::builder()
            .posting("ab", 1, vec![1, 4], true)
            .posting("cd", 1, vec![4, 9], true)
            .build();
        let atomic_or = Rc::new(QueryNode::AtomicOr(AtomicOrNode {
            base: NodeBase::default(),
            children: vec![leaf(&file, "ab"), leaf(&file, "cd")],
            calculator: RefCell::new(Box::new(UnitCalculator)),
            short_word_length: 0,
        }));
        let mut locations = None;
        let mut tf = 0;
        assert!(atomic_or
            .reevaluate(DocumentId(1), ModeFlags::NONE, &mut locations, &mut tf)
            .unwrap());
        assert_eq!(tf, 3);
    }

    #[test]
    fn short_word_atomic_or_tf_without_the_flag_counts_union_positions() {
        // Two children each reporting tf=1 over the *same* position must
        // still produce tf=1 (union, not sum) unless the mode bit is set.
        let file = InMemoryInvertedFile::builder()
            .posting("a", 1, vec![1], true)
            .posting("b", 1, vec![1], true)
            .build();
        let atomic_or = Rc::new(QueryNode::AtomicOr(AtomicOrNode {
            base: NodeBase::default(),
            children: vec![leaf(&file, "a"), leaf(&file, "b")],
            calculator: RefCell::new(Box::new(UnitCalculator)),
            short_word_length: 1,
        }));
        let mut locations = None;
        let mut tf = 0;
        assert!(atomic_or
            .reevaluate(DocumentId(1), ModeFlags::NONE, &mut locations, &mut tf)
            .unwrap());
        assert_eq!(tf, 1);
    }

    #[test]
    fn short_word_atomic_or_tf_with_the_flag_sums_child_tf() {
        let file = InMemoryInvertedFile::builder()
            .posting("a", 1, vec![1], true)
            .posting("b", 1, vec![1], true)
            .build();
        let atomic_or = Rc::new(QueryNode::AtomicOr(AtomicOrNode {
            base: NodeBase::default(),
            children: vec![leaf(&file, "a"), leaf(&file, "b")],
            calculator: RefCell::new(Box::new(UnitCalculator)),
            short_word_length: 1,
        }));
        let mut locations = None;
        let mut tf = 0;
        assert!(atomic_or
            .reevaluate(
                DocumentId(1),
                ModeFlags::CAL_ATOMIC_OR_TF_BY_ADD_CHILD_TF,
                &mut locations,
                &mut tf
            )
            .unwrap());
        assert_eq!(tf, 2);
    }

    #[test]
    fn memo_window_skips_redundant_descent() {
        let file = InMemoryInvertedFile::builder()
            .posting("ab", 5, vec![1], true)
            .build();
        let node = leaf(&file, "ab");
        let first = node.lower_bound(DocumentId(1), boolean_mode()).unwrap();
        assert_eq!(first, Some(DocumentId(5)));
        // Repeating the same query must be answered from the memo, not by
        // re-descending the cursor (which is a forward-only iterator).
        let second = node.lower_bound(DocumentId(1), boolean_mode()).unwrap();
        assert_eq!(second, Some(DocumentId(5)));
    }
}
