// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Canonical query string serialization (§6.4), used as the sharing pass's
//! dedup key: two subtrees that serialize identically are semantically
//! interchangeable and can collapse to one [`crate::query::NodeRef`].
//!
//! Grammar: `#and[name](c1,c2,...)`, `#or[name](...)`, `#syn[name](...)` for
//! an [`crate::query::node::AtomicOrNode`], `#not(child)`, and
//! `#term[mode,cname,lang](string)` for a leaf. Combiner/calculator names are
//! folded in so two subtrees that differ only in scoring strategy do not
//! collapse into each other.

use super::node::QueryNode;

/// Build the canonical string for `node`. Two calls on structurally and
/// semantically identical subtrees always produce the same string.
pub fn canonical_string(node: &QueryNode) -> String {
    match node {
        QueryNode::EmptySet(_) => "#empty".to_string(),

        QueryNode::SimpleTokenLeaf(n) => {
            format!("#term[{}](\"{}\")", if n.has_positions { "pos" } else { "nopos" }, escape(&n.token))
        }

        QueryNode::BooleanResultLeaf(n) => {
            format!("#result[bool](#{})", n.docs.len())
        }

        QueryNode::RankingResultLeaf(n) => {
            format!("#result[rank](#{})", n.hits.len())
        }

        QueryNode::And(n) => {
            let name = n.combiner.as_ref().map(|c| c.borrow().name()).unwrap_or("bool");
            join("and", name, n.children.iter().map(|c| canonical_string(c)))
        }

        QueryNode::Or(n) => {
            let name = n.combiner.as_ref().map(|c| c.borrow().name()).unwrap_or("bool");
            join("or", name, n.children.iter().map(|c| canonical_string(c)))
        }

        QueryNode::AtomicOr(n) => {
            let name = n.calculator.borrow().name();
            join("syn", name, n.children.iter().map(|c| canonical_string(c)))
        }

        QueryNode::Not(n) => format!("#not({})", canonical_string(&n.child)),

        QueryNode::AndNot(n) => {
            format!("#andnot({},{})", canonical_string(&n.left), canonical_string(&n.right))
        }

        QueryNode::OrderedDistance(n) => {
            let parts: Vec<String> = n
                .children
                .iter()
                .map(|(offset, child)| format!("{offset}:{}", canonical_string(child)))
                .collect();
            let end = n.end_offset.map(|e| format!(",end={e}")).unwrap_or_default();
            format!("#ordered[\"{}\"{end}]({})", escape(&n.term), parts.join(","))
        }

        QueryNode::WordOrderedDistance(n) => {
            let parts: Vec<String> = n
                .children
                .iter()
                .map(|(offset, child)| format!("{offset}:{}", canonical_string(child)))
                .collect();
            let end = n.end_offset.map(|e| format!(",end={e}")).unwrap_or_default();
            format!("#wordordered[{end}]({})", parts.join(","))
        }

        QueryNode::Window(n) => format!(
            "#window[{},{},{}]({},{})",
            n.min_dist,
            n.max_dist,
            if n.ordered { "ordered" } else { "unordered" },
            canonical_string(&n.left),
            canonical_string(&n.right),
        ),

        QueryNode::Location(n) => format!("#location[{}]({})", n.k.get(), canonical_string(&n.child)),

        QueryNode::End(n) => format!("#end[{}]({})", n.k, canonical_string(&n.child)),

        QueryNode::Word(n) => format!("#word({},{})", canonical_string(&n.child), canonical_string(&n.boundary)),

        QueryNode::Scale(n) => format!("#scale[{}]({})", n.factor, canonical_string(&n.child)),
    }
}

fn join(tag: &str, name: &str, children: impl Iterator<Item = String>) -> String {
    let joined: Vec<String> = children.collect();
    format!("#{tag}[{name}]({})", joined.join(","))
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::node::{AndNode, EmptySetNode, NodeBase, NodeRef};
    use std::rc::Rc;

    #[test]
    fn empty_set_has_fixed_canonical_form() {
        let node = QueryNode::EmptySet(EmptySetNode::default());
        assert_eq!(canonical_string(&node), "#empty");
    }

    #[test]
    fn identical_and_subtrees_serialize_identically() {
        let a: NodeRef = Rc::new(QueryNode::EmptySet(EmptySetNode::default()));
        let b: NodeRef = Rc::new(QueryNode::EmptySet(EmptySetNode::default()));
        let and_a = QueryNode::And(AndNode {
            base: NodeBase::default(),
            children: vec![a],
            combiner: None,
            score_buffer: Default::default(),
        });
        let and_b = QueryNode::And(AndNode {
            base: NodeBase::default(),
            children: vec![b],
            combiner: None,
            score_buffer: Default::default(),
        });
        assert_eq!(canonical_string(&and_a), canonical_string(&and_b));
    }

    // =========================================================================
    // PROPERTY TESTS
    // =========================================================================

    use proptest::prelude::*;

    fn token_strategy() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[a-zA-Z0-9\"\\\\ ]{0,12}").unwrap()
    }

    fn leaf_token(text: &str) -> NodeRef {
        use crate::inverted::{InMemoryInvertedFile, InvertedFile, ListLookupMode};
        let file = InMemoryInvertedFile::builder()
            .posting(text, 1, vec![1], true)
            .build();
        let list = file
            .get_inverted_list(text, ListLookupMode::Search)
            .expect("just inserted this exact token");
        Rc::new(QueryNode::SimpleTokenLeaf(
            crate::query::node::SimpleTokenLeafNode::new(
                text,
                list,
                Box::new(crate::scoring::calculator::UnitCalculator),
            ),
        ))
    }

    /// Un-escapes what [`escape`] produces, so the escaping step can be
    /// checked for round-trip invertibility rather than just "doesn't panic".
    fn unescape(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    proptest! {
        #[test]
        fn leaf_token_escaping_round_trips(text in token_strategy()) {
            let node = leaf_token(&text);
            let QueryNode::SimpleTokenLeaf(_) = &*node else {
                unreachable!("leaf_token always builds a SimpleTokenLeaf");
            };
            let rendered = canonical_string(&node);
            // Pull the quoted payload back out of `#term[pos|nopos]("...")`.
            let start = rendered.find('"').expect("canonical leaf form always quotes its token");
            let end = rendered.rfind('"').expect("canonical leaf form always quotes its token");
            prop_assert!(end > start);
            let escaped_payload = &rendered[start + 1..end];
            prop_assert_eq!(unescape(escaped_payload), text);
        }

        #[test]
        fn canonical_string_is_deterministic_across_rebuilds(depth in 0usize..4, width in 1usize..4) {
            fn build(depth: usize, width: usize) -> QueryNode {
                if depth == 0 {
                    return QueryNode::EmptySet(EmptySetNode::default());
                }
                let children: Vec<NodeRef> = (0..width)
                    .map(|_| Rc::new(build(depth - 1, width)))
                    .collect();
                QueryNode::And(AndNode {
                    base: NodeBase::default(),
                    children,
                    combiner: None,
                    score_buffer: Default::default(),
                })
            }
            let a = build(depth, width);
            let b = build(depth, width);
            prop_assert_eq!(canonical_string(&a), canonical_string(&b));
        }
    }
}
