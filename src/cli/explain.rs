// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Pretty-printing a validated query tree for `invq explain`.
//!
//! A thin presentation layer over [`crate::query::node::QueryNode`] - no
//! evaluation happens here, just a recursive walk that labels each variant
//! with [`super::display::node_kind_badge`] and the fields a human
//! debugging a validated tree actually wants to see (combiner/calculator
//! names, DF estimates, ordered-distance offsets).

use crate::query::node::QueryNode;
use super::display::{document_frequency_value, node_kind_badge, styled, BOLD, DIM};

pub fn print_tree(node: &QueryNode, depth: usize, total_df: u32) {
    let indent = "  ".repeat(depth);
    let df = node.base().estimated_document_frequency.get();
    let df_str = document_frequency_value(df, total_df);

    match node {
        QueryNode::EmptySet(_) => {
            println!("{indent}{} (no matches)", node_kind_badge("EmptySet"));
        }
        QueryNode::SimpleTokenLeaf(n) => {
            println!(
                "{indent}{} \"{}\" df={} positions={}",
                node_kind_badge("SimpleTokenLeaf"),
                styled(&[BOLD], &n.token),
                df_str,
                n.has_positions,
            );
        }
        QueryNode::BooleanResultLeaf(n) => {
            println!("{indent}{} ({} docs)", node_kind_badge("BooleanResultLeaf"), n.docs.len());
        }
        QueryNode::RankingResultLeaf(n) => {
            println!("{indent}{} ({} hits)", node_kind_badge("RankingResultLeaf"), n.hits.len());
        }
        QueryNode::And(n) => {
            let combiner = n.combiner.as_ref().map(|c| c.borrow().name().to_string());
            println!(
                "{indent}{} combiner={} df={}",
                node_kind_badge("And"),
                styled(&[DIM], combiner.as_deref().unwrap_or("bool")),
                df_str,
            );
            for child in &n.children {
                print_tree(child, depth + 1, total_df);
            }
        }
        QueryNode::Or(n) => {
            let combiner = n.combiner.as_ref().map(|c| c.borrow().name().to_string());
            println!(
                "{indent}{} combiner={} short_word={} df={}",
                node_kind_badge("Or"),
                styled(&[DIM], combiner.as_deref().unwrap_or("bool")),
                n.short_word_length,
                df_str,
            );
            for child in &n.children {
                print_tree(child, depth + 1, total_df);
            }
        }
        QueryNode::AtomicOr(n) => {
            println!(
                "{indent}{} calculator={} short_word={} df={}",
                node_kind_badge("AtomicOr"),
                styled(&[DIM], n.calculator.borrow().name()),
                n.short_word_length,
                df_str,
            );
            for child in &n.children {
                print_tree(child, depth + 1, total_df);
            }
        }
        QueryNode::Not(n) => {
            println!("{indent}{}", node_kind_badge("Not"));
            print_tree(&n.child, depth + 1, total_df);
        }
        QueryNode::AndNot(n) => {
            println!("{indent}{}", node_kind_badge("AndNot"));
            print_tree(&n.left, depth + 1, total_df);
            print_tree(&n.right, depth + 1, total_df);
        }
        QueryNode::OrderedDistance(n) => {
            println!(
                "{indent}{} term=\"{}\" end_offset={:?} df={}",
                node_kind_badge("OrderedDistance"),
                styled(&[BOLD], &n.term),
                n.end_offset,
                df_str,
            );
            for (offset, child) in &n.children {
                println!("{indent}  @{offset}:");
                print_tree(child, depth + 2, total_df);
            }
        }
        QueryNode::WordOrderedDistance(n) => {
            println!("{indent}{} end_offset={:?}", node_kind_badge("WordOrderedDistance"), n.end_offset);
            for (offset, child) in &n.children {
                println!("{indent}  @{offset}:");
                print_tree(child, depth + 2, total_df);
            }
        }
        QueryNode::Window(n) => {
            println!(
                "{indent}{} [{}, {}] {}",
                node_kind_badge("Window"),
                n.min_dist,
                n.max_dist,
                if n.ordered { "ordered" } else { "unordered" },
            );
            print_tree(&n.left, depth + 1, total_df);
            print_tree(&n.right, depth + 1, total_df);
        }
        QueryNode::Location(n) => {
            println!("{indent}{} k={}", node_kind_badge("Location"), n.k.get());
            print_tree(&n.child, depth + 1, total_df);
        }
        QueryNode::End(n) => {
            println!("{indent}{} k={}", node_kind_badge("End"), n.k);
            print_tree(&n.child, depth + 1, total_df);
        }
        QueryNode::Word(n) => {
            println!("{indent}{}", node_kind_badge("Word"));
            print_tree(&n.child, depth + 1, total_df);
        }
        QueryNode::Scale(n) => {
            println!("{indent}{} factor={}", node_kind_badge("Scale"), n.factor);
            print_tree(&n.child, depth + 1, total_df);
        }
    }
}
