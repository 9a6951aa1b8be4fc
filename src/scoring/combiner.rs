// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! `ScoreCombiner`: merges a ranking internal node's child scores into one.
//!
//! `is_associative`/`is_commutative` drive the validate pipeline: flatten
//! only collapses a ranking OR into its parent when the combiner is
//! associative, and sort is skipped for a ranking AND whose combiner is
//! non-commutative (child order then carries meaning).

use crate::types::Score;
use std::collections::HashMap;
use std::sync::OnceLock;

pub trait ScoreCombiner: std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn apply(&self, scores: &[Score]) -> Score;
    fn is_associative(&self) -> bool;
    fn is_commutative(&self) -> bool;
    fn clone_box(&self) -> Box<dyn ScoreCombiner>;
}

#[derive(Debug, Clone, Default)]
pub struct SumCombiner;

impl ScoreCombiner for SumCombiner {
    fn name(&self) -> &'static str {
        "sum"
    }
    fn apply(&self, scores: &[Score]) -> Score {
        Score(scores.iter().map(|s| s.get()).sum())
    }
    fn is_associative(&self) -> bool {
        true
    }
    fn is_commutative(&self) -> bool {
        true
    }
    fn clone_box(&self) -> Box<dyn ScoreCombiner> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaxCombiner;

impl ScoreCombiner for MaxCombiner {
    fn name(&self) -> &'static str {
        "max"
    }
    fn apply(&self, scores: &[Score]) -> Score {
        scores.iter().copied().max().unwrap_or(Score::ZERO)
    }
    fn is_associative(&self) -> bool {
        true
    }
    fn is_commutative(&self) -> bool {
        true
    }
    fn clone_box(&self) -> Box<dyn ScoreCombiner> {
        Box::new(self.clone())
    }
}

/// Weighted sum over children in positional order: `sum(scores[i] * weights[i])`,
/// falling back to `1.0` for any position past the end of `weights`.
///
/// Deliberately non-commutative and non-associative, since swapping two
/// children would change the result - this is the fixture used to exercise
/// the "sort is skipped for non-commutative ranking AND" rule.
#[derive(Debug, Clone)]
pub struct WeightedCombiner {
    weights: Vec<f64>,
}

impl WeightedCombiner {
    pub fn new(weights: Vec<f64>) -> Self {
        WeightedCombiner { weights }
    }
}

impl ScoreCombiner for WeightedCombiner {
    fn name(&self) -> &'static str {
        "weighted"
    }
    fn apply(&self, scores: &[Score]) -> Score {
        let total: f64 = scores
            .iter()
            .enumerate()
            .map(|(i, s)| s.get() * self.weights.get(i).copied().unwrap_or(1.0))
            .sum();
        Score(total)
    }
    fn is_associative(&self) -> bool {
        false
    }
    fn is_commutative(&self) -> bool {
        false
    }
    fn clone_box(&self) -> Box<dyn ScoreCombiner> {
        Box::new(self.clone())
    }
}

type CombinerFactory = fn() -> Box<dyn ScoreCombiner>;

fn registry() -> &'static HashMap<&'static str, CombinerFactory> {
    static REGISTRY: OnceLock<HashMap<&'static str, CombinerFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut m: HashMap<&'static str, CombinerFactory> = HashMap::new();
        m.insert("sum", || Box::new(SumCombiner));
        m.insert("max", || Box::new(MaxCombiner));
        m
    })
}

/// Factory lookup by name. `WeightedCombiner` takes constructor arguments and
/// so is not in the name registry; construct it directly.
pub fn create(name: &str) -> Option<Box<dyn ScoreCombiner>> {
    registry().get(name).map(|f| f())
}
