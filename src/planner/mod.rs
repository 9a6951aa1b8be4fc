// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Planner combinator layer (§4.4) - a `Predicate` tree over boolean-valued
//! conditions, specified at interface level only. No optimizer, catalog, or
//! cost-based join ordering lives here; this is the shape a real query
//! planner's boolean-predicate layer takes, grounded on the
//! Combinator/Predicate split the original source expresses through
//! `Kernel::Plan::Predicate`/`Execution::Predicate::Combinator` - every
//! `Predicate` supports the four §4.4 operations: `check` (partition into
//! index-pushable / residual), `estimate_cost`, `rewrite` (Exists/IN
//! expansion), and `generate` (emit a runtime execution node).

use std::collections::HashMap;
use std::fmt;

/// An opaque per-row environment a [`Predicate::evaluate`] is checked
/// against at execution time. Real planners would carry column values, a
/// row handle, or similar; this crate's query tree never needs more than
/// membership tests, so the planner layer stays a thin, swappable
/// combinator surface above it.
pub trait Environment: fmt::Debug {
    fn get(&self, name: &str) -> Option<&str>;
}

/// What a [`Predicate::check`] pass learns about a relation during
/// planning: which index files (if any) cover a given field. Opaque at this
/// interface level - a real planner resolves these ids against its catalog.
pub type IndexFileId = String;

pub trait PlanningEnvironment: fmt::Debug {
    /// Index files that cover `field`, if any.
    fn indexes_for(&self, field: &str) -> Vec<IndexFileId>;
}

/// A cost estimate a `Predicate` can report before evaluation, allowing a
/// caller to order checks cheapest-first. `Infinity` marks a predicate that
/// cannot be evaluated at all without more support (e.g. a spatial index).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cost {
    Value(f64),
    Infinity,
}

impl Cost {
    pub fn is_infinity(self) -> bool {
        matches!(self, Cost::Infinity)
    }

    /// §4.4: "NOT complements the rate."
    pub fn complement(self) -> Cost {
        match self {
            Cost::Infinity => Cost::Infinity,
            Cost::Value(v) => Cost::Value(1.0 - v),
        }
    }
}

/// §4.4 `Predicate::check`'s result: the part of the predicate that can be
/// pushed into an index file scan, the part that must still be evaluated
/// row-at-a-time, and the candidate files the checked part could run
/// against. Either half may be absent (a fully-checked predicate has no
/// residual, and vice versa).
#[derive(Debug)]
pub struct CheckResult {
    pub checked: Option<Box<dyn Predicate>>,
    pub residual: Option<Box<dyn Predicate>>,
    pub candidate_files: Vec<IndexFileId>,
}

impl CheckResult {
    fn fully_checked(predicate: Box<dyn Predicate>, candidate_files: Vec<IndexFileId>) -> Self {
        CheckResult {
            checked: Some(predicate),
            residual: None,
            candidate_files,
        }
    }

    fn fully_residual(predicate: Box<dyn Predicate>) -> Self {
        CheckResult {
            checked: None,
            residual: Some(predicate),
            candidate_files: Vec::new(),
        }
    }

    fn is_fully_pushable(&self) -> bool {
        self.residual.is_none() && !self.candidate_files.is_empty()
    }
}

/// The runtime node [`Predicate::generate`] emits - the execution-layer
/// counterpart of a validated predicate tree, analogous to
/// [`crate::query::node::QueryNode`] one layer down.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeNode {
    And(Vec<RuntimeNode>),
    Or(Vec<RuntimeNode>),
    Not(Box<RuntimeNode>),
    Choice(Vec<RuntimeNode>),
    Eq { field: String, value: String },
    /// Exists, generated directly (not rewritten into a join): the runtime
    /// check is "is the candidate set for `field` empty?"
    IsEmpty { field: String },
    /// A rewritten Exists / IN-subquery: a correlated join against
    /// `relation` on `field`.
    Join { field: String, relation: String },
    /// IN (value list): probe `field` against a fixed array of values.
    InArrayProbe { field: String, values: Vec<String> },
    /// IN (variable): probe `field` against an array-valued variable
    /// resolved at execution time rather than planning time.
    InArbitraryElementProbe { field: String, variable: String },
}

/// One boolean condition in a predicate tree.
pub trait Predicate: fmt::Debug {
    /// Evaluate this predicate against one row.
    fn evaluate(&self, env: &dyn Environment) -> bool;

    /// A caller-facing cost estimate, used to order sibling predicates.
    fn estimate_cost(&self) -> Cost {
        Cost::Value(1.0)
    }

    /// §4.4: partition into a checked (index-pushable) part, a residual
    /// part, and the candidate index files the checked part could run
    /// against. The default treats a predicate as indexable exactly when
    /// [`Predicate::indexable_field`] names a field the environment has an
    /// index for; composite predicates override this to recurse.
    fn check(&self, penv: &dyn PlanningEnvironment) -> CheckResult {
        match self.indexable_field() {
            Some(field) => {
                let files = penv.indexes_for(field);
                if files.is_empty() {
                    CheckResult::fully_residual(self.box_clone())
                } else {
                    CheckResult::fully_checked(self.box_clone(), files)
                }
            }
            None => CheckResult::fully_residual(self.box_clone()),
        }
    }

    /// The single field this predicate probes, if it is the kind of leaf
    /// `check`'s default impl can push into an index scan. `None` for
    /// composite predicates (they override `check` directly) and for leaves
    /// with no index-probe shape (e.g. a join).
    fn indexable_field(&self) -> Option<&str> {
        None
    }

    /// Produce an equivalent, possibly cheaper, predicate: Exists becomes a
    /// join, IN (subquery) becomes an exists-join with equality, IN (value
    /// list) expands to an OR of equalities (or stays a native IN probe past
    /// [`IN_EXPANSION_THRESHOLD`]), IN (variable) is kept as an array-probe
    /// predicate. The default is the identity rewrite; combinators override
    /// this to recurse into their children.
    fn rewrite(&self) -> Box<dyn Predicate> {
        self.box_clone()
    }

    /// Emit the runtime execution node for this predicate.
    fn generate(&self) -> RuntimeNode;

    /// Clone this predicate behind its trait object, so `check`/`rewrite`
    /// can hand back boxed sub-predicates without consuming `self`.
    fn box_clone(&self) -> Box<dyn Predicate>;
}

impl Clone for Box<dyn Predicate> {
    fn clone(&self) -> Box<dyn Predicate> {
        self.box_clone()
    }
}

/// Past this many values, `InPredicate::rewrite` keeps a value-list IN as a
/// native probe instead of expanding it into an OR of equalities.
pub const IN_EXPANSION_THRESHOLD: usize = 4;

#[derive(Debug, Clone)]
pub struct AndPredicate {
    pub children: Vec<Box<dyn Predicate>>,
}

impl Predicate for AndPredicate {
    fn evaluate(&self, env: &dyn Environment) -> bool {
        self.children.iter().all(|c| c.evaluate(env))
    }

    fn estimate_cost(&self) -> Cost {
        sum_cost(&self.children)
    }

    /// §4.4: "AND with index partly covering one file chooses the file that
    /// maximizes the number of merged predicates." Children that can be
    /// pushed to that file become the checked part; everything else
    /// (including a child that is only partly checked) stays residual,
    /// since this interface-level layer does not splice a mixed checked/
    /// residual child back into two separate AND branches.
    fn check(&self, penv: &dyn PlanningEnvironment) -> CheckResult {
        let per_child: Vec<CheckResult> = self.children.iter().map(|c| c.check(penv)).collect();

        let mut file_votes: HashMap<&str, usize> = HashMap::new();
        for cr in &per_child {
            if cr.is_fully_pushable() {
                for file in &cr.candidate_files {
                    *file_votes.entry(file.as_str()).or_insert(0) += 1;
                }
            }
        }
        let best_file = file_votes
            .into_iter()
            .max_by_key(|(_, votes)| *votes)
            .map(|(file, _)| file.to_string());

        let mut checked_children = Vec::new();
        let mut residual_children = Vec::new();
        for (child, cr) in self.children.iter().zip(per_child.into_iter()) {
            let pushable = match &best_file {
                Some(file) => cr.is_fully_pushable() && cr.candidate_files.iter().any(|f| f == file),
                None => false,
            };
            if pushable {
                checked_children.push(cr.checked.unwrap_or_else(|| child.box_clone()));
            } else {
                residual_children.push(child.box_clone());
            }
        }

        let checked = fold_into(checked_children, |children| Box::new(AndPredicate { children }));
        let residual = fold_into(residual_children, |children| Box::new(AndPredicate { children }));
        CheckResult {
            checked,
            residual,
            candidate_files: best_file.into_iter().collect(),
        }
    }

    fn rewrite(&self) -> Box<dyn Predicate> {
        Box::new(AndPredicate {
            children: self.children.iter().map(|c| c.rewrite()).collect(),
        })
    }

    fn generate(&self) -> RuntimeNode {
        RuntimeNode::And(self.children.iter().map(|c| c.generate()).collect())
    }

    fn box_clone(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone)]
pub struct OrPredicate {
    pub children: Vec<Box<dyn Predicate>>,
}

impl Predicate for OrPredicate {
    fn evaluate(&self, env: &dyn Environment) -> bool {
        self.children.iter().any(|c| c.evaluate(env))
    }

    fn estimate_cost(&self) -> Cost {
        max_cost(&self.children)
    }

    /// §4.4: "OR only pushes if ALL children can be pushed to compatible
    /// indices; otherwise becomes fully residual." A file only qualifies if
    /// it covers every child.
    fn check(&self, penv: &dyn PlanningEnvironment) -> CheckResult {
        let per_child: Vec<CheckResult> = self.children.iter().map(|c| c.check(penv)).collect();
        if !per_child.iter().all(CheckResult::is_fully_pushable) {
            return CheckResult::fully_residual(self.box_clone());
        }
        let mut common: Option<Vec<IndexFileId>> = None;
        for cr in &per_child {
            common = Some(match common {
                None => cr.candidate_files.clone(),
                Some(prev) => prev.into_iter().filter(|f| cr.candidate_files.contains(f)).collect(),
            });
        }
        match common {
            Some(files) if !files.is_empty() => CheckResult::fully_checked(self.box_clone(), files),
            _ => CheckResult::fully_residual(self.box_clone()),
        }
    }

    fn rewrite(&self) -> Box<dyn Predicate> {
        Box::new(OrPredicate {
            children: self.children.iter().map(|c| c.rewrite()).collect(),
        })
    }

    fn generate(&self) -> RuntimeNode {
        RuntimeNode::Or(self.children.iter().map(|c| c.generate()).collect())
    }

    fn box_clone(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NotPredicate {
    pub child: Box<dyn Predicate>,
}

impl Predicate for NotPredicate {
    fn evaluate(&self, env: &dyn Environment) -> bool {
        !self.child.evaluate(env)
    }

    fn estimate_cost(&self) -> Cost {
        self.child.estimate_cost().complement()
    }

    /// §4.4: "NOT is pushed only if its operand is fully indexable."
    fn check(&self, penv: &dyn PlanningEnvironment) -> CheckResult {
        let inner = self.child.check(penv);
        if inner.is_fully_pushable() {
            CheckResult::fully_checked(self.box_clone(), inner.candidate_files)
        } else {
            CheckResult::fully_residual(self.box_clone())
        }
    }

    fn rewrite(&self) -> Box<dyn Predicate> {
        Box::new(NotPredicate {
            child: self.child.rewrite(),
        })
    }

    fn generate(&self) -> RuntimeNode {
        RuntimeNode::Not(Box::new(self.child.generate()))
    }

    fn box_clone(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

/// Picks the first child whose `evaluate` succeeds and defers entirely to it
/// - a switch/case over predicates rather than a boolean combination.
#[derive(Debug, Clone)]
pub struct ChoicePredicate {
    pub arms: Vec<Box<dyn Predicate>>,
}

impl Predicate for ChoicePredicate {
    fn evaluate(&self, env: &dyn Environment) -> bool {
        self.arms.iter().any(|a| a.evaluate(env))
    }

    fn estimate_cost(&self) -> Cost {
        self.arms
            .iter()
            .map(|a| a.estimate_cost())
            .min_by(|a, b| match (a, b) {
                (Cost::Infinity, Cost::Infinity) => std::cmp::Ordering::Equal,
                (Cost::Infinity, _) => std::cmp::Ordering::Greater,
                (_, Cost::Infinity) => std::cmp::Ordering::Less,
                (Cost::Value(x), Cost::Value(y)) => x.total_cmp(y),
            })
            .unwrap_or(Cost::Value(0.0))
    }

    fn rewrite(&self) -> Box<dyn Predicate> {
        Box::new(ChoicePredicate {
            arms: self.arms.iter().map(|a| a.rewrite()).collect(),
        })
    }

    fn generate(&self) -> RuntimeNode {
        RuntimeNode::Choice(self.arms.iter().map(|a| a.generate()).collect())
    }

    fn box_clone(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

/// The operand shape of an `IN` predicate, driving how `rewrite` expands it
/// (§4.4: "IN (subquery) becomes an exists-join with equality; IN (value
/// list) expands to OR of equalities or to a native IN probe; IN (variable)
/// keeps as an array-probe predicate").
#[derive(Debug, Clone)]
pub enum InOperand {
    ValueList(Vec<String>),
    Subquery(String),
    Variable(String),
}

/// `field IN {...}` membership test, over one of [`InOperand`]'s three
/// shapes.
#[derive(Debug, Clone)]
pub struct InPredicate {
    pub field: String,
    pub operand: InOperand,
}

impl Predicate for InPredicate {
    fn evaluate(&self, env: &dyn Environment) -> bool {
        match &self.operand {
            InOperand::ValueList(values) => match env.get(&self.field) {
                Some(v) => values.iter().any(|candidate| candidate == v),
                None => false,
            },
            InOperand::Variable(var) => match (env.get(&self.field), env.get(var)) {
                (Some(v), Some(elements)) => elements.split(',').any(|candidate| candidate == v),
                _ => false,
            },
            // A subquery operand has no row-local truth value until
            // `rewrite` turns it into a join; residual evaluation of the
            // un-rewritten form has nothing to compare against.
            InOperand::Subquery(_) => false,
        }
    }

    fn indexable_field(&self) -> Option<&str> {
        match &self.operand {
            InOperand::ValueList(_) => Some(&self.field),
            InOperand::Subquery(_) | InOperand::Variable(_) => None,
        }
    }

    fn rewrite(&self) -> Box<dyn Predicate> {
        match &self.operand {
            InOperand::ValueList(values) if values.len() <= IN_EXPANSION_THRESHOLD => {
                Box::new(OrPredicate {
                    children: values
                        .iter()
                        .map(|v| {
                            Box::new(EqPredicate {
                                field: self.field.clone(),
                                value: v.clone(),
                            }) as Box<dyn Predicate>
                        })
                        .collect(),
                })
            }
            InOperand::Subquery(relation) => Box::new(JoinPredicate {
                field: self.field.clone(),
                relation: relation.clone(),
            }),
            // Value list past the expansion threshold (native IN probe) or
            // a variable operand (array-probe): kept as-is.
            _ => self.box_clone(),
        }
    }

    fn generate(&self) -> RuntimeNode {
        match &self.operand {
            InOperand::ValueList(values) => RuntimeNode::InArrayProbe {
                field: self.field.clone(),
                values: values.clone(),
            },
            InOperand::Variable(var) => RuntimeNode::InArbitraryElementProbe {
                field: self.field.clone(),
                variable: var.clone(),
            },
            InOperand::Subquery(relation) => RuntimeNode::Join {
                field: self.field.clone(),
                relation: relation.clone(),
            },
        }
    }

    fn box_clone(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

/// `field == value`, the leaf `InPredicate::rewrite` expands a short value
/// list into.
#[derive(Debug, Clone)]
pub struct EqPredicate {
    pub field: String,
    pub value: String,
}

impl Predicate for EqPredicate {
    fn evaluate(&self, env: &dyn Environment) -> bool {
        env.get(&self.field) == Some(self.value.as_str())
    }

    fn indexable_field(&self) -> Option<&str> {
        Some(&self.field)
    }

    fn generate(&self) -> RuntimeNode {
        RuntimeNode::Eq {
            field: self.field.clone(),
            value: self.value.clone(),
        }
    }

    fn box_clone(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

/// `field` is present in the environment at all.
#[derive(Debug, Clone)]
pub struct ExistsPredicate {
    pub field: String,
}

impl Predicate for ExistsPredicate {
    fn evaluate(&self, env: &dyn Environment) -> bool {
        env.get(&self.field).is_some()
    }

    fn estimate_cost(&self) -> Cost {
        Cost::Value(0.1)
    }

    /// §4.4: "Exists becomes a join." Call this before `generate` when
    /// Exists stands in for a correlated subquery's existence check; call
    /// `generate` directly (without rewriting) for a plain field-presence
    /// probe, which stays an `IsEmpty` runtime check.
    fn rewrite(&self) -> Box<dyn Predicate> {
        Box::new(JoinPredicate {
            field: self.field.clone(),
            relation: format!("{}$exists", self.field),
        })
    }

    fn generate(&self) -> RuntimeNode {
        RuntimeNode::IsEmpty {
            field: self.field.clone(),
        }
    }

    fn box_clone(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

/// A rewritten Exists or IN-subquery: a correlated join against `relation`
/// on `field`. Never produced by a parser directly - only by
/// [`ExistsPredicate::rewrite`] / [`InPredicate::rewrite`].
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    pub field: String,
    pub relation: String,
}

impl Predicate for JoinPredicate {
    fn evaluate(&self, env: &dyn Environment) -> bool {
        env.get(&self.field).is_some()
    }

    fn generate(&self) -> RuntimeNode {
        RuntimeNode::Join {
            field: self.field.clone(),
            relation: self.relation.clone(),
        }
    }

    fn box_clone(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

fn sum_cost(children: &[Box<dyn Predicate>]) -> Cost {
    let mut total = 0.0;
    for child in children {
        match child.estimate_cost() {
            Cost::Infinity => return Cost::Infinity,
            Cost::Value(v) => total += v,
        }
    }
    Cost::Value(total)
}

/// §4.4: "OR uses max rate."
fn max_cost(children: &[Box<dyn Predicate>]) -> Cost {
    let mut best = 0.0_f64;
    for child in children {
        match child.estimate_cost() {
            Cost::Infinity => return Cost::Infinity,
            Cost::Value(v) => best = best.max(v),
        }
    }
    Cost::Value(best)
}

/// Collapse a list of boxed predicates into `None` (empty), the single
/// element (one), or `build(children)` (more than one) - the same
/// zero/one/many fold `validate::mod`'s flatten pass uses for And/Or.
fn fold_into(
    mut children: Vec<Box<dyn Predicate>>,
    build: impl FnOnce(Vec<Box<dyn Predicate>>) -> Box<dyn Predicate>,
) -> Option<Box<dyn Predicate>> {
    match children.len() {
        0 => None,
        1 => Some(children.pop().unwrap()),
        _ => Some(build(children)),
    }
}
