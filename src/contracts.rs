// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Runtime contracts for the query-tree evaluation invariants.
//!
//! These are debug-mode assertions, zero-cost in release builds
//! (`debug_assert!`), that verify the properties enumerated as "quantified
//! invariants" and "boundary behaviors" for the query tree. Removing or
//! weakening these checks defeats their purpose - they exist so a broken
//! memoization window or an unsound rough-node relationship fails loudly in
//! development instead of silently corrupting a ranked result set.
//!
//! | Contract function                | Invariant                                   |
//! |-----------------------------------|----------------------------------------------|
//! | `check_memo_window`               | `lower <= d <= upper` after evaluate/lower_bound |
//! | `check_rough_is_superset`         | precise match implies rough match             |
//! | `check_children_nonempty`        | internal nodes have at least one child        |
//! | `check_window_arity`              | window/ordered-distance nodes have >= 2 children |

use crate::types::DocumentId;

/// Check that a node's memoization window still contains the queried document.
///
/// # Panics (debug builds only)
/// Panics if `d` falls outside `[lower, upper]`.
#[inline]
pub fn check_memo_window(d: DocumentId, lower: DocumentId, upper: DocumentId) {
    debug_assert!(
        d >= lower && (upper == DocumentId::SENTINEL_END || d <= upper),
        "Contract violation: memo window [{lower}, {upper}] does not contain {d}",
    );
}

/// Check that after a failed descent past `g`, the memo window is set to
/// `[g, SENTINEL_END]` - the canonical "nothing further will match" marker.
#[inline]
pub fn check_memo_window_on_failure(g: DocumentId, lower: DocumentId, upper: DocumentId) {
    debug_assert!(
        lower == g && upper == DocumentId::SENTINEL_END,
        "Contract violation: failed descent from {g} should set window to [{g}, SENTINEL_END], got [{lower}, {upper}]",
    );
}

/// Check the rough-node over-approximation invariant: every document that
/// satisfies `precise.evaluate(d) == true` must also satisfy
/// `rough.evaluate(d, rough_mode) == true`.
///
/// # Panics (debug builds only)
#[inline]
pub fn check_rough_is_superset(d: DocumentId, precise_matched: bool, rough_matched: Option<bool>) {
    if precise_matched {
        if let Some(rough_matched) = rough_matched {
            debug_assert!(
                rough_matched,
                "Contract violation: document {d} satisfies precise evaluation but not its rough node",
            );
        }
    }
}

/// Check that an internal node (And/Or/Window/OrderedDistance) has at least
/// one child.
#[inline]
pub fn check_children_nonempty(node_kind: &str, child_count: usize) {
    debug_assert!(
        child_count > 0,
        "Contract violation: {node_kind} has no children",
    );
}

/// Window and OrderedDistance nodes require at least two children to express
/// a positional relationship.
#[inline]
pub fn check_window_arity(node_kind: &str, child_count: usize) {
    debug_assert!(
        child_count >= 2,
        "Contract violation: {node_kind} requires >= 2 children, got {child_count}",
    );
}

/// Check that a lower_bound result respects its precondition: the returned
/// document is `>= g`.
#[inline]
pub fn check_lower_bound_result(g: DocumentId, result: Option<DocumentId>) {
    if let Some(d) = result {
        debug_assert!(
            d >= g,
            "Contract violation: lower_bound({g}) returned {d} which is < {g}",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_window_contains_queried_doc() {
        check_memo_window(DocumentId(5), DocumentId(2), DocumentId(8));
    }

    #[test]
    #[should_panic(expected = "Contract violation")]
    fn memo_window_rejects_doc_outside_window() {
        check_memo_window(DocumentId(9), DocumentId(2), DocumentId(8));
    }

    #[test]
    #[should_panic(expected = "Contract violation")]
    fn rough_superset_violation_panics() {
        check_rough_is_superset(DocumentId(1), true, Some(false));
    }

    #[test]
    fn lower_bound_result_ge_g() {
        check_lower_bound_result(DocumentId(5), Some(DocumentId(7)));
    }
}
