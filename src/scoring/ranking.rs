// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Final result assembly for ranked retrieval.
//!
//! `second_step` (see [`crate::scoring::calculator`]) turns a stage-1 score
//! into a finalized one per document; this module turns the resulting
//! `(DocumentId, Score)` pairs into the caller-facing ordering.

use crate::types::{DocumentId, Score};
use std::cmp::Ordering;

/// One document's place in a ranked result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedHit {
    pub doc_id: DocumentId,
    pub score: Score,
}

/// Highest score first; ties broken by ascending `DocumentId` for a
/// deterministic order across runs.
pub fn compare_hits(a: &RankedHit, b: &RankedHit) -> Ordering {
    b.score.cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// Sort a batch of scored documents into final ranked order.
pub fn finalize(mut hits: Vec<RankedHit>) -> Vec<RankedHit> {
    hits.sort_by(compare_hits);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_orders_by_descending_score_then_doc_id() {
        let hits = vec![
            RankedHit { doc_id: DocumentId(3), score: Score(1.0) },
            RankedHit { doc_id: DocumentId(1), score: Score(5.0) },
            RankedHit { doc_id: DocumentId(2), score: Score(5.0) },
        ];
        let ranked = finalize(hits);
        assert_eq!(
            ranked,
            vec![
                RankedHit { doc_id: DocumentId(1), score: Score(5.0) },
                RankedHit { doc_id: DocumentId(2), score: Score(5.0) },
                RankedHit { doc_id: DocumentId(3), score: Score(1.0) },
            ]
        );
    }
}
