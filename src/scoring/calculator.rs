// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! `ScoreCalculator`: per-leaf transform from (TF, DF, doc length) to a
//! two-stage `Score`.
//!
//! A calculator is identified by name and obtained fresh from [`create`] at
//! validate time - one instance per node, never shared, because it caches
//! per-node prepared values (`total_df`, `df`, average document length).

use crate::inverted::DocumentLengthFile;
use crate::types::{DocumentFrequency, DocumentId, Score, TermFrequency, TotalDocumentFrequency};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;

/// Stage-1/stage-2 score transform owned by a leaf or AtomicOr node.
///
/// `first_step` runs document-at-a-time, as soon as a document's TF is
/// known; `second_step` runs once the final DF for the whole subtree is
/// known, which for a term leaf is immediate but for AtomicOr is only after
/// the rough scan completes.
pub trait ScoreCalculator: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Cache `total_df`/`df` ahead of evaluation.
    fn prepare(&mut self, total_df: TotalDocumentFrequency, df: DocumentFrequency);

    fn set_average_document_length(&mut self, avg: f64);

    fn set_document_length_file(&mut self, lengths: Rc<dyn DocumentLengthFile>);

    /// Stage 1: from a document's TF, produce a provisional score and
    /// whether this document should be considered a match at all (a
    /// calculator may veto a zero-TF document).
    fn first_step(&self, tf: TermFrequency, doc_id: DocumentId) -> (Score, bool);

    /// Stage 2: finalize using the DF known only after stage 1 completes
    /// across the subtree.
    fn second_step(&self, df: DocumentFrequency, stage1: Score, total_df: TotalDocumentFrequency) -> Score;

    /// Duplicate this calculator's static configuration (not its per-node
    /// prepared state) for a new node.
    fn clone_box(&self) -> Box<dyn ScoreCalculator>;
}

/// `score = TF`, unaffected by DF or document length.
///
/// Used by the worked examples (§8.4) and as the default test fixture
/// calculator - deterministic and trivial to hand-verify.
#[derive(Debug, Clone, Default)]
pub struct UnitCalculator;

impl ScoreCalculator for UnitCalculator {
    fn name(&self) -> &'static str {
        "unit"
    }
    fn prepare(&mut self, _total_df: TotalDocumentFrequency, _df: DocumentFrequency) {}
    fn set_average_document_length(&mut self, _avg: f64) {}
    fn set_document_length_file(&mut self, _lengths: Rc<dyn DocumentLengthFile>) {}

    fn first_step(&self, tf: TermFrequency, _doc_id: DocumentId) -> (Score, bool) {
        (Score(tf as f64), tf > 0)
    }

    fn second_step(&self, _df: DocumentFrequency, stage1: Score, _total_df: TotalDocumentFrequency) -> Score {
        stage1
    }

    fn clone_box(&self) -> Box<dyn ScoreCalculator> {
        Box::new(self.clone())
    }
}

/// Classic `tf * ln(total_df / df)`, no length normalization.
#[derive(Debug, Clone, Default)]
pub struct TfIdfCalculator {
    total_df: TotalDocumentFrequency,
    df: DocumentFrequency,
}

impl ScoreCalculator for TfIdfCalculator {
    fn name(&self) -> &'static str {
        "tf-idf"
    }

    fn prepare(&mut self, total_df: TotalDocumentFrequency, df: DocumentFrequency) {
        self.total_df = total_df;
        self.df = df;
    }

    fn set_average_document_length(&mut self, _avg: f64) {}
    fn set_document_length_file(&mut self, _lengths: Rc<dyn DocumentLengthFile>) {}

    fn first_step(&self, tf: TermFrequency, _doc_id: DocumentId) -> (Score, bool) {
        (Score(tf as f64), tf > 0)
    }

    fn second_step(&self, df: DocumentFrequency, stage1: Score, total_df: TotalDocumentFrequency) -> Score {
        let df = if df > 0 { df } else { self.df.max(1) };
        let total_df = if total_df > 0 { total_df } else { self.total_df.max(1) };
        let idf = ((total_df as f64) / (df as f64)).ln().max(0.0);
        Score(stage1.get() * idf)
    }

    fn clone_box(&self) -> Box<dyn ScoreCalculator> {
        Box::new(self.clone())
    }
}

/// BM25 with the standard `k1 = 1.2`, `b = 0.75` constants, length-normalized
/// against the per-node average document length.
#[derive(Debug, Clone)]
pub struct Bm25Calculator {
    total_df: TotalDocumentFrequency,
    df: DocumentFrequency,
    avg_doc_length: f64,
    lengths: Option<Rc<dyn DocumentLengthFile>>,
    k1: f64,
    b: f64,
}

impl Default for Bm25Calculator {
    fn default() -> Self {
        Bm25Calculator {
            total_df: 0,
            df: 0,
            avg_doc_length: 0.0,
            lengths: None,
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl ScoreCalculator for Bm25Calculator {
    fn name(&self) -> &'static str {
        "bm25"
    }

    fn prepare(&mut self, total_df: TotalDocumentFrequency, df: DocumentFrequency) {
        self.total_df = total_df;
        self.df = df;
    }

    fn set_average_document_length(&mut self, avg: f64) {
        self.avg_doc_length = avg;
    }

    fn set_document_length_file(&mut self, lengths: Rc<dyn DocumentLengthFile>) {
        self.lengths = Some(lengths);
    }

    fn first_step(&self, tf: TermFrequency, doc_id: DocumentId) -> (Score, bool) {
        if tf == 0 {
            return (Score::ZERO, false);
        }
        let doc_len = self
            .lengths
            .as_ref()
            .and_then(|f| f.document_length(doc_id))
            .unwrap_or(self.avg_doc_length.round() as u32) as f64;
        let norm = if self.avg_doc_length > 0.0 {
            1.0 - self.b + self.b * (doc_len / self.avg_doc_length)
        } else {
            1.0
        };
        let tf = tf as f64;
        let weighted_tf = (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm);
        (Score(weighted_tf), true)
    }

    fn second_step(&self, df: DocumentFrequency, stage1: Score, total_df: TotalDocumentFrequency) -> Score {
        let df = if df > 0 { df } else { self.df.max(1) };
        let total_df = if total_df > 0 { total_df } else { self.total_df.max(1) };
        let idf = (((total_df as f64) - (df as f64) + 0.5) / ((df as f64) + 0.5) + 1.0).ln();
        Score(stage1.get() * idf)
    }

    fn clone_box(&self) -> Box<dyn ScoreCalculator> {
        Box::new(self.clone())
    }
}

type CalculatorFactory = fn() -> Box<dyn ScoreCalculator>;

fn registry() -> &'static HashMap<&'static str, CalculatorFactory> {
    static REGISTRY: OnceLock<HashMap<&'static str, CalculatorFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut m: HashMap<&'static str, CalculatorFactory> = HashMap::new();
        m.insert("unit", || Box::new(UnitCalculator));
        m.insert("tf-idf", || Box::new(TfIdfCalculator::default()));
        m.insert("bm25", || Box::new(Bm25Calculator::default()));
        m
    })
}

/// Factory lookup by name; `None` if no calculator is registered under it.
pub fn create(name: &str) -> Option<Box<dyn ScoreCalculator>> {
    registry().get(name).map(|f| f())
}
