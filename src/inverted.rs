// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The `InvertedFile` collaborator interface and a toy in-memory implementation.
//!
//! This module specifies, but does not own, the storage-engine boundary: list
//! iteration, document-length lookup, and index metadata are all provided by
//! an external collaborator. Schema/catalog, transaction/lock managers, and
//! on-disk list compression are out of scope - the `InMemoryInvertedFile`
//! below exists only so the query tree and tokenizers are exercisable in
//! tests, benchmarks, and the CLI without a real storage engine.

use crate::location::{LocationIterator, VecLocationIterator};
use crate::types::{DocumentFrequency, DocumentId, Location, TermFrequency, TotalDocumentFrequency};
use std::collections::BTreeMap;

/// Which indexing scheme backs an `InvertedFile`.
///
/// Tokenizers declare support for a subset of these via
/// [`crate::tokenizer::Tokenizer::is_supported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingType {
    Ngram,
    Word,
    Dual,
}

/// Lookup mode for [`InvertedFile::get_inverted_list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListLookupMode {
    /// The key must match exactly.
    Search,
    /// The key is a lower bound; the list for the first key `>= key` is returned.
    LowerBound,
}

/// One document's posting within a token's list: term frequency plus its
/// position list, exposed as a pooled [`LocationIterator`].
pub struct Posting {
    pub doc_id: DocumentId,
    pub tf: TermFrequency,
    pub locations: Box<dyn LocationIterator>,
}

/// Opaque handle to one token's posting list.
///
/// Yields `(DocumentId, TF, LocationIterator)` triples in ascending
/// `DocumentId` order, exactly as an on-disk inverted list would after
/// decompression - the compression scheme itself is out of scope here.
pub trait InvertedList: std::fmt::Debug {
    /// Advance to the first posting with `doc_id >= g` and return it.
    fn lower_bound(&mut self, g: DocumentId) -> Option<Posting>;

    /// Number of documents containing this token.
    fn document_frequency(&self) -> DocumentFrequency;

    /// Whether postings in this list carry position information. A
    /// position-less list forces [`crate::query::ordered_distance`]'s
    /// "accept without position check" fallback (see §9 Open Questions).
    fn has_positions(&self) -> bool;
}

/// Looks up a document's indexed length (token count), used by scoring
/// calculators (avg doc length) and by the `End[k]` query node.
pub trait DocumentLengthFile {
    fn document_length(&self, doc_id: DocumentId) -> Option<u32>;
    fn average_document_length(&self) -> f64;
}

/// Codec for one token's on-disk location list representation.
///
/// Specified at interface level only - compression scheme is a Non-goal; the
/// in-memory implementation below is the identity codec.
pub trait LocationCoder {
    fn decode(&self, raw: &[u32]) -> Vec<Location>;
    fn encode(&self, locations: &[Location]) -> Vec<u32>;
}

/// The storage-engine collaborator consumed by [`crate::validate`] and
/// [`crate::query`].
///
/// Concurrent readers are assumed safe by the storage engine; no interior
/// synchronization is provided here (§5 Concurrency & Resource Model).
pub trait InvertedFile {
    fn get_inverted_list(&self, key: &str, mode: ListLookupMode) -> Option<Box<dyn InvertedList>>;
    fn get_document_length_file(&self) -> &dyn DocumentLengthFile;
    fn get_document_frequency(&self, key: &str) -> DocumentFrequency;
    fn get_total_document_frequency(&self) -> TotalDocumentFrequency;
    fn get_max_document_id(&self) -> DocumentId;
    fn get_min_document_id(&self) -> DocumentId;
    fn get_last_document_id(&self) -> DocumentId;
    fn get_indexing_type(&self) -> IndexingType;
    /// Range scan of index keys `[from, to)`, used by short-word expansion.
    fn scan_keys(&self, from: &str, to: &str) -> Vec<String>;
    /// Polled at every document boundary; `true` aborts the evaluation with
    /// [`crate::error::SearchError::Cancelled`].
    fn is_cancel(&self) -> bool {
        false
    }
}

// =============================================================================
// IN-MEMORY TOY IMPLEMENTATION
// =============================================================================

/// A single in-memory posting list: sorted `(DocumentId, TF, positions)` triples.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPostingList {
    entries: Vec<(DocumentId, TermFrequency, Vec<Location>)>,
    has_positions: bool,
}

impl InMemoryPostingList {
    pub fn new(has_positions: bool) -> Self {
        InMemoryPostingList {
            entries: Vec::new(),
            has_positions,
        }
    }

    /// Insert a posting, keeping the list sorted by ascending `DocumentId`.
    pub fn insert(&mut self, doc_id: DocumentId, positions: Vec<Location>) {
        let tf = if self.has_positions {
            positions.len() as TermFrequency
        } else {
            1
        };
        let idx = self.entries.partition_point(|e| e.0 < doc_id);
        self.entries.insert(idx, (doc_id, tf, positions));
    }
}

#[derive(Debug)]
struct InMemoryInvertedListCursor {
    entries: Vec<(DocumentId, TermFrequency, Vec<Location>)>,
    has_positions: bool,
    pos: usize,
}

impl InvertedList for InMemoryInvertedListCursor {
    fn lower_bound(&mut self, g: DocumentId) -> Option<Posting> {
        while self.pos < self.entries.len() && self.entries[self.pos].0 < g {
            self.pos += 1;
        }
        if self.pos >= self.entries.len() {
            return None;
        }
        let (doc_id, tf, locations) = self.entries[self.pos].clone();
        self.pos += 1;
        Some(Posting {
            doc_id,
            tf,
            locations: Box::new(VecLocationIterator::new(locations)),
        })
    }

    fn document_frequency(&self) -> DocumentFrequency {
        self.entries.len() as DocumentFrequency
    }

    fn has_positions(&self) -> bool {
        self.has_positions
    }
}

struct TrivialDocumentLengthFile {
    lengths: BTreeMap<DocumentId, u32>,
    average: f64,
}

impl DocumentLengthFile for TrivialDocumentLengthFile {
    fn document_length(&self, doc_id: DocumentId) -> Option<u32> {
        self.lengths.get(&doc_id).copied()
    }

    fn average_document_length(&self) -> f64 {
        self.average
    }
}

/// A complete in-process inverted file, built by [`InMemoryInvertedFile::builder`].
///
/// This is the collaborator used by the CLI demo and by the crate's own
/// tests/benchmarks; it is not a storage engine, just the smallest thing that
/// satisfies the [`InvertedFile`] contract.
pub struct InMemoryInvertedFile {
    lists: BTreeMap<String, InMemoryPostingList>,
    lengths: TrivialDocumentLengthFile,
    max_doc_id: DocumentId,
    min_doc_id: DocumentId,
    total_docs: TotalDocumentFrequency,
}

impl InMemoryInvertedFile {
    pub fn builder() -> InMemoryInvertedFileBuilder {
        InMemoryInvertedFileBuilder::default()
    }
}

impl InvertedFile for InMemoryInvertedFile {
    fn get_inverted_list(&self, key: &str, mode: ListLookupMode) -> Option<Box<dyn InvertedList>> {
        let list = match mode {
            ListLookupMode::Search => self.lists.get(key)?,
            ListLookupMode::LowerBound => {
                let (_, v) = self.lists.range(key.to_string()..).next()?;
                v
            }
        };
        Some(Box::new(InMemoryInvertedListCursor {
            entries: list.entries.clone(),
            has_positions: list.has_positions,
            pos: 0,
        }))
    }

    fn get_document_length_file(&self) -> &dyn DocumentLengthFile {
        &self.lengths
    }

    fn get_document_frequency(&self, key: &str) -> DocumentFrequency {
        self.lists
            .get(key)
            .map(|l| l.entries.len() as DocumentFrequency)
            .unwrap_or(0)
    }

    fn get_total_document_frequency(&self) -> TotalDocumentFrequency {
        self.total_docs
    }

    fn get_max_document_id(&self) -> DocumentId {
        self.max_doc_id
    }

    fn get_min_document_id(&self) -> DocumentId {
        self.min_doc_id
    }

    fn get_last_document_id(&self) -> DocumentId {
        self.max_doc_id
    }

    fn get_indexing_type(&self) -> IndexingType {
        IndexingType::Ngram
    }

    fn scan_keys(&self, from: &str, to: &str) -> Vec<String> {
        self.lists
            .range(from.to_string()..to.to_string())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryInvertedFileBuilder {
    lists: BTreeMap<String, InMemoryPostingList>,
    lengths: BTreeMap<DocumentId, u32>,
}

impl InMemoryInvertedFileBuilder {
    /// Insert one posting for `token` in `doc_id`, at the given positions.
    /// An empty `positions` slice marks the token as position-less in this
    /// document (a position-less *list* is declared via `has_positions`).
    pub fn posting(
        mut self,
        token: &str,
        doc_id: u32,
        positions: Vec<u32>,
        has_positions: bool,
    ) -> Self {
        let list = self
            .lists
            .entry(token.to_string())
            .or_insert_with(|| InMemoryPostingList::new(has_positions));
        list.insert(
            DocumentId(doc_id),
            positions.into_iter().map(Location).collect(),
        );
        self
    }

    pub fn document_length(mut self, doc_id: u32, length: u32) -> Self {
        self.lengths.insert(DocumentId(doc_id), length);
        self
    }

    pub fn build(self) -> InMemoryInvertedFile {
        let max_doc_id = self
            .lists
            .values()
            .flat_map(|l| l.entries.iter().map(|e| e.0))
            .chain(self.lengths.keys().copied())
            .max()
            .unwrap_or(DocumentId::UNDEFINED);
        let min_doc_id = self
            .lists
            .values()
            .flat_map(|l| l.entries.iter().map(|e| e.0))
            .chain(self.lengths.keys().copied())
            .min()
            .unwrap_or(DocumentId::UNDEFINED);
        let total_docs = max_doc_id.get();
        let average = if self.lengths.is_empty() {
            0.0
        } else {
            self.lengths.values().map(|&v| v as f64).sum::<f64>() / self.lengths.len() as f64
        };
        InMemoryInvertedFile {
            lists: self.lists,
            lengths: TrivialDocumentLengthFile {
                lengths: self.lengths,
                average,
            },
            max_doc_id,
            min_doc_id,
            total_docs,
        }
    }
}
