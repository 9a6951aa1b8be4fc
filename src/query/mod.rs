// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The query tree: node variants, the evaluation protocol, and canonical
//! string serialization used by the sharing pass.

pub mod canon;
pub mod node;
pub mod term_leaf;

pub use node::{EvalNode, NodeRef, QueryNode, ResultSet};
pub use term_leaf::{MatchMode, ParsedNode, TermLeafNode};
