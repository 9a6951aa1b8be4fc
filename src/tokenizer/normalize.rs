// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Process-wide normalization/expansion resource registry.
//!
//! Per §5 and §9 "Global state": the source holds three raw function pointers
//! (`getNormalizerFunc`, `getStemmerFunc`, `getAnalyzerFunc`), each returning a
//! resource keyed by a small integer id parsed out of the tokenizer
//! description string (`@NORMRSCID:n`). This replaces all three with one
//! trait object per resource id in a single `RwLock<HashMap>`, registered
//! once at startup via [`register`] and read by every tokenizer that carries
//! a matching `@NORMRSCID`. Grounded on the teacher's `STOP_WORDS:
//! LazyLock<HashSet<String>>` pattern for process-wide, lazily initialized
//! shared data (`inverted.rs`), extended here to a mutable registration API
//! since more than one resource id must be installed.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// A normalization/expansion resource: turns one input string into its
/// canonical form and, optionally, into alternate target strings
/// (synonyms, spelling variants) for [`tokenize_multi`](super::Tokenizer::tokenize_multi).
pub trait NormalizeExpand: Send + Sync + std::fmt::Debug {
    /// Canonicalize `text` (casing, diacritics, width, ...).
    fn normalize(&self, text: &str) -> String;

    /// Additional target strings besides the normalized one, e.g. synonym
    /// expansions. An empty vec means "no expansion configured".
    fn expand(&self, text: &str) -> Vec<String> {
        let _ = text;
        Vec::new()
    }
}

/// The default resource (id 0): diacritic-insensitive normalization, no
/// expansion. Reuses [`crate::utils::normalize`].
#[derive(Debug, Default)]
pub struct DefaultNormalizer;

impl NormalizeExpand for DefaultNormalizer {
    fn normalize(&self, text: &str) -> String {
        crate::utils::normalize(text)
    }
}

fn registry() -> &'static RwLock<HashMap<u32, Arc<dyn NormalizeExpand>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<u32, Arc<dyn NormalizeExpand>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut m: HashMap<u32, Arc<dyn NormalizeExpand>> = HashMap::new();
        m.insert(0, Arc::new(DefaultNormalizer));
        RwLock::new(m)
    })
}

/// Register (or replace) the resource for `id`. Call once at process
/// startup for each resource id a tokenizer description may reference.
pub fn register(id: u32, resource: Arc<dyn NormalizeExpand>) {
    registry().write().expect("normalize registry poisoned").insert(id, resource);
}

/// Look up the resource for `id`. `None` means
/// [`crate::error::SearchError::GetNormalizerFail`].
pub fn get(id: u32) -> Option<Arc<dyn NormalizeExpand>> {
    registry().read().expect("normalize registry poisoned").get(&id).cloned()
}

/// §9 Open Question #4, implemented literally: any codepoint outside the
/// ASCII alphabet/digit/symbol/space categories selects `StringMode` over
/// `ExactWordMode` for `multiLanguageMode` term leaves. Not a CJK
/// Unicode-block allowlist - the test is the four-category exclusion as
/// stated, nothing more.
pub fn is_cjk_like(text: &str) -> bool {
    text.chars().any(|c| {
        let is_alphabet = c.is_ascii_alphabetic();
        let is_digit = c.is_ascii_digit();
        let is_symbol = c.is_ascii_punctuation() || c.is_ascii_graphic() && !c.is_ascii_alphanumeric();
        let is_space = c.is_ascii_whitespace();
        !(is_alphabet || is_digit || is_symbol || is_space)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resource_is_registered() {
        let r = get(0).expect("id 0 always registered");
        assert_eq!(r.normalize("Café"), "cafe");
    }

    #[test]
    fn unknown_resource_id_is_absent() {
        assert!(get(9999).is_none());
    }

    #[test]
    fn registering_overwrites_previous_resource() {
        #[derive(Debug)]
        struct Upper;
        impl NormalizeExpand for Upper {
            fn normalize(&self, text: &str) -> String {
                text.to_uppercase()
            }
        }
        register(42, Arc::new(Upper));
        assert_eq!(get(42).unwrap().normalize("abc"), "ABC");
    }

    #[test]
    fn ascii_text_is_not_cjk_like() {
        assert!(!is_cjk_like("hello, world! 123"));
    }

    #[test]
    fn non_ascii_codepoint_selects_string_mode() {
        assert!(is_cjk_like("日本語"));
        assert!(is_cjk_like("café")); // accented Latin also falls outside the ASCII test
    }
}
