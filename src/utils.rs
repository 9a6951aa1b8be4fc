// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Diacritic-insensitive text normalization, shared by the default
//! normalization resource (see [`crate::normalize`]) and the CLI's query echo.

use unicode_normalization::UnicodeNormalization;

/// Normalize a string for indexing/search: NFD-decompose, drop combining
/// marks, lowercase, collapse whitespace.
///
/// - "café" → "cafe"
/// - "naïve" → "naive"
pub fn normalize(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Combining marks (Unicode category Mn), the ranges actually produced by
/// NFD-decomposing Latin, Greek, and Cyrillic diacritics.
fn is_combining_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}' |
        '\u{1DC0}'..='\u{1DFF}' |
        '\u{20D0}'..='\u{20FF}' |
        '\u{FE20}'..='\u{FE2F}'
    )
}
