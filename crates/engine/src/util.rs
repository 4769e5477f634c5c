//! Internal helpers for text normalization and id parsing.
//!
//! These utilities are **not** part of the public API. Name lookups are
//! case- and diacritic-insensitive, so every stored name carries a derived
//! `name_key` produced here.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{EngineError, ResultEngine};

/// Trim and validate a user-supplied display name.
pub(crate) fn normalize_display(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Derive the lookup key for a display name: NFKD, combining marks stripped,
/// lowercased, inner whitespace collapsed.
pub(crate) fn normalize_key(value: &str) -> String {
    let stripped: String = value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
