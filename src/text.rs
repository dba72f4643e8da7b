//! Accent- and case-insensitive keys for Portuguese text.
//!
//! SQLite's `LOWER` folds ASCII only, so matching is done against keys computed
//! here and stored next to the original columns.

use unicode_normalization::UnicodeNormalization;

/// Lowercase, strip combining marks and collapse whitespace.
pub fn chave(texto: &str) -> String {
    texto
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `None` when the key is empty.
pub fn chave_opcional(texto: &str) -> Option<String> {
    Some(chave(texto)).filter(|k| !k.is_empty())
}
