//! Text normalization for extracted statement text
//!
//! OCR output is noisy: stray glyphs, runs of spaces from column layouts, tabs.
//! Normalization keeps line structure and a narrow character set.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HORIZONTAL_WS: Regex = Regex::new(r"[ \t]+").unwrap();
}

/// Characters kept besides ASCII letters and digits
const ALLOWED_EXTRA: &[char] = &[
    'á', 'é', 'í', 'ó', 'ú', 'ü', 'ñ', 'Á', 'É', 'Í', 'Ó', 'Ú', 'Ü', 'Ñ', // accented Latin
    ' ', '\t', '\n', // whitespace
    '.', ',', '$', ':', '€', '-', '/', // punctuation & currency
];

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || ALLOWED_EXTRA.contains(&c)
}

/// Filter to the allow-list, collapse horizontal whitespace, trim.
///
/// Filtering runs before collapsing so that removed glyphs cannot leave
/// new whitespace runs behind; this keeps `normalize` idempotent.
pub fn normalize(text: &str) -> String {
    let filtered: String = text.chars().filter(|c| is_allowed(*c)).collect();
    HORIZONTAL_WS
        .replace_all(&filtered, " ")
        .trim()
        .to_string()
}
