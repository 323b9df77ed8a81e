//! PII redaction applied before any statement text leaves the process
//!
//! Three regex passes (addresses, account numbers, names) repeated until
//! nothing matches. Placeholders are chosen so no pattern matches them.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const NAME_PLACEHOLDER: &str = "[NOMBRE]";
pub const ACCOUNT_PLACEHOLDER: &str = "[CUENTA]";
pub const ADDRESS_PLACEHOLDER: &str = "[UBICACION]";

lazy_static! {
    /// Keyword up to the nearest postal code on the same line
    static ref ADDRESS: Regex = Regex::new(
        r"(?i)\b(?:calle|avenida|av\.|domicilio|direcci[oó]n|colonia)[^\n]*?\bC\.?\s?P\.?\s*\d{5}\b"
    )
    .unwrap();
    static ref ACCOUNT_NUMBER: Regex = Regex::new(r"\d{10,}").unwrap();
    /// At least 10 uppercase letters/spaces, starting and ending on a letter
    static ref UPPERCASE_NAME: Regex =
        Regex::new(r"[A-ZÁÉÍÓÚÜÑ][A-ZÁÉÍÓÚÜÑ ]{8,}[A-ZÁÉÍÓÚÜÑ]").unwrap();
}

/// Number of redactions per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionReport {
    pub names: usize,
    pub account_numbers: usize,
    pub addresses: usize,
}

impl RedactionReport {
    pub fn total(&self) -> usize {
        self.names + self.account_numbers + self.addresses
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedText {
    pub text: String,
    pub report: RedactionReport,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PiiSanitizer;

impl PiiSanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Redact addresses, account numbers and uppercase name runs.
    ///
    /// Addresses go first: their keywords are uppercase in most statements
    /// and would otherwise be swallowed by the name pass. A redaction can
    /// create a new word boundary, so the passes repeat until one finds
    /// nothing. Every match consumes unredacted input, which bounds the loop.
    pub fn sanitize(&self, text: &str) -> SanitizedText {
        let mut report = RedactionReport::default();
        let mut text = text.to_string();

        loop {
            let (next, pass) = sanitize_once(&text);
            if pass.total() == 0 {
                break;
            }
            report.addresses += pass.addresses;
            report.account_numbers += pass.account_numbers;
            report.names += pass.names;
            text = next;
        }

        SanitizedText { text, report }
    }
}

fn sanitize_once(text: &str) -> (String, RedactionReport) {
    let (text, addresses) = redact(&ADDRESS, text, ADDRESS_PLACEHOLDER);
    let (text, account_numbers) = redact(&ACCOUNT_NUMBER, &text, ACCOUNT_PLACEHOLDER);
    let (text, names) = redact(&UPPERCASE_NAME, &text, NAME_PLACEHOLDER);

    (
        text,
        RedactionReport {
            names,
            account_numbers,
            addresses,
        },
    )
}

fn redact(pattern: &Regex, text: &str, placeholder: &str) -> (String, usize) {
    let count = pattern.find_iter(text).count();
    if count == 0 {
        return (text.to_string(), 0);
    }
    let replaced = pattern.replace_all(text, regex::NoExpand(placeholder));
    (replaced.into_owned(), count)
}
