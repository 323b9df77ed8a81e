//! Defensive parsing of model output into a `FinancialSummary`
//!
//! The model is an unpredictable text generator; nothing here may fail.

use serde_json::Value;
use tracing::warn;

use crate::models::FinancialSummary;

pub const MALFORMED_OUTPUT_MESSAGE: &str = "La IA no devolvió un JSON válido.";

/// Remove a surrounding Markdown code fence (```json ... ``` or ``` ... ```)
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json", "JSON", ...) up to the first newline
    let body = match rest.find('\n') {
        Some(idx) if rest[..idx].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[idx + 1..]
        }
        _ => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse raw model output. Malformed input yields a zeroed summary whose
/// `error()` is set; an `{"error": ...}` payload is surfaced as that error.
pub fn parse_summary(raw: &str) -> FinancialSummary {
    let cleaned = strip_code_fence(raw);

    let value: Value = match serde_json::from_str(cleaned) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, chars = raw.len(), "Model output is not JSON");
            return FinancialSummary::failed(MALFORMED_OUTPUT_MESSAGE);
        }
    };

    let Value::Object(map) = value else {
        warn!("Model output is JSON but not an object");
        return FinancialSummary::failed(MALFORMED_OUTPUT_MESSAGE);
    };

    if let Some(error) = map.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return FinancialSummary::failed(message);
    }

    match serde_json::from_value::<FinancialSummary>(Value::Object(map)) {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "Model output does not match the summary schema");
            FinancialSummary::failed(MALFORMED_OUTPUT_MESSAGE)
        }
    }
}
