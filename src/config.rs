//! Environment-driven configuration
//!
//! Values come from the process environment, optionally seeded by a `.env`
//! file (see `AssistantConfig::load`).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AssistantError;
use crate::gateway::RetryPolicy;
use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::Result;

const DEFAULT_MAX_DOCUMENT_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub ocr_language: String,
    pub max_document_bytes: usize,
    pub api_port: u16,
}

impl AssistantConfig {
    /// Load `.env` (if present) and read the environment
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `load` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let gemini_api_key = get("GEMINI_API_KEY")
            .or_else(|| get("GOOGLE_AI_KEY"))
            .ok_or_else(|| {
                AssistantError::Config("GEMINI_API_KEY (or GOOGLE_AI_KEY) is not set".to_string())
            })?;

        let defaults = RetryPolicy::default();
        let max_attempts: u32 = parse_or(&get, "MODEL_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(AssistantError::Config(
                "MODEL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let delay_ms: u64 = parse_or(
            &get,
            "MODEL_RETRY_DELAY_MS",
            defaults.initial_delay.as_millis() as u64,
        )?;

        let port_value = get("PORT").or_else(|| get("API_PORT"));
        let api_port = match port_value {
            Some(v) => v
                .parse()
                .map_err(|_| AssistantError::Config(format!("invalid port '{}'", v)))?,
            None => 8080,
        };

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            retry: RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(delay_ms),
                ..defaults
            },
            request_timeout: Duration::from_secs(parse_or(&get, "MODEL_TIMEOUT_SECS", 60)?),
            ocr_language: get("OCR_LANGUAGE").unwrap_or_else(|| "spa".to_string()),
            max_document_bytes: parse_or(
                &get,
                "MAX_DOCUMENT_BYTES",
                DEFAULT_MAX_DOCUMENT_BYTES,
            )?,
            api_port,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AssistantError::Config(format!("invalid value for {}: '{}'", key, raw))),
        None => Ok(default),
    }
}
