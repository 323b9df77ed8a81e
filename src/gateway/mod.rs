//! Model gateway: the only path from the pipeline to the generative model
//!
//! Wraps a `ModelBackend` with a bounded retry policy. When the budget is
//! spent the gateway answers with a sentinel payload instead of an error,
//! so callers can keep going without exception handling.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::Result;

pub mod retry;
pub use retry::{retry, RetryExhausted, RetryPolicy};

/// User-facing message carried by sentinel payloads
pub const MODEL_UNAVAILABLE_MESSAGE: &str = "El servicio de análisis no está disponible en este momento.";

/// Sentence returned in text mode when every attempt failed
pub const MODEL_UNAVAILABLE_TEXT: &str =
    "No pude generar una respuesta en este momento. Intenta de nuevo en unos minutos.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Constrained JSON output
    Json,
    /// Free prose
    Text,
}

impl OutputMode {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputMode::Json => "application/json",
            OutputMode::Text => "text/plain",
        }
    }

    /// Payload returned after the retry budget is exhausted
    pub fn sentinel(&self) -> String {
        match self {
            OutputMode::Json => {
                serde_json::json!({ "error": MODEL_UNAVAILABLE_MESSAGE }).to_string()
            }
            OutputMode::Text => MODEL_UNAVAILABLE_TEXT.to_string(),
        }
    }
}

/// Black-box text completion service
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// One completion attempt
    async fn complete(&self, prompt: &str, mode: OutputMode) -> Result<String>;
}

/// Explicitly constructed gateway; share it via `Arc`
pub struct ModelGateway {
    backend: Arc<dyn ModelBackend>,
    policy: RetryPolicy,
}

impl ModelGateway {
    pub fn new(backend: Arc<dyn ModelBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generate a completion; never fails.
    pub async fn generate(&self, prompt: &str, mode: OutputMode) -> String {
        let backend = &self.backend;
        let outcome = retry(&self.policy, "model_completion", |_attempt| {
            backend.complete(prompt, mode)
        })
        .await;

        match outcome {
            Ok(text) => {
                info!(?mode, chars = text.len(), "Model response received");
                text
            }
            Err(exhausted) => {
                error!(
                    ?mode,
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "Model unavailable, returning sentinel"
                );
                mode.sentinel()
            }
        }
    }

    pub async fn generate_json(&self, prompt: &str) -> String {
        self.generate(prompt, OutputMode::Json).await
    }

    pub async fn generate_text(&self, prompt: &str) -> String {
        self.generate(prompt, OutputMode::Text).await
    }
}
