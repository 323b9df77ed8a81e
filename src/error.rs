//! Error types for the statement assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Document Errors
    // =============================

    #[error("Unsupported document type: {0}")]
    UnsupportedDocument(String),

    #[error("Document too large: {size} bytes (limit {limit})")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("Document is empty after extraction")]
    EmptyDocument,

    #[error("Document could not be read: {0}")]
    UnreadableDocument(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    // =============================
    // Pipeline & Conversation Errors
    // =============================

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conversation state error: {0}")]
    State(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AssistantError {
    /// Whether the user can fix this by retrying (re-uploading, re-entering a value).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AssistantError::UnsupportedDocument(_)
                | AssistantError::DocumentTooLarge { .. }
                | AssistantError::EmptyDocument
                | AssistantError::UnreadableDocument(_)
                | AssistantError::InvalidInput(_)
                | AssistantError::DecodeError(_)
        )
    }

    /// Localized message shown to the chat user.
    pub fn user_message(&self) -> String {
        match self {
            AssistantError::UnsupportedDocument(_) => {
                "Formato no soportado. Sube tu estado de cuenta en PDF o TXT.".to_string()
            }
            AssistantError::DocumentTooLarge { limit, .. } => format!(
                "El archivo es demasiado grande. El límite es de {} MB.",
                limit / (1024 * 1024)
            ),
            AssistantError::EmptyDocument => {
                "El archivo está vacío o no contiene texto legible. Intenta con otro documento."
                    .to_string()
            }
            AssistantError::UnreadableDocument(_) | AssistantError::DecodeError(_) => {
                "No pude leer el archivo. Verifica que no esté dañado y súbelo de nuevo."
                    .to_string()
            }
            AssistantError::InvalidInput(detail) => format!("Entrada inválida: {}", detail),
            _ => "Ocurrió un error crítico al procesar tu solicitud. Intenta de nuevo más tarde."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(AssistantError::EmptyDocument.is_recoverable());
        assert!(AssistantError::UnsupportedDocument("docx".into()).is_recoverable());
        assert!(!AssistantError::Llm("boom".into()).is_recoverable());
        assert!(!AssistantError::IoError(std::io::Error::other("disk")).is_recoverable());
    }

    #[test]
    fn test_fatal_errors_get_generic_message() {
        let msg = AssistantError::State("poisoned".into()).user_message();
        assert!(msg.contains("error crítico"));
        assert!(!msg.contains("poisoned"));
    }

    #[test]
    fn test_size_limit_message_in_megabytes() {
        let err = AssistantError::DocumentTooLarge {
            size: 30 * 1024 * 1024,
            limit: 20 * 1024 * 1024,
        };
        assert!(err.user_message().contains("20 MB"));
    }
}
