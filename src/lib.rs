//! Bank Statement Assistant
//!
//! A chat assistant that:
//! - Accepts bank statements as PDF or plain text
//! - Extracts text (OCR first, PDF text layer as fallback)
//! - Normalizes and redacts personal data before anything leaves the process
//! - Asks a generative model for a structured summary, with bounded retries
//! - Derives follow-up actions from deterministic rules
//! - Generates advice for the action the user picks
//!
//! DOCUMENT FLOW:
//! UPLOAD → EXTRACT → NORMALIZE → SANITIZE → MODEL → PARSE → ACTIONS → MENU

pub mod actions;
pub mod advice;
pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod extraction;
pub mod gateway;
pub mod gemini;
pub mod models;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod sanitizer;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use actions::derive_actions;
pub use conversation::{ConversationDriver, ConversationState, InboundEvent, Reply};
pub use gateway::{ModelBackend, ModelGateway, OutputMode, RetryPolicy};
pub use pipeline::{DocumentPipeline, PipelineOutput};
