//! Raw text acquisition from uploaded statements
//!
//! PDF: OCR first, embedded text layer as fallback. TXT: strict UTF-8 read.
//! An empty result is not an error here; the pipeline decides what empty means.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AssistantError;
use crate::models::DocumentKind;
use crate::Result;

pub mod ocr;
pub use ocr::{NoOcr, OcrEngine, TesseractOcr};

pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    pub fn with_tesseract(language: impl Into<String>) -> Self {
        Self::new(Arc::new(TesseractOcr::new(language)))
    }

    pub async fn extract(&self, path: &Path, kind: DocumentKind) -> Result<String> {
        match kind {
            DocumentKind::Txt => read_utf8(path).await,
            DocumentKind::Pdf => Ok(self.extract_pdf(path).await),
        }
    }

    async fn extract_pdf(&self, path: &Path) -> String {
        match self.ocr.recognize(path).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(chars = text.len(), "Text obtained via OCR");
                return text;
            }
            Ok(_) => warn!("OCR produced no text, falling back to text layer"),
            Err(e) => warn!(error = %e, "OCR failed, falling back to text layer"),
        }

        match extract_text_layer(path.to_path_buf()).await {
            Ok(text) => {
                info!(chars = text.len(), "Text obtained from PDF text layer");
                text
            }
            Err(e) => {
                warn!(error = %e, "PDF text layer extraction failed");
                String::new()
            }
        }
    }
}

async fn read_utf8(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    String::from_utf8(bytes)
        .map_err(|e| AssistantError::UnreadableDocument(format!("invalid UTF-8: {}", e)))
}

/// `pdf-extract` is synchronous and may panic on hostile files; keep it off
/// the async workers and turn panics into errors.
async fn extract_text_layer(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
        .await
        .map_err(|e| AssistantError::UnreadableDocument(format!("PDF parser crashed: {}", e)))?
        .map_err(|e| AssistantError::UnreadableDocument(e.to_string()))
}
