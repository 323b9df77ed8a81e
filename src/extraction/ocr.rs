//! Page OCR for scanned statements
//!
//! Renders pages with poppler's `pdftoppm` and reads them with `tesseract`.
//! Both tools are optional at runtime; their absence is an OCR failure and
//! the extractor falls back to the PDF text layer.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::AssistantError;
use crate::Result;

/// Turns a PDF into text by recognizing rendered pages
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, pdf_path: &Path) -> Result<String>;
}

pub struct TesseractOcr {
    language: String,
    dpi: u32,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            dpi: 300,
        }
    }

    async fn render_pages(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let prefix = out_dir.join("page");
        let output = Command::new("pdftoppm")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .await
            .map_err(|e| AssistantError::Ocr(format!("pdftoppm unavailable: {}", e)))?;

        if !output.status.success() {
            return Err(AssistantError::Ocr(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("png") {
                pages.push(path);
            }
        }
        // pdftoppm zero-pads page numbers, so lexical order is page order
        pages.sort();
        Ok(pages)
    }

    async fn recognize_page(&self, image: &Path) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|e| AssistantError::Ocr(format!("tesseract unavailable: {}", e)))?;

        if !output.status.success() {
            return Err(AssistantError::Ocr(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, pdf_path: &Path) -> Result<String> {
        let work_dir = tempfile::tempdir()?;
        let pages = self.render_pages(pdf_path, work_dir.path()).await?;
        if pages.is_empty() {
            return Err(AssistantError::Ocr("no pages rendered".to_string()));
        }

        let mut text = String::new();
        for page in &pages {
            text.push_str(&self.recognize_page(page).await?);
            text.push('\n');
        }

        debug!(pages = pages.len(), chars = text.len(), "OCR finished");
        Ok(text)
    }
}

/// OCR disabled; every PDF goes straight to the text layer
pub struct NoOcr;

#[async_trait]
impl OcrEngine for NoOcr {
    async fn recognize(&self, _pdf_path: &Path) -> Result<String> {
        Err(AssistantError::Ocr("OCR disabled".to_string()))
    }
}
