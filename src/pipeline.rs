//! Document-to-summary pipeline
//!
//! UPLOAD → TEMP FILE → EXTRACT → NORMALIZE → SANITIZE → MODEL → PARSE
//!
//! Model problems come back inside the summary (`error()`); only document and
//! I/O problems are returned as `Err`.

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AssistantError;
use crate::extraction::TextExtractor;
use crate::gateway::ModelGateway;
use crate::models::{FinancialSummary, RawDocument};
use crate::normalizer::normalize;
use crate::parser::parse_summary;
use crate::prompts;
use crate::sanitizer::{PiiSanitizer, RedactionReport};
use crate::Result;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub summary: FinancialSummary,
    pub redactions: RedactionReport,
}

pub struct DocumentPipeline {
    extractor: TextExtractor,
    sanitizer: PiiSanitizer,
    gateway: Arc<ModelGateway>,
    max_document_bytes: Option<usize>,
    temp_dir: Option<PathBuf>,
}

impl DocumentPipeline {
    pub fn new(extractor: TextExtractor, gateway: Arc<ModelGateway>) -> Self {
        Self {
            extractor,
            sanitizer: PiiSanitizer::new(),
            gateway,
            max_document_bytes: None,
            temp_dir: None,
        }
    }

    pub fn with_max_document_bytes(mut self, limit: usize) -> Self {
        self.max_document_bytes = Some(limit);
        self
    }

    /// Directory for scoped upload copies (system temp dir by default)
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub async fn process(&self, document: RawDocument) -> Result<PipelineOutput> {
        let kind = document.kind()?;
        let size = document.bytes.len();
        if let Some(limit) = self.max_document_bytes {
            if size > limit {
                return Err(AssistantError::DocumentTooLarge { size, limit });
            }
        }

        let digest = hex::encode(Sha256::digest(&document.bytes));
        info!(%digest, size, kind = kind.extension(), "Processing document");

        // Removed when dropped, whichever way this function returns
        let suffix = format!(".{}", kind.extension());
        let temp = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("statement-").suffix(&suffix);
            match &self.temp_dir {
                Some(dir) => builder.tempfile_in(dir)?,
                None => builder.tempfile()?,
            }
        };
        tokio::fs::write(temp.path(), &document.bytes).await?;
        drop(document);

        let raw_text = self.extractor.extract(temp.path(), kind).await?;
        if raw_text.trim().is_empty() {
            warn!(%digest, "Document is empty after extraction");
            return Err(AssistantError::EmptyDocument);
        }

        let normalized = normalize(&raw_text);
        if normalized.is_empty() {
            warn!(%digest, "Document has no usable characters after normalization");
            return Err(AssistantError::EmptyDocument);
        }

        let sanitized = self.sanitizer.sanitize(&normalized);
        info!(
            %digest,
            chars = sanitized.text.len(),
            names = sanitized.report.names,
            account_numbers = sanitized.report.account_numbers,
            addresses = sanitized.report.addresses,
            "Document sanitized"
        );

        let raw_response = self
            .gateway
            .generate_json(&prompts::summary_extraction(&sanitized.text))
            .await;
        let summary = parse_summary(&raw_response);

        match summary.error() {
            Some(error) => warn!(%digest, error, "Summary unavailable"),
            None => info!(
                %digest,
                transactions = summary.transactions.len(),
                "Summary extracted"
            ),
        }

        Ok(PipelineOutput {
            summary,
            redactions: sanitized.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::NoOcr;
    use crate::gateway::testing::{gateway_with, ScriptedBackend};
    use crate::gateway::MODEL_UNAVAILABLE_MESSAGE;
    use crate::parser::MALFORMED_OUTPUT_MESSAGE;

    const SUMMARY_JSON: &str = r#"```json
{"resumen": {"saldo_inicial": 1000, "saldo_final": 812.53, "total_ingresos": 500, "total_egresos": 687.47},
 "transacciones": [{"fecha": "2024-05-02", "descripcion": "PAGO PRESTAMO", "monto": 400, "tipo": "egreso", "categoria_sugerida": "Préstamo"}],
 "insights_detectados": {"pagos_recurrentes": [], "fuentes_ingreso": ["Nómina"], "comisiones_bancarias": 0}}
```"#;

    fn pipeline(backend: Arc<ScriptedBackend>) -> DocumentPipeline {
        DocumentPipeline::new(
            TextExtractor::new(Arc::new(NoOcr)),
            Arc::new(gateway_with(backend, 3)),
        )
    }

    #[tokio::test]
    async fn test_zero_byte_file_never_reaches_model() {
        let backend = Arc::new(ScriptedBackend::replying(&[SUMMARY_JSON]));
        let pipeline = pipeline(backend.clone());

        for name in ["vacio.txt", "vacio.pdf"] {
            let err = pipeline
                .process(RawDocument::new(name, Vec::new()))
                .await
                .unwrap_err();
            assert!(matches!(err, AssistantError::EmptyDocument), "{}", name);
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_only_is_empty() {
        let backend = Arc::new(ScriptedBackend::new());
        let err = pipeline(backend.clone())
            .process(RawDocument::new("blank.txt", b" \n\t \n".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::EmptyDocument));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let backend = Arc::new(ScriptedBackend::new());
        let err = pipeline(backend)
            .process(RawDocument::new("estado.docx", b"hola".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::UnsupportedDocument(_)));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let backend = Arc::new(ScriptedBackend::new());
        let err = pipeline(backend)
            .with_max_document_bytes(4)
            .process(RawDocument::new("grande.txt", b"12345".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::DocumentTooLarge { size: 5, limit: 4 }));
    }

    #[tokio::test]
    async fn test_text_statement_to_summary() {
        let backend = Arc::new(ScriptedBackend::replying(&[SUMMARY_JSON]));
        let statement = "Titular: JUAN PEREZ LOPEZ\nCuenta 0123456789012\n\
                         Saldo inicial   $1,000.00\nPago prestamo 400.00\nSaldo final 812.53";

        let output = pipeline(backend.clone())
            .process(RawDocument::new("estado.TXT", statement.as_bytes().to_vec()))
            .await
            .unwrap();

        assert!(!output.summary.is_error());
        assert_eq!(output.summary.resumen.closing_balance, 812.53);
        assert!(output.summary.has_loans());
        assert_eq!(output.redactions.names, 1);
        assert_eq!(output.redactions.account_numbers, 1);

        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 1);
        let (prompt, mode) = &prompts[0];
        assert_eq!(*mode, crate::gateway::OutputMode::Json);
        assert!(!prompt.contains("JUAN PEREZ"));
        assert!(!prompt.contains("0123456789012"));
        assert!(prompt.contains("Saldo inicial $1,000.00"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_large_statement_written_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::replying(&[SUMMARY_JSON]));
        let mut statement = "Movimiento 1.00\n".repeat(20_000);
        statement.push_str("Saldo final 812.53");

        let output = pipeline(backend.clone())
            .with_temp_dir(dir.path())
            .process(RawDocument::new("largo.txt", statement.into_bytes()))
            .await
            .unwrap();

        assert!(!output.summary.is_error());
        let (prompt, _) = &backend.prompts()[0];
        assert_eq!(prompt.matches("Movimiento 1.00").count(), 20_000);
        assert!(prompt.contains("Saldo final 812.53"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_model_outage_yields_error_summary() {
        let backend = Arc::new(ScriptedBackend::new());
        let output = pipeline(backend.clone())
            .process(RawDocument::new("estado.txt", b"Saldo final 10".to_vec()))
            .await
            .unwrap();

        assert_eq!(backend.calls(), 3);
        assert_eq!(output.summary.error(), Some(MODEL_UNAVAILABLE_MESSAGE));
    }

    #[tokio::test]
    async fn test_malformed_model_output_yields_error_summary() {
        let backend = Arc::new(ScriptedBackend::replying(&["Claro, aquí tienes el resumen"]));
        let output = pipeline(backend)
            .process(RawDocument::new("estado.txt", b"Saldo final 10".to_vec()))
            .await
            .unwrap();
        assert_eq!(output.summary.error(), Some(MALFORMED_OUTPUT_MESSAGE));
    }

    #[tokio::test]
    async fn test_temp_file_removed_on_every_path() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::replying(&[SUMMARY_JSON]));
        let p = pipeline(backend).with_temp_dir(dir.path());

        // empty document, malformed UTF-8, success, model outage
        let _ = p.process(RawDocument::new("a.txt", Vec::new())).await;
        let _ = p.process(RawDocument::new("b.txt", vec![0xff, 0xfe])).await;
        let ok = p.process(RawDocument::new("c.txt", b"Saldo 1".to_vec())).await;
        assert!(ok.is_ok());
        let _ = p.process(RawDocument::new("d.txt", b"Saldo 2".to_vec())).await;

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
