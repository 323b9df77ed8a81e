use statement_assistant::{
    actions::derive_actions,
    config::AssistantConfig,
    extraction::TextExtractor,
    gateway::ModelGateway,
    gemini::GeminiClient,
    models::RawDocument,
    pipeline::DocumentPipeline,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// One-shot analysis of a local statement: `analyze <file.pdf|file.txt>`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: analyze <estado_de_cuenta.pdf|.txt>");
        std::process::exit(2);
    };

    let config = AssistantConfig::load()?;

    let backend = Arc::new(GeminiClient::from_config(&config)?);
    let gateway = Arc::new(ModelGateway::new(backend, config.retry));
    let pipeline = DocumentPipeline::new(TextExtractor::with_tesseract(config.ocr_language.clone()), gateway)
        .with_max_document_bytes(config.max_document_bytes);

    let file_name = Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.clone());
    let bytes = tokio::fs::read(&path).await?;

    info!(file = %file_name, size = bytes.len(), "Analyzing statement");

    let output = match pipeline.process(RawDocument::new(file_name, bytes)).await {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(Box::new(e) as Box<dyn std::error::Error>);
        }
    };

    if let Some(error) = output.summary.error() {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }

    let actions = derive_actions(&output.summary);

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "summary": output.summary,
            "redactions": {
                "names": output.redactions.names,
                "account_numbers": output.redactions.account_numbers,
                "addresses": output.redactions.addresses,
            },
            "actions": actions,
        }))?
    );

    Ok(())
}
