use statement_assistant::{
    advice::AdviceService,
    api::start_server,
    config::AssistantConfig,
    conversation::{ConversationDriver, InMemoryConversationStore},
    extraction::TextExtractor,
    gateway::ModelGateway,
    gemini::GeminiClient,
    pipeline::DocumentPipeline,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    let config = AssistantConfig::load()?;

    info!("🚀 Statement Assistant - API Server");
    info!("📍 Port: {}", config.api_port);
    info!(model = %config.gemini_model, attempts = config.retry.max_attempts, "Model gateway");

    // Create components
    let backend = Arc::new(GeminiClient::from_config(&config)?);
    let gateway = Arc::new(ModelGateway::new(backend, config.retry));
    let pipeline = Arc::new(
        DocumentPipeline::new(TextExtractor::with_tesseract(config.ocr_language.clone()), gateway.clone())
            .with_max_document_bytes(config.max_document_bytes),
    );
    let advice = Arc::new(AdviceService::new(gateway));
    let store = Arc::new(InMemoryConversationStore::new());

    let driver = Arc::new(ConversationDriver::new(pipeline, advice, store));

    info!("✅ Conversation driver initialized");
    info!("📡 Starting API server...");

    // Start API server
    start_server(driver, config.api_port).await?;

    Ok(())
}
