//! REST API Server for the statement assistant
//!
//! Exposes the conversation driver over HTTP so any chat bridge can forward
//! user events and render the replies.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::conversation::{ConversationDriver, InboundEvent};
use crate::Result;

/// =============================
/// Request Models
/// =============================

/// Wire form of an inbound event; documents travel base64-encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventRequest {
    Command { name: String },
    Text { text: String },
    Callback { data: String },
    Document { file_name: String, content_base64: String },
}

impl EventRequest {
    pub fn into_event(self) -> Result<InboundEvent> {
        Ok(match self {
            EventRequest::Command { name } => InboundEvent::Command { name },
            EventRequest::Text { text } => InboundEvent::Text { text },
            EventRequest::Callback { data } => InboundEvent::Callback { data },
            EventRequest::Document {
                file_name,
                content_base64,
            } => InboundEvent::Document {
                file_name,
                bytes: base64::engine::general_purpose::STANDARD.decode(content_base64.trim())?,
            },
        })
    }
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub driver: Arc<ConversationDriver>,
}

/// =============================
/// Helpers
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

/// Chat ids from bridges are usually numeric; map them to stable UUIDs
pub fn conversation_uuid(value: &str) -> uuid::Uuid {
    let value = value.trim();
    uuid::Uuid::parse_str(value).unwrap_or_else(|_| stable_uuid_from_string(value))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Conversation Endpoints
/// =============================

async fn post_event(
    State(state): State<ApiState>,
    Path(conversation_id): Path<String>,
    Json(req): Json<EventRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let conversation = conversation_uuid(&conversation_id);

    let event = match req.into_event() {
        Ok(event) => event,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(e.user_message())),
            )
        }
    };

    info!(%conversation, event = event.kind(), "Received conversation event");

    let replies = state.driver.handle(conversation, event).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "conversation_id": conversation.to_string(),
            "replies": replies,
        }))),
    )
}

async fn delete_conversation(
    State(state): State<ApiState>,
    Path(conversation_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let conversation = conversation_uuid(&conversation_id);
    match state.driver.forget(conversation).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "conversation_id": conversation.to_string(),
            }))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to reset conversation: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(driver: Arc<ConversationDriver>) -> Router {
    let state = ApiState { driver };

    Router::new()
        .route("/health", get(health))
        .route("/api/conversations/:conversation_id/events", post(post_event))
        .route(
            "/api/conversations/:conversation_id",
            axum::routing::delete(delete_conversation),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    driver: Arc<ConversationDriver>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(driver);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::AdviceService;
    use crate::conversation::InMemoryConversationStore;
    use crate::extraction::{NoOcr, TextExtractor};
    use crate::gateway::testing::{gateway_with, ScriptedBackend};
    use crate::pipeline::DocumentPipeline;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SUMMARY_JSON: &str = r#"{"resumen": {"saldo_inicial": 1000, "saldo_final": 812.53, "total_ingresos": 500, "total_egresos": 687.47},
 "transacciones": [{"fecha": "2024-05-02", "descripcion": "PAGO PRESTAMO", "monto": 400, "tipo": "egreso", "categoria_sugerida": "Préstamo"}]}"#;

    fn router(responses: &[&str]) -> Router {
        let backend = Arc::new(ScriptedBackend::replying(responses));
        let gateway = Arc::new(gateway_with(backend, 3));
        let pipeline = Arc::new(DocumentPipeline::new(
            TextExtractor::new(Arc::new(NoOcr)),
            gateway.clone(),
        ));
        let driver = ConversationDriver::new(
            pipeline,
            Arc::new(AdviceService::new(gateway)),
            Arc::new(InMemoryConversationStore::new()),
        );
        create_router(Arc::new(driver))
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_conversation_uuid_is_stable() {
        let a = conversation_uuid("123456789");
        assert_eq!(a, conversation_uuid("123456789"));
        assert_ne!(a, conversation_uuid("987654321"));
        assert_eq!(a.get_version_num(), 4);

        let explicit = uuid::Uuid::new_v4();
        assert_eq!(conversation_uuid(&explicit.to_string()), explicit);
    }

    #[test]
    fn test_document_request_decodes_base64() {
        let req: EventRequest = serde_json::from_value(serde_json::json!({
            "type": "document",
            "file_name": "estado.txt",
            "content_base64": "U2FsZG8gMTA="
        }))
        .unwrap();
        match req.into_event().unwrap() {
            InboundEvent::Document { file_name, bytes } => {
                assert_eq!(file_name, "estado.txt");
                assert_eq!(bytes, b"Saldo 10");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(&[])
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_document_event_returns_summary_and_menu() {
        let (status, body) = post_json(
            router(&[SUMMARY_JSON]),
            "/api/conversations/42/events",
            serde_json::json!({
                "type": "document",
                "file_name": "estado.txt",
                "content_base64": "U2FsZG8gZmluYWwgODEyLjUz"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(
            body["data"]["conversation_id"],
            conversation_uuid("42").to_string()
        );
        let replies = body["data"]["replies"].as_array().unwrap();
        assert!(replies[0]["text"]
            .as_str()
            .unwrap()
            .contains("Saldo Final: 812.53"));
        let buttons: Vec<&str> = replies[1]["keyboard"]
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|row| row.as_array().unwrap())
            .map(|b| b["callback_data"].as_str().unwrap())
            .collect();
        assert!(buttons.contains(&"plan_deudas"));
    }

    #[tokio::test]
    async fn test_invalid_base64_is_bad_request() {
        let (status, body) = post_json(
            router(&[]),
            "/api/conversations/42/events",
            serde_json::json!({
                "type": "document",
                "file_name": "estado.pdf",
                "content_base64": "%%% not base64 %%%"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_command_event() {
        let (status, body) = post_json(
            router(&[]),
            "/api/conversations/chat-7/events",
            serde_json::json!({"type": "command", "name": "/start"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["replies"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("¡Bienvenido!"));
    }
}
