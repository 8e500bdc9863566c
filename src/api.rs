//! HTTP surface for chatdoc.
//!
//! - `POST /api/chat` relays `{messages, model?, max_tokens?}` to the completion provider and
//!   returns `{content, role, model}`.
//! - `POST /api/analyze` accepts a multipart upload (field `file`), extracts and summarizes it,
//!   and returns `{filename, summary, content_preview}`.
//! - `GET /` is a health check listing the endpoints.
//!
//! Every error leaves the router as `{"error": <detail>, "success": false}` with the matching
//! status code, including extractor rejections. CORS is fully open.

use crate::analysis::{AnalysisError, AnalysisResult, UploadedFile, ensure_within_limit};
use crate::chat::{ChatError, ChatReply, ChatRequest};
use crate::service::AssistantApi;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, State,
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Version reported by the health check.
pub const API_VERSION: &str = "1.0.0";
/// Path of the chat relay endpoint.
pub const CHAT_PATH: &str = "/api/chat";
/// Path of the document analysis endpoint.
pub const ANALYZE_PATH: &str = "/api/analyze";
/// Multipart field carrying the uploaded document.
pub const FILE_FIELD: &str = "file";

/// Request body ceiling; leaves room for multipart framing around a maximum-size file.
const MAX_REQUEST_BODY: usize = 8 * 1024 * 1024;

/// Build the HTTP router exposing the chat and analysis endpoints.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: AssistantApi + 'static,
{
    Router::new()
        .route("/", get(health_check))
        .route(CHAT_PATH, post(chat::<S>))
        .route(ANALYZE_PATH, post(analyze_file::<S>))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Response body for `GET /`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    api_version: &'static str,
    endpoints: HealthEndpoints,
}

#[derive(Serialize)]
struct HealthEndpoints {
    chat: &'static str,
    file_analysis: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "active",
        api_version: API_VERSION,
        endpoints: HealthEndpoints {
            chat: CHAT_PATH,
            file_analysis: ANALYZE_PATH,
        },
    })
}

/// Relay a conversation and return the assistant reply.
async fn chat<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError>
where
    S: AssistantApi,
{
    let Json(request) = payload?;
    let messages = request.messages.len();
    let reply = service.chat(request).await?;
    tracing::info!(model = %reply.model, messages, "Chat request completed");
    Ok(Json(reply))
}

/// Summarize an uploaded document.
///
/// The upload is streamed and abandoned with 413 as soon as it exceeds the size limit, whatever
/// its declared type; the remaining gates run inside the analysis pipeline.
async fn analyze_file<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResult>, ApiError>
where
    S: AssistantApi,
{
    let file = read_upload(multipart?).await?;
    let filename = file.filename.clone();
    let bytes = file.bytes.len();
    let result = service.analyze(file).await?;
    tracing::info!(
        filename = ?filename,
        bytes,
        summary_chars = result.summary.chars().count(),
        "Analysis request completed"
    );
    Ok(Json(result))
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadedFile, AnalysisError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            bytes.extend_from_slice(&chunk);
            ensure_within_limit(bytes.len())?;
        }

        return Ok(UploadedFile {
            filename,
            content_type,
            bytes,
        });
    }

    Err(AnalysisError::MissingFile)
}

fn multipart_error(error: MultipartError) -> AnalysisError {
    let status = error.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AnalysisError::TooLarge
    } else if status.is_client_error() {
        AnalysisError::InvalidUpload(error.body_text())
    } else {
        AnalysisError::Unexpected(error.body_text())
    }
}

/// Error envelope returned by every handler.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "Request failed");
        } else {
            tracing::warn!(status = %self.status, detail = %self.detail, "Request rejected");
        }
        (
            self.status,
            Json(json!({ "error": self.detail, "success": false })),
        )
            .into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        let status = match error {
            ChatError::EmptyMessages => StatusCode::BAD_REQUEST,
            ChatError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(error: AnalysisError) -> Self {
        let status = match error {
            AnalysisError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ref other if other.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}
