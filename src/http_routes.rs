use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;

use crate::error::PipelineError;
use crate::image_input::MAX_IMAGE_BYTES;
use crate::ingredients::DetectionOptions;
use crate::pipeline::AiPipeline;
use crate::recipe_store::LocalRecipeStore;

pub const MAX_UPLOAD_BYTES: usize = MAX_IMAGE_BYTES;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AiPipeline>,
    pub recipes: Arc<LocalRecipeStore>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_entries: usize,
    pub fresh_cache_entries: usize,
    pub saved_recipes: usize,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorResponse { error: message.to_string() })).into_response()
}

/// `/<secret>/<name>` when a secret is configured, otherwise `/<name>`.
pub fn scoped_path(secret_key: Option<&str>, name: &str) -> String {
    match secret_key.map(str::trim).filter(|secret| !secret.is_empty()) {
        Some(secret) => format!("/{secret}/{name}"),
        None => format!("/{name}"),
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.pipeline.cache_stats().await;
    Json(HealthResponse {
        status: "ok",
        cache_entries: stats.entries,
        fresh_cache_entries: stats.fresh,
        saved_recipes: state.recipes.list().await.len(),
    })
}

fn error_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Runs detection on an uploaded file body.
pub async fn detect_upload(
    pipeline: &AiPipeline,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Response {
    if let Some(content_type) = content_type {
        if !content_type.starts_with("image/") {
            return json_error(StatusCode::BAD_REQUEST, "file must be an image");
        }
    }
    if bytes.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "uploaded file is empty");
    }

    match pipeline
        .detect_ingredients(&STANDARD.encode(bytes), &DetectionOptions::default())
        .await
    {
        Ok(detection) => (StatusCode::OK, Json(detection)).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "upload detection failed");
            json_error(error_status(&err), &err.to_string())
        }
    }
}

pub async fn handle_detect_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let content_type = field.content_type().map(str::to_string);
                return match field.bytes().await {
                    Ok(bytes) => {
                        detect_upload(&state.pipeline, content_type.as_deref(), &bytes).await
                    }
                    Err(err) => {
                        json_error(StatusCode::BAD_REQUEST, &format!("failed to read file: {err}"))
                    }
                };
            }
            Ok(None) => return json_error(StatusCode::BAD_REQUEST, "missing `file` field"),
            Err(err) => {
                return json_error(StatusCode::BAD_REQUEST, &format!("failed to read form: {err}"));
            }
        }
    }
}
