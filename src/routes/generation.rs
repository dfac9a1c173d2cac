use super::{AppError, AppJson, ErrorResponse};
use crate::{
    generation::{normalize, NormalizedPayload, UpstreamResult},
    state::AppState,
};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::Value;
use std::sync::Arc;

const OPENAPI_TAG: &str = "Generation";

/// Generate image
///
/// Normalize the request and forward it to the Stability text-to-image API.
/// `modelId` selects the upstream model and is not forwarded. Upstream
/// rejections are relayed with their original status and body.
#[utoipa::path(
    post,
    path = "/generateStabilityImage",
    request_body(content = NormalizedPayload, content_type = "application/json"),
    responses((
        status = OK,
        description = "Upstream generation result, relayed as is.",
    ), (
        status = BAD_REQUEST,
        description = "Body is not valid JSON.",
        body = ErrorResponse
    ), (
        status = PAYLOAD_TOO_LARGE,
        description = "Body exceeds the request size limit.",
        body = ErrorResponse
    ), (
        status = INTERNAL_SERVER_ERROR,
        description = "API key missing, or upstream kept failing.",
        body = ErrorResponse
    )),
    tag = OPENAPI_TAG
)]
#[tracing::instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn generate_image(
    State(app_state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    let client = app_state.stability_client().ok_or(AppError::MissingApiKey)?;

    let body = body?;
    let inbound = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&body).map_err(AppError::InvalidBody)?
    };
    tracing::debug!("received payload: {}", inbound);

    let (payload, model) = normalize(&inbound);
    tracing::info!("target model: {}", model);
    match &payload.style_preset {
        Some(style_preset) => tracing::info!("style preset: {}", style_preset),
        None => tracing::debug!("no style preset provided"),
    }
    tracing::debug!(
        "final payload: {}",
        serde_json::to_string(&payload).unwrap_or_default()
    );

    let response = match client.generate(&model, &payload).await? {
        UpstreamResult::Success(body) => (StatusCode::OK, AppJson(body)).into_response(),
        UpstreamResult::Rejected { status, body } => (status, AppJson(body)).into_response(),
    };

    Ok(response)
}

pub fn generation_routes() -> Router<Arc<AppState>> {
    Router::new().route("/generateStabilityImage", post(generate_image))
}
