pub mod generation;

use crate::generation::ForwardError;
use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

// Wrapper around `axum::Json` so every body this service writes goes through
// one place.
pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetails {
    pub message: String,
}

/// Body of every failed response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

pub enum AppError {
    MissingApiKey,
    BodyRejection(BytesRejection),
    InvalidBody(serde_json::Error),
    Upstream(ForwardError),
}

// Tell axum how `AppError` should be converted into a response.
//
// This is also a convenient place to log errors.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::MissingApiKey => {
                tracing::error!("missing STABILITY_KEY");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Server Configuration Error: API Key missing.".to_string(),
                        details: None,
                    },
                )
            }
            AppError::BodyRejection(rejection) => {
                // This error is caused by bad user input so don't log it
                (
                    rejection.status(),
                    ErrorResponse {
                        error: "Invalid request body".to_string(),
                        details: Some(ErrorDetails {
                            message: rejection.body_text(),
                        }),
                    },
                )
            }
            AppError::InvalidBody(error) => {
                // This error is caused by bad user input so don't log it
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: "Invalid JSON body".to_string(),
                        details: Some(ErrorDetails {
                            message: error.to_string(),
                        }),
                    },
                )
            }
            AppError::Upstream(error) => {
                tracing::error!("stability request failed: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Stability API Error".to_string(),
                        details: Some(ErrorDetails {
                            message: error.to_string(),
                        }),
                    },
                )
            }
        };

        (status, AppJson(body)).into_response()
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        Self::BodyRejection(rejection)
    }
}

impl From<ForwardError> for AppError {
    fn from(error: ForwardError) -> Self {
        Self::Upstream(error)
    }
}

pub async fn health_check() -> &'static str {
    "ok"
}
