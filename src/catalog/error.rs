use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::shape::ShapeError;
use crate::upstream::UpstreamError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("Not found")]
    NotFound,
    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Upstream(UpstreamError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream(UpstreamError::Connect { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Upstream(UpstreamError::Http { status, .. }) => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ApiError::Upstream(UpstreamError::Request { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Shape(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn detail(&self) -> &'static str {
        match self {
            ApiError::Upstream(UpstreamError::Timeout { .. }) => "Upstream timed out",
            ApiError::Upstream(UpstreamError::Connect { .. }) => {
                "Could not connect to upstream service"
            }
            ApiError::Upstream(UpstreamError::Http { .. }) => "Upstream service error",
            ApiError::Upstream(UpstreamError::Request { .. }) => "Upstream request failed",
            ApiError::Shape(_) => "Upstream returned a malformed movie record",
            ApiError::NotFound => "Not found.",
            ApiError::Encode(_) => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}
