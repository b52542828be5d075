//! Error response envelope shared by the HTTP surface.
//!
//! Success bodies are route-specific typed structs; only failures go
//! through the envelope so clients always get `{success:false, error:{…}}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Serialize)]
pub struct ApiError {
    /// Stable, machine-readable error code (e.g. "UNAUTHORIZED").
    pub code: &'static str,
    /// Human-friendly error message.
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ApiError {
                code,
                message: message.into(),
            },
        }
    }

    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}
