use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const MISSING_PARAMETERS: &str = "Missing required parameters";
const GENERIC_INTERNAL_MESSAGE: &str = "An unexpected error occurred";

// ==============================================================================
// Error Type
// ==============================================================================

pub(crate) enum AppError {
    /// One of the required filter parameters is absent or empty.
    MissingParameters,
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl AppError {
    /// Logs `detail` and builds a 500 whose message carries it only when
    /// `expose_details` is set.
    pub(super) fn internal(expose_details: bool, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(error = %detail, "request failed");
        if expose_details {
            Self::Internal(detail)
        } else {
            Self::Internal(GENERIC_INTERNAL_MESSAGE.to_string())
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
    timestamp: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::MissingParameters => (
                StatusCode::BAD_REQUEST,
                MISSING_PARAMETERS,
                "payerID, query, and accountFrom are required".to_string(),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Invalid parameters", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", msg),
            Self::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                msg,
            ),
        };

        let body = ErrorBody {
            success: false,
            error,
            message,
            timestamp: now_rfc3339().unwrap_or_default(),
        };
        (status, Json(body)).into_response()
    }
}

pub(super) fn now_rfc3339() -> Result<String, time::error::Format> {
    OffsetDateTime::now_utc().format(&Rfc3339)
}

/// Converts a caught handler panic into the standard 500 body.
pub(super) fn panic_response(panic: Box<dyn Any + Send + 'static>, expose_details: bool) -> Response {
    let detail = if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else {
        "handler panicked".to_string()
    };
    AppError::internal(expose_details, format!("handler panicked: {detail}")).into_response()
}
