//! API error types with JSON `{"detail": ...}` responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::booking::LedgerError;
use crate::conversation::TurnError;
use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::report_gate::GateError;

/// Error response body. The client reads `detail`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Access locked")]
    Locked { retry_after: u64 },
    #[error("Report not ready")]
    ReportNotReady,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail.clone()),
            ApiError::Locked { retry_after } => (
                StatusCode::LOCKED,
                format!("Too many attempts. Try again in {retry_after}s"),
            ),
            ApiError::ReportNotReady => (
                StatusCode::CONFLICT,
                "Report is not ready yet. Please try again after your sample is processed."
                    .to_string(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut response = (status, Json(ErrorBody { detail })).into_response();
        // Lockout responses advertise when to come back.
        if let ApiError::Locked { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::Validation(detail) => ApiError::BadRequest(detail),
            TurnError::Core(e) => e.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownTest(code) => {
                ApiError::BadRequest(format!("Unknown test code: {code}"))
            }
            LedgerError::InvalidSchedule => {
                ApiError::BadRequest("scheduled_at must be in the future".into())
            }
            LedgerError::InvalidTransition { from, to } => {
                ApiError::BadRequest(format!("Cannot move booking from {from} to {to}"))
            }
            LedgerError::NotFound => ApiError::NotFound("Booking not found".into()),
            LedgerError::Database(e) => e.into(),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            // Unknown booking and wrong PIN are indistinguishable on the
            // wire so booking ids cannot be enumerated.
            GateError::NotFound | GateError::InvalidPin => {
                ApiError::NotFound("Invalid booking ID or PIN".into())
            }
            GateError::Locked { retry_after_secs } => ApiError::Locked {
                retry_after: retry_after_secs,
            },
            GateError::NotReady => ApiError::ReportNotReady,
            GateError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn bad_request_returns_400_with_detail() {
        let response = ApiError::BadRequest("Message cannot be empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Message cannot be empty");
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ApiError::NotFound("Invalid booking ID or PIN".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn locked_returns_423_with_retry_after() {
        let response = ApiError::Locked { retry_after: 600 }.into_response();
        assert_eq!(response.status(), StatusCode::LOCKED);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "600");
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["detail"].as_str().unwrap().contains("600s"));
    }

    #[tokio::test]
    async fn report_not_ready_returns_409() {
        let response = ApiError::ReportNotReady.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn internal_hides_details_from_client() {
        let response = ApiError::Internal("sqlite exploded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "An internal error occurred");
    }

    #[tokio::test]
    async fn gate_not_found_and_invalid_pin_map_identically() {
        let not_found: ApiError = GateError::NotFound.into();
        let invalid_pin: ApiError = GateError::InvalidPin.into();

        let a = not_found.into_response();
        let b = invalid_pin.into_response();
        assert_eq!(a.status(), b.status());

        let body_a = to_bytes(a.into_body(), 1024).await.unwrap();
        let body_b = to_bytes(b.into_body(), 1024).await.unwrap();
        assert_eq!(body_a, body_b);
    }

    #[tokio::test]
    async fn ledger_validation_maps_to_400() {
        let err: ApiError = LedgerError::InvalidSchedule.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
