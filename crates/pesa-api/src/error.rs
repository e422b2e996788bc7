//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from pesa-core, pesa-state and pesa-client to HTTP
//! status codes with a JSON body. Upstream and internal detail is logged,
//! never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pesa_client::PaymentError;
use pesa_state::{AttemptError, CatalogError};

use crate::store::StoreError;

/// Message returned to clients for any payment network failure.
pub const TRY_AGAIN_MESSAGE: &str = "The payment service is unavailable, please try again";

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request body (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// The payment network failed or refused the call (502).
    #[error("upstream M-Pesa error: {0}")]
    UpstreamError(String),

    /// Payment gateway not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::UpstreamError(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::UpstreamError(_) => TRY_AGAIN_MESSAGE.to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::UpstreamError(_) => tracing::error!(error = %self, "upstream M-Pesa error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<pesa_core::ValidationError> for AppError {
    fn from(err: pesa_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<AttemptError> for AppError {
    fn from(err: AttemptError) -> Self {
        match &err {
            AttemptError::Validation(_)
            | AttemptError::DescriptionTooLong { .. }
            | AttemptError::AccountReferenceTooLong { .. }
            | AttemptError::AccountReferenceEmpty => Self::Validation(err.to_string()),
            AttemptError::InvalidTransition { .. }
            | AttemptError::TerminalState { .. }
            | AttemptError::TrackingIdAlreadySet { .. }
            | AttemptError::MissingReceiptNumber { .. } => Self::Conflict(err.to_string()),
            AttemptError::UnknownState { .. } | AttemptError::UnknownPurpose { .. } => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured { .. } => Self::ServiceUnavailable(err.to_string()),
            other => Self::UpstreamError(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PaymentNotFound { .. } | StoreError::ServiceNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            StoreError::DuplicateReference { .. } => Self::Conflict(err.to_string()),
            StoreError::Attempt(inner) => inner.into(),
            StoreError::Database(_) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use pesa_core::PaymentId;
    use pesa_state::PaymentState;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn not_found_status_code() {
        let (status, code) = AppError::NotFound("payment".into()).status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn validation_error_maps_to_422() {
        let err: AppError = pesa_core::normalize_phone("12345").unwrap_err().into();
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn invalid_transition_maps_to_conflict() {
        let err: AppError = AttemptError::InvalidTransition {
            from: PaymentState::Pending,
            to: PaymentState::Cancelled,
        }
        .into();
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);
    }

    #[test]
    fn missing_payment_maps_to_404() {
        let err: AppError = StoreError::PaymentNotFound {
            payment_id: PaymentId::new(),
        }
        .into();
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unconfigured_client_maps_to_503() {
        let err: AppError = PaymentError::NotConfigured {
            reason: "no TLS backend".into(),
        }
        .into();
        assert_eq!(err.status_and_code().0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn upstream_detail_is_hidden() {
        let err: AppError = PaymentError::PushInitiationFailed {
            reason: "stk_push: HTTP 500: internal gateway trace".into(),
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
        assert_eq!(body["error"]["message"], TRY_AGAIN_MESSAGE);
    }

    #[tokio::test]
    async fn internal_detail_is_hidden() {
        let (status, body) = body_json(AppError::Internal("pool timed out".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("pool"));
    }
}
