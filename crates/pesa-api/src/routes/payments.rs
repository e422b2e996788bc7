//! # Payments API
//!
//! - **POST `/v1/payments/checkout`**: validate and push a payment
//! - **GET `/v1/payments/{id}`**: current state of an attempt
//! - **POST `/v1/payments/{id}/query`**: reconcile through a status query
//! - **POST `/v1/payments/{id}/cancel`**: cancel a processing attempt
//! - **GET `/v1/payments/{id}/callbacks`**: webhook deliveries for an attempt

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pesa_core::{PaymentId, UserId};
use pesa_state::{CallbackRecord, PaymentAttempt, PaymentMetadata, PaymentState, PurposeCategory};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::orchestration::{self, parse_id, AmountInput, CheckoutInput};
use crate::state::AppState;
use crate::store::StoreError;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to start a checkout.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Payer phone in local (`07...`) or international form.
    pub phone: String,
    /// Decimal text or number; fractions are truncated when pushed.
    pub amount: AmountInput,
    pub purpose: PurposeCategory,
    pub description: String,
    /// Reference shown to the payer on the prompt.
    pub account_reference: String,
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub extra_data: PaymentMetadata,
}

impl Validate for CheckoutRequest {
    fn validate(&self) -> Result<(), String> {
        if self.phone.trim().is_empty() {
            return Err("phone must not be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("description must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request to cancel an attempt.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

impl Validate for CancelRequest {
    fn validate(&self) -> Result<(), String> {
        if self.reason.trim().is_empty() {
            return Err("reason must not be empty".to_string());
        }
        Ok(())
    }
}

/// A payment attempt as returned to API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub transaction_reference: Option<String>,
    pub checkout_request_id: Option<String>,
    pub state: PaymentState,
    pub amount: Decimal,
    pub purpose: PurposeCategory,
    pub description: String,
    pub payer_phone: String,
    pub receipt_number: Option<String>,
    pub result_code: Option<String>,
    pub result_description: Option<String>,
    pub settled_at: Option<DateTime<Utc>>,
    pub is_successful: bool,
    pub extra_data: PaymentMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentAttempt> for PaymentResponse {
    fn from(a: PaymentAttempt) -> Self {
        let is_successful = a.is_successful();
        Self {
            id: a.id,
            transaction_reference: a.transaction_reference.map(|r| r.to_string()),
            checkout_request_id: a.checkout_request_id.map(|c| c.to_string()),
            state: a.state,
            amount: a.amount,
            purpose: a.purpose,
            description: a.description,
            payer_phone: a.payer_phone.into_inner(),
            receipt_number: a.receipt_number,
            result_code: a.result_code,
            result_description: a.result_description,
            settled_at: a.settled_at,
            is_successful,
            extra_data: a.extra_data,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/checkout", post(checkout))
        .route("/v1/payments/{id}", get(get_payment))
        .route("/v1/payments/{id}/query", post(query_payment))
        .route("/v1/payments/{id}/cancel", post(cancel_payment))
        .route("/v1/payments/{id}/callbacks", get(list_callbacks))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/payments/checkout
async fn checkout(
    State(state): State<AppState>,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = extract_validated_json(body)?;
    let amount = req.amount.parse()?;

    let attempt = orchestration::checkout(
        &state,
        CheckoutInput {
            phone: req.phone,
            amount,
            purpose: req.purpose,
            description: req.description,
            account_reference: req.account_reference,
            owner: req.owner_id,
            extra_data: req.extra_data,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(PaymentResponse::from(attempt))))
}

/// GET /v1/payments/{id}
async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, AppError> {
    let id: PaymentId = parse_id(&id, "payment")?;
    let attempt = state
        .store
        .get_payment(&id)
        .ok_or(StoreError::PaymentNotFound { payment_id: id })?;
    Ok(Json(attempt.into()))
}

/// POST /v1/payments/{id}/query
async fn query_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, AppError> {
    let id: PaymentId = parse_id(&id, "payment")?;
    let attempt = orchestration::reconcile(&state, &id).await?;
    Ok(Json(attempt.into()))
}

/// POST /v1/payments/{id}/cancel
async fn cancel_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Json<PaymentResponse>, AppError> {
    let id: PaymentId = parse_id(&id, "payment")?;
    let req = extract_validated_json(body)?;
    let attempt = orchestration::cancel(&state, &id, &req.reason).await?;
    Ok(Json(attempt.into()))
}

/// GET /v1/payments/{id}/callbacks
async fn list_callbacks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CallbackRecord>>, AppError> {
    let id: PaymentId = parse_id(&id, "payment")?;
    if state.store.get_payment(&id).is_none() {
        return Err(StoreError::PaymentNotFound { payment_id: id }.into());
    }
    Ok(Json(state.store.callbacks_for(&id)))
}
