//! # Service Catalog API
//!
//! - **GET `/v1/services`**: active catalog entries
//! - **POST `/v1/services`**: add an entry
//! - **POST `/v1/services/{id}/checkout`**: checkout priced from an entry

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use pesa_core::{ServiceId, UserId};
use pesa_state::ServiceCatalogEntry;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::orchestration::{self, parse_id, AmountInput};
use crate::routes::payments::PaymentResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_price: AmountInput,
}

/// Checkout against a catalog entry. Amount and account reference come
/// from the entry.
#[derive(Debug, Deserialize)]
pub struct ServiceCheckoutRequest {
    pub phone: String,
    pub description: Option<String>,
    pub owner_id: Option<UserId>,
}

impl Validate for ServiceCheckoutRequest {
    fn validate(&self) -> Result<(), String> {
        if self.phone.trim().is_empty() {
            return Err("phone must not be empty".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/services", get(list_services).post(create_service))
        .route("/v1/services/{id}/checkout", post(service_checkout))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /v1/services
async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceCatalogEntry>> {
    Json(state.store.list_active_services())
}

/// POST /v1/services
async fn create_service(
    State(state): State<AppState>,
    body: Result<Json<CreateServiceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = extract_json(body)?;
    let entry =
        orchestration::create_service(&state, &req.name, &req.description, &req.base_price).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST /v1/services/{id}/checkout
async fn service_checkout(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ServiceCheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id: ServiceId = parse_id(&id, "service")?;
    let req = extract_validated_json(body)?;
    let attempt =
        orchestration::service_checkout(&state, &id, req.phone, req.description, req.owner_id)
            .await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(attempt))))
}
