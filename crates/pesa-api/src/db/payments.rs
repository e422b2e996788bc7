//! Payment attempt persistence.
//!
//! All functions take a `&PgPool` and operate on the `payments` table.
//! Amounts are stored as decimal text; metadata and the transition log as
//! JSONB.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use pesa_core::{
    normalize_phone, CheckoutRequestId, MerchantRequestId, PaymentId, TransactionReference, UserId,
};
use pesa_state::{PaymentAttempt, PaymentMetadata, PaymentState, PurposeCategory, TransitionRecord};

use super::decode_error;

const COLUMNS: &str = "id, transaction_reference, checkout_request_id, merchant_request_id,
     payer_phone, amount, purpose, description, state, receipt_number, result_code,
     result_description, settled_at, owner_id, extra_data, transitions, created_at, updated_at";

/// Insert a newly created attempt.
pub async fn insert(pool: &PgPool, attempt: &PaymentAttempt) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO payments (id, transaction_reference, checkout_request_id,
         merchant_request_id, payer_phone, amount, purpose, description, state,
         receipt_number, result_code, result_description, settled_at, owner_id,
         extra_data, transitions, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
    )
    .bind(*attempt.id.as_uuid())
    .bind(attempt.transaction_reference.as_ref().map(|r| r.as_str()))
    .bind(attempt.checkout_request_id.as_ref().map(|c| c.as_str()))
    .bind(attempt.merchant_request_id.as_ref().map(|m| m.as_str()))
    .bind(attempt.payer_phone.as_str())
    .bind(attempt.amount.to_string())
    .bind(attempt.purpose.as_str())
    .bind(&attempt.description)
    .bind(attempt.state.as_str())
    .bind(&attempt.receipt_number)
    .bind(&attempt.result_code)
    .bind(&attempt.result_description)
    .bind(attempt.settled_at)
    .bind(attempt.owner.map(|o| *o.as_uuid()))
    .bind(Json(&attempt.extra_data))
    .bind(Json(&attempt.transitions))
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Write the mutable columns of an attempt, provided the stored row is
/// still in `expected_state`. Returns `false` when no row matched.
pub async fn update(
    pool: &PgPool,
    attempt: &PaymentAttempt,
    expected_state: PaymentState,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE payments SET checkout_request_id = $2, merchant_request_id = $3,
         state = $4, receipt_number = $5, result_code = $6, result_description = $7,
         settled_at = $8, extra_data = $9, transitions = $10, updated_at = $11
         WHERE id = $1 AND state = $12",
    )
    .bind(*attempt.id.as_uuid())
    .bind(attempt.checkout_request_id.as_ref().map(|c| c.as_str()))
    .bind(attempt.merchant_request_id.as_ref().map(|m| m.as_str()))
    .bind(attempt.state.as_str())
    .bind(&attempt.receipt_number)
    .bind(&attempt.result_code)
    .bind(&attempt.result_description)
    .bind(attempt.settled_at)
    .bind(Json(&attempt.extra_data))
    .bind(Json(&attempt.transitions))
    .bind(attempt.updated_at)
    .bind(expected_state.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load every attempt on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<PaymentAttempt>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {COLUMNS} FROM payments ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PaymentRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    transaction_reference: Option<String>,
    checkout_request_id: Option<String>,
    merchant_request_id: Option<String>,
    payer_phone: String,
    amount: String,
    purpose: String,
    description: String,
    state: String,
    receipt_number: Option<String>,
    result_code: Option<String>,
    result_description: Option<String>,
    settled_at: Option<DateTime<Utc>>,
    owner_id: Option<Uuid>,
    extra_data: Json<PaymentMetadata>,
    transitions: Json<Vec<TransitionRecord>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_record(self) -> Result<PaymentAttempt, sqlx::Error> {
        Ok(PaymentAttempt {
            id: PaymentId::from_uuid(self.id),
            transaction_reference: self.transaction_reference.map(TransactionReference::new),
            checkout_request_id: self.checkout_request_id.map(CheckoutRequestId::new),
            merchant_request_id: self.merchant_request_id.map(MerchantRequestId::new),
            payer_phone: normalize_phone(&self.payer_phone).map_err(decode_error)?,
            amount: Decimal::from_str(&self.amount).map_err(decode_error)?,
            purpose: PurposeCategory::from_str(&self.purpose).map_err(decode_error)?,
            description: self.description,
            state: PaymentState::from_str(&self.state).map_err(decode_error)?,
            receipt_number: self.receipt_number,
            result_code: self.result_code,
            result_description: self.result_description,
            settled_at: self.settled_at,
            owner: self.owner_id.map(UserId::from_uuid),
            extra_data: self.extra_data.0,
            transitions: self.transitions.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
