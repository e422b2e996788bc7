//! # Payment Orchestration
//!
//! The operations behind the HTTP routes. Each one composes validation from
//! pesa-core, the attempt state machine from pesa-state, the network calls
//! behind [`StkGateway`](pesa_client::StkGateway) and the store:
//!
//! 1. **Checkout**: validate, create a pending attempt with a fresh
//!    transaction reference, persist it, push, then record the tracking id
//!    (`processing`) or the failure (`failed`).
//! 2. **Callback ingestion**: persist the raw body first, then correlate,
//!    parse and apply the settlement outcome. Never fails.
//! 3. **Reconciliation**: status query under bounded retry, applying the
//!    same terminal rules as the webhook.
//!
//! Terminal transitions go through [`PaymentStore::update_payment`], so a
//! settlement reported twice (redelivered webhook, or webhook racing a
//! query) is applied once.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pesa_client::retry::retry_idempotent;
use pesa_client::process_callback;
use pesa_core::{
    normalize_phone, validate_amount, CheckoutRequestId, PaymentId, ServiceId,
    TransactionReference, UserId, ValidationError,
};
use pesa_state::{
    validate_account_reference, AttemptError, CallbackKind, CallbackRecord, NewPaymentAttempt,
    OutcomeApplied, PaymentAttempt, PaymentMetadata, PurposeCategory, ServiceCatalogEntry,
    SettlementOutcome,
};

use crate::error::AppError;
use crate::middleware::metrics::{record_callback, record_checkout, record_reconcile_unconfirmed};
use crate::state::AppState;
use crate::store::StoreError;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A monetary amount as submitted by a form: decimal text or a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    /// Parse and range-check.
    pub fn parse(&self) -> Result<Decimal, ValidationError> {
        match self {
            Self::Text(raw) => validate_amount(raw),
            Self::Number(n) => validate_amount(&n.to_string()),
        }
    }
}

impl From<Decimal> for AmountInput {
    fn from(amount: Decimal) -> Self {
        Self::Text(amount.to_string())
    }
}

/// Everything needed to start a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub phone: String,
    pub amount: Decimal,
    pub purpose: PurposeCategory,
    pub description: String,
    pub account_reference: String,
    pub owner: Option<UserId>,
    pub extra_data: PaymentMetadata,
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// Validate, record and push a payment.
///
/// Returns the attempt in `processing` on acknowledgment. Any network
/// failure moves the attempt to `failed` and surfaces as a generic
/// "try again" (502).
pub async fn checkout(state: &AppState, input: CheckoutInput) -> Result<PaymentAttempt, AppError> {
    let gateway = state.require_gateway()?;

    let phone = normalize_phone(&input.phone)?;
    validate_account_reference(&input.account_reference)?;

    let mut extra_data = input.extra_data;
    extra_data.insert(
        PaymentMetadata::ACCOUNT_REFERENCE,
        input.account_reference.clone(),
    );

    let attempt = PaymentAttempt::create(NewPaymentAttempt {
        payer_phone: phone.clone(),
        amount: input.amount,
        purpose: input.purpose,
        description: input.description,
        transaction_reference: Some(TransactionReference::generate()),
        owner: input.owner,
        extra_data,
    })?;
    let payment_id = attempt.id;
    let amount = attempt.amount;
    let description = attempt.description.clone();
    state.store.insert_payment(attempt).await?;

    tracing::info!(
        %payment_id,
        purpose = %input.purpose,
        %amount,
        "payment attempt created, initiating STK push"
    );

    match gateway
        .initiate_push(&phone, amount, &input.account_reference, &description)
        .await
    {
        Ok(ack) => {
            let (_, updated) = state
                .store
                .update_payment(&payment_id, |a| {
                    a.mark_processing(ack.checkout_request_id.clone(), ack.merchant_request_id.clone())
                })
                .await?;
            record_checkout("accepted");
            tracing::info!(
                %payment_id,
                checkout_request_id = %ack.checkout_request_id,
                "STK push accepted"
            );
            Ok(updated)
        }
        Err(e) => {
            tracing::error!(%payment_id, error = %e, "STK push failed");
            state
                .store
                .update_payment(&payment_id, |a| a.mark_initiation_failed(&e.to_string()))
                .await?;
            record_checkout("failed");
            Err(e.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Callback ingestion
// ---------------------------------------------------------------------------

/// What happened to one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackDisposition {
    /// The attempt moved to `completed`.
    Completed,
    /// The attempt moved to `failed`.
    Failed,
    /// The attempt was already terminal.
    Duplicate,
    /// The body could not be parsed into a settlement result.
    Unparseable,
    /// No attempt carries the reported checkout id.
    Unmatched,
    /// The outcome was inconsistent with the attempt (e.g. success
    /// without a receipt) and was not applied.
    Rejected,
}

impl CallbackDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Duplicate => "duplicate",
            Self::Unparseable => "unparseable",
            Self::Unmatched => "unmatched",
            Self::Rejected => "rejected",
        }
    }
}

/// Persist and apply one webhook delivery.
///
/// Non-JSON bodies are stored as a JSON string. The record is marked
/// processed only when the outcome was applied or was an idempotent
/// duplicate.
pub async fn ingest_callback(state: &AppState, body: &[u8]) -> CallbackDisposition {
    let raw: Value = serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));

    let payment_id = raw
        .pointer("/Body/stkCallback/CheckoutRequestID")
        .and_then(Value::as_str)
        .and_then(|id| state.store.find_by_checkout(&CheckoutRequestId::new(id)));

    let record = CallbackRecord::new(payment_id, CallbackKind::Confirmation, raw.clone());
    let record_id = record.id;
    let recorded = match state.store.insert_callback(record).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(callback_id = %record_id, error = %e, "failed to persist callback record");
            false
        }
    };

    let disposition = apply_callback(state, &raw, payment_id).await;

    let applied = matches!(
        disposition,
        CallbackDisposition::Completed | CallbackDisposition::Failed | CallbackDisposition::Duplicate
    );
    if recorded && applied {
        if let Err(e) = state.store.mark_callback_processed(&record_id).await {
            tracing::error!(callback_id = %record_id, error = %e, "failed to mark callback processed");
        }
    }

    record_callback(disposition.as_str());
    tracing::info!(
        callback_id = %record_id,
        payment_id = ?payment_id,
        disposition = disposition.as_str(),
        "M-Pesa callback ingested"
    );
    disposition
}

async fn apply_callback(
    state: &AppState,
    raw: &Value,
    payment_id: Option<PaymentId>,
) -> CallbackDisposition {
    let Some(result) = process_callback(raw) else {
        return CallbackDisposition::Unparseable;
    };
    let Some(payment_id) = payment_id else {
        tracing::warn!(
            checkout_request_id = %result.checkout_request_id,
            "callback for unknown checkout request"
        );
        return CallbackDisposition::Unmatched;
    };

    let outcome = SettlementOutcome {
        result_code: result.result_code,
        result_description: result.result_description,
        receipt: result.receipt_number,
        settled_at: result.transaction_date,
    };

    match state
        .store
        .update_payment(&payment_id, |a| a.apply_outcome(outcome))
        .await
    {
        Ok((applied, _)) => disposition_of(applied),
        Err(e) => {
            tracing::warn!(%payment_id, error = %e, "callback outcome not applied");
            CallbackDisposition::Rejected
        }
    }
}

fn disposition_of(applied: OutcomeApplied) -> CallbackDisposition {
    match applied {
        OutcomeApplied::Completed => CallbackDisposition::Completed,
        OutcomeApplied::Failed => CallbackDisposition::Failed,
        OutcomeApplied::Duplicate { .. } => CallbackDisposition::Duplicate,
    }
}

// ---------------------------------------------------------------------------
// Reconciliation and cancellation
// ---------------------------------------------------------------------------

/// Ask the network for the outcome of a processing attempt.
///
/// Terminal attempts are returned unchanged without a network call. A
/// success report cannot complete an attempt on its own because the query
/// carries no receipt number; the attempt stays `processing` until the
/// webhook arrives, and the condition is logged.
pub async fn reconcile(state: &AppState, payment_id: &PaymentId) -> Result<PaymentAttempt, AppError> {
    let attempt = state
        .store
        .get_payment(payment_id)
        .ok_or(StoreError::PaymentNotFound {
            payment_id: *payment_id,
        })?;
    if attempt.is_terminal() {
        return Ok(attempt);
    }
    let Some(checkout_request_id) = attempt.checkout_request_id.clone() else {
        return Err(AppError::Conflict(format!(
            "payment {payment_id} has no checkout request to query"
        )));
    };

    let gateway = state.require_gateway()?;
    let result = retry_idempotent("stk_query", state.config.query_retries, || {
        let gateway = gateway.clone();
        let checkout_request_id = checkout_request_id.clone();
        async move { gateway.query_status(&checkout_request_id).await }
    })
    .await?;

    let outcome = SettlementOutcome {
        result_code: result.result_code,
        result_description: result.result_description,
        receipt: None,
        settled_at: None,
    };

    match state
        .store
        .update_payment(payment_id, |a| a.apply_outcome(outcome))
        .await
    {
        Ok((_, updated)) => Ok(updated),
        Err(StoreError::Attempt(AttemptError::MissingReceiptNumber { .. })) => {
            tracing::warn!(
                %payment_id,
                %checkout_request_id,
                "status query reports success but no receipt is known; awaiting callback"
            );
            record_reconcile_unconfirmed();
            Ok(attempt)
        }
        Err(e) => Err(e.into()),
    }
}

/// Administratively cancel a processing attempt.
pub async fn cancel(
    state: &AppState,
    payment_id: &PaymentId,
    reason: &str,
) -> Result<PaymentAttempt, AppError> {
    let (_, updated) = state
        .store
        .update_payment(payment_id, |a| a.cancel(reason))
        .await?;
    tracing::info!(%payment_id, reason, "payment cancelled");
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Service catalog
// ---------------------------------------------------------------------------

/// Add a catalog entry.
pub async fn create_service(
    state: &AppState,
    name: &str,
    description: &str,
    base_price: &AmountInput,
) -> Result<ServiceCatalogEntry, AppError> {
    let entry = ServiceCatalogEntry::new(name, description, base_price.parse()?)?;
    state.store.insert_service(entry.clone()).await?;
    tracing::info!(service_id = %entry.id, name = %entry.name, "service catalog entry created");
    Ok(entry)
}

/// Start a checkout priced from an active catalog entry.
///
/// Amount is the entry's base price and the account reference its name.
pub async fn service_checkout(
    state: &AppState,
    service_id: &ServiceId,
    phone: String,
    description: Option<String>,
    owner: Option<UserId>,
) -> Result<PaymentAttempt, AppError> {
    let entry = state
        .store
        .get_service(service_id)
        .filter(|s| s.is_active)
        .ok_or(StoreError::ServiceNotFound {
            service_id: *service_id,
        })?;

    let mut extra_data = PaymentMetadata::new();
    extra_data.insert(PaymentMetadata::SERVICE_ID, entry.id.to_string());
    extra_data.insert(PaymentMetadata::SERVICE_NAME, entry.name.clone());

    checkout(
        state,
        CheckoutInput {
            phone,
            amount: entry.base_price,
            purpose: PurposeCategory::ServicePayment,
            description: description.unwrap_or_else(|| format!("Payment for {}", entry.name)),
            account_reference: entry.name.clone(),
            owner,
            extra_data,
        },
    )
    .await
}

/// Parse a path id, mapping malformed values to 404.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, AppError> {
    T::from_str(raw).map_err(|_| AppError::NotFound(format!("{what} {raw} not found")))
}
