//! # Callback Ingestion
//!
//! Turns the asynchronous settlement webhook into a [`CallbackResult`].
//!
//! ```text
//! { "Body": { "stkCallback": {
//!     "MerchantRequestID": "...",
//!     "CheckoutRequestID": "...",
//!     "ResultCode": 0,
//!     "ResultDesc": "...",
//!     "CallbackMetadata": { "Item": [ { "Name": "Amount", "Value": 500 }, ... ] }
//! } } }
//! ```
//!
//! Metadata items are only read when the result code is `0`. Items are
//! matched by name; unknown names are skipped and missing items leave the
//! corresponding field empty. A missing required node, or an item whose
//! shape or value type is unexpected, makes the whole payload unparseable.
//!
//! Parsing is pure. Persisting the raw body and applying the outcome are the
//! caller's job.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use pesa_core::{CheckoutRequestId, MerchantRequestId};

use crate::error::CallbackError;

/// Normalized settlement result from a webhook payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackResult {
    pub merchant_request_id: MerchantRequestId,
    pub checkout_request_id: CheckoutRequestId,
    pub result_code: String,
    pub result_description: String,
    pub amount: Option<Decimal>,
    pub receipt_number: Option<String>,
    /// `TransactionDate` read as milliseconds since the epoch.
    pub transaction_date: Option<DateTime<Utc>>,
    /// `TransactionDate` exactly as sent.
    pub transaction_date_raw: Option<i64>,
    pub phone_number: Option<String>,
}

impl CallbackResult {
    pub fn is_success(&self) -> bool {
        self.result_code == "0"
    }
}

/// A recognized metadata item.
enum Item {
    Amount(Decimal),
    Receipt(String),
    TransactionDate(i64),
    Phone(String),
    Other,
}

/// Parse a webhook body, reporting why it was rejected.
pub fn parse_callback(body: &Value) -> Result<CallbackResult, CallbackError> {
    let stk = body
        .get("Body")
        .and_then(|b| b.get("stkCallback"))
        .ok_or_else(|| unparseable("missing Body.stkCallback"))?;

    let checkout_request_id = stk
        .get("CheckoutRequestID")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| unparseable("missing CheckoutRequestID"))?;

    let merchant_request_id = stk
        .get("MerchantRequestID")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let result_code = stk
        .get("ResultCode")
        .and_then(result_code_text)
        .ok_or_else(|| unparseable("missing or non-integer ResultCode"))?;

    let result_description = stk
        .get("ResultDesc")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut result = CallbackResult {
        merchant_request_id: MerchantRequestId::new(merchant_request_id),
        checkout_request_id: CheckoutRequestId::new(checkout_request_id),
        result_code,
        result_description,
        amount: None,
        receipt_number: None,
        transaction_date: None,
        transaction_date_raw: None,
        phone_number: None,
    };

    if !result.is_success() {
        return Ok(result);
    }

    let items = match stk.get("CallbackMetadata").and_then(|m| m.get("Item")) {
        None | Some(Value::Null) => return Ok(result),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(unparseable("CallbackMetadata.Item is not a list")),
    };

    for raw in items {
        match parse_item(raw)? {
            Item::Amount(amount) => result.amount = Some(amount),
            Item::Receipt(receipt) => result.receipt_number = Some(receipt),
            Item::TransactionDate(raw) => {
                result.transaction_date_raw = Some(raw);
                result.transaction_date = DateTime::from_timestamp(raw / 1000, 0);
            }
            Item::Phone(phone) => result.phone_number = Some(phone),
            Item::Other => {}
        }
    }

    Ok(result)
}

/// Parse a webhook body; `None` when it is unparseable.
///
/// Never panics or errors. Rejections are logged at `warn`.
pub fn process_callback(body: &Value) -> Option<CallbackResult> {
    match parse_callback(body) {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unparseable M-Pesa callback");
            None
        }
    }
}

fn parse_item(raw: &Value) -> Result<Item, CallbackError> {
    let name = raw
        .get("Name")
        .and_then(Value::as_str)
        .ok_or_else(|| unparseable("metadata item without a Name"))?;

    // The network omits Value for some items (e.g. Balance).
    let Some(value) = raw.get("Value").filter(|v| !v.is_null()) else {
        return Ok(Item::Other);
    };

    let mismatch = || unparseable(format!("unexpected value type for {name}"));
    let item = match name {
        "Amount" => Item::Amount(decimal_value(value).ok_or_else(mismatch)?),
        "MpesaReceiptNumber" => Item::Receipt(value.as_str().ok_or_else(mismatch)?.to_string()),
        "TransactionDate" => Item::TransactionDate(value.as_i64().ok_or_else(mismatch)?),
        "PhoneNumber" => Item::Phone(match value {
            Value::Number(n) if n.is_u64() || n.is_i64() => n.to_string(),
            Value::String(s) => s.clone(),
            _ => return Err(mismatch()),
        }),
        _ => Item::Other,
    };
    Ok(item)
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        _ => None,
    }
}

/// Integer result codes arrive as numbers or numeric strings.
fn result_code_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_i64().map(|c| c.to_string()),
        Value::String(s) => s.trim().parse::<i64>().ok().map(|c| c.to_string()),
        _ => None,
    }
}

fn unparseable(reason: impl Into<String>) -> CallbackError {
    CallbackError::Unparseable {
        reason: reason.into(),
    }
}
