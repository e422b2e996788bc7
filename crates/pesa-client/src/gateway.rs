//! The push-payment seam.
//!
//! [`StkGateway`] is what the rest of the stack talks to. [`DarajaClient`]
//! implements it against the live network; services and tests can plug in
//! any other implementation.
//!
//! [`DarajaClient`]: crate::DarajaClient

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use pesa_core::{CanonicalPhone, CheckoutRequestId, MerchantRequestId};

use crate::error::PaymentError;

/// Network acknowledgment of an accepted push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushAck {
    pub checkout_request_id: CheckoutRequestId,
    pub merchant_request_id: MerchantRequestId,
    pub response_code: String,
    pub response_description: String,
    /// Text suitable for showing to the payer.
    pub customer_message: String,
}

/// Outcome of a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub checkout_request_id: CheckoutRequestId,
    pub merchant_request_id: MerchantRequestId,
    pub response_code: Option<String>,
    pub response_description: String,
    pub result_code: String,
    pub result_description: String,
}

impl QueryResult {
    /// Result code `0`: the payer completed the transaction.
    pub fn is_success(&self) -> bool {
        self.result_code == "0"
    }
}

/// Push initiation and status query against the payment network.
#[async_trait]
pub trait StkGateway: Send + Sync {
    /// Prompt `phone` to pay `amount`. Inputs are assumed already validated.
    ///
    /// Never retried internally: a repeated push can charge the payer twice.
    async fn initiate_push(
        &self,
        phone: &CanonicalPhone,
        amount: Decimal,
        account_reference: &str,
        description: &str,
    ) -> Result<PushAck, PaymentError>;

    /// Ask the network for the outcome of an earlier push. Read-only.
    async fn query_status(
        &self,
        checkout_request_id: &CheckoutRequestId,
    ) -> Result<QueryResult, PaymentError>;
}
