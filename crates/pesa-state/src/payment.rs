//! # Payment Attempt State Machine
//!
//! One [`PaymentAttempt`] is created per checkout. It records who pays, how
//! much, for what, and how the network answered.
//!
//! ## States
//!
//! ```text
//! Pending ──▶ Processing ──▶ Completed (terminal)
//!    │            │
//!    │            ├──▶ Failed    (terminal)
//!    │            │
//!    │            └──▶ Cancelled (terminal)
//!    │
//!    └──▶ Failed (terminal, initiation rejected)
//! ```
//!
//! `Processing` is entered exactly once, when the network acknowledges the
//! push and assigns a checkout request id. Settlement outcomes (from the
//! webhook or a status query) are applied only from `Processing`; an outcome
//! arriving for an attempt that is already terminal is reported as
//! [`OutcomeApplied::Duplicate`] and changes nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pesa_core::{
    check_amount, CanonicalPhone, CheckoutRequestId, MerchantRequestId, PaymentId,
    TransactionReference, UserId, ValidationError,
};

/// Maximum length of the free-text description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Maximum length of the account reference sent with a push, in characters.
pub const MAX_ACCOUNT_REFERENCE_LEN: usize = 100;

/// Result code the network uses for a successful transaction.
pub const SUCCESS_RESULT_CODE: &str = "0";

// ─── Payment State ───────────────────────────────────────────────────

/// The lifecycle state of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    /// Created locally, push not yet acknowledged.
    Pending,
    /// Push acknowledged, waiting for the payer and the network.
    Processing,
    /// Paid; a receipt number is on record (terminal).
    Completed,
    /// Rejected at initiation or settled unsuccessfully (terminal).
    Failed,
    /// Cancelled administratively while processing (terminal).
    Cancelled,
}

impl PaymentState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase storage and wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentState {
    type Err = AttemptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(AttemptError::UnknownState {
                value: other.to_string(),
            }),
        }
    }
}

/// What the payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurposeCategory {
    ServicePayment,
    BookingPayment,
    QuotePayment,
}

impl PurposeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServicePayment => "service_payment",
            Self::BookingPayment => "booking_payment",
            Self::QuotePayment => "quote_payment",
        }
    }
}

impl std::fmt::Display for PurposeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PurposeCategory {
    type Err = AttemptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service_payment" => Ok(Self::ServicePayment),
            "booking_payment" => Ok(Self::BookingPayment),
            "quote_payment" => Ok(Self::QuotePayment),
            other => Err(AttemptError::UnknownPurpose {
                value: other.to_string(),
            }),
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by payment attempt creation and transitions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptError {
    /// Attempted transition is not an edge of the state machine.
    #[error("invalid payment transition: {from} -> {to}")]
    InvalidTransition { from: PaymentState, to: PaymentState },

    /// The attempt is already terminal.
    #[error("payment is in terminal state {state}")]
    TerminalState { state: PaymentState },

    /// The checkout request id may only be assigned once.
    #[error("checkout request id already assigned: {existing}")]
    TrackingIdAlreadySet { existing: String },

    /// A success outcome arrived without a receipt number.
    #[error("success outcome for payment {payment_id} carries no receipt number")]
    MissingReceiptNumber { payment_id: PaymentId },

    #[error("description is {len} characters, maximum is {max}")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("account reference is {len} characters, maximum is {max}")]
    AccountReferenceTooLong { len: usize, max: usize },

    #[error("account reference must not be empty")]
    AccountReferenceEmpty,

    #[error("unknown payment state {value:?}")]
    UnknownState { value: String },

    #[error("unknown purpose category {value:?}")]
    UnknownPurpose { value: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// ─── Metadata ────────────────────────────────────────────────────────

/// Open-ended key/value metadata attached at creation.
///
/// The key set is documented but not enforced. Keys written by this
/// workspace:
///
/// | Key | Value |
/// |-----|-------|
/// | [`SERVICE_ID`](Self::SERVICE_ID) | catalog entry the checkout was priced from |
/// | [`SERVICE_NAME`](Self::SERVICE_NAME) | its display name at checkout time |
/// | [`ACCOUNT_REFERENCE`](Self::ACCOUNT_REFERENCE) | account reference sent with the push |
/// | [`BOOKING_REFERENCE`](Self::BOOKING_REFERENCE) | booking this payment settles |
/// | [`QUOTE_REFERENCE`](Self::QUOTE_REFERENCE) | quote this payment settles |
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMetadata(BTreeMap<String, serde_json::Value>);

impl PaymentMetadata {
    pub const SERVICE_ID: &'static str = "service_id";
    pub const SERVICE_NAME: &'static str = "service_name";
    pub const ACCOUNT_REFERENCE: &'static str = "account_reference";
    pub const BOOKING_REFERENCE: &'static str = "booking_reference";
    pub const QUOTE_REFERENCE: &'static str = "quote_reference";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// String value of `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, serde_json::Value>> for PaymentMetadata {
    fn from(map: BTreeMap<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

// ─── Inputs ──────────────────────────────────────────────────────────

/// Everything needed to open a payment attempt.
#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub payer_phone: CanonicalPhone,
    pub amount: Decimal,
    pub purpose: PurposeCategory,
    pub description: String,
    pub transaction_reference: Option<TransactionReference>,
    pub owner: Option<UserId>,
    pub extra_data: PaymentMetadata,
}

/// A settlement outcome reported by the webhook or a status query.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    /// Network result code; [`SUCCESS_RESULT_CODE`] means paid.
    pub result_code: String,
    pub result_description: String,
    /// Receipt number; required when the result code signals success.
    pub receipt: Option<String>,
    /// Settlement time reported by the network, if any.
    pub settled_at: Option<DateTime<Utc>>,
}

impl SettlementOutcome {
    pub fn is_success(&self) -> bool {
        self.result_code == SUCCESS_RESULT_CODE
    }
}

/// How [`PaymentAttempt::apply_outcome`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeApplied {
    /// Processing → Completed.
    Completed,
    /// Processing → Failed.
    Failed,
    /// The attempt was already terminal; nothing changed.
    Duplicate { state: PaymentState },
}

/// Record of a payment state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_state: PaymentState,
    pub to_state: PaymentState,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

// ─── Payment Attempt ─────────────────────────────────────────────────

/// A single push-payment attempt and its settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub id: PaymentId,
    pub transaction_reference: Option<TransactionReference>,
    /// Assigned once by the network on acknowledgment; never altered.
    pub checkout_request_id: Option<CheckoutRequestId>,
    pub merchant_request_id: Option<MerchantRequestId>,
    pub payer_phone: CanonicalPhone,
    pub amount: Decimal,
    pub purpose: PurposeCategory,
    pub description: String,
    pub state: PaymentState,
    pub receipt_number: Option<String>,
    pub result_code: Option<String>,
    pub result_description: Option<String>,
    pub settled_at: Option<DateTime<Utc>>,
    pub owner: Option<UserId>,
    pub extra_data: PaymentMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub transitions: Vec<TransitionRecord>,
}

impl PaymentAttempt {
    /// Open a new attempt in `Pending`.
    ///
    /// The amount is range-checked again here so that no attempt can exist
    /// with an out-of-range amount, whatever path built the input.
    pub fn create(input: NewPaymentAttempt) -> Result<Self, AttemptError> {
        let amount = check_amount(input.amount)?;
        let len = input.description.chars().count();
        if len > MAX_DESCRIPTION_LEN {
            return Err(AttemptError::DescriptionTooLong {
                len,
                max: MAX_DESCRIPTION_LEN,
            });
        }

        let now = Utc::now();
        Ok(Self {
            id: PaymentId::new(),
            transaction_reference: input.transaction_reference,
            checkout_request_id: None,
            merchant_request_id: None,
            payer_phone: input.payer_phone,
            amount,
            purpose: input.purpose,
            description: input.description,
            state: PaymentState::Pending,
            receipt_number: None,
            result_code: None,
            result_description: None,
            settled_at: None,
            owner: input.owner,
            extra_data: input.extra_data,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        })
    }

    /// Record the network acknowledgment (PENDING → PROCESSING).
    pub fn mark_processing(
        &mut self,
        checkout_request_id: CheckoutRequestId,
        merchant_request_id: MerchantRequestId,
    ) -> Result<(), AttemptError> {
        if let Some(existing) = &self.checkout_request_id {
            return Err(AttemptError::TrackingIdAlreadySet {
                existing: existing.to_string(),
            });
        }
        self.require_state(PaymentState::Pending, PaymentState::Processing)?;
        self.checkout_request_id = Some(checkout_request_id);
        self.merchant_request_id = Some(merchant_request_id);
        self.do_transition(PaymentState::Processing, "push acknowledged");
        Ok(())
    }

    /// The push was never accepted (PENDING → FAILED).
    pub fn mark_initiation_failed(&mut self, reason: &str) -> Result<(), AttemptError> {
        self.require_state(PaymentState::Pending, PaymentState::Failed)?;
        self.do_transition(PaymentState::Failed, reason);
        Ok(())
    }

    /// Apply a settlement outcome (PROCESSING → COMPLETED | FAILED).
    ///
    /// An attempt that is already terminal is left untouched and
    /// [`OutcomeApplied::Duplicate`] is returned, so redelivered webhooks and
    /// late query results are harmless.
    ///
    /// # Errors
    ///
    /// - [`AttemptError::InvalidTransition`] while still `Pending`.
    /// - [`AttemptError::MissingReceiptNumber`] for a success outcome
    ///   without a receipt; the attempt stays `Processing`.
    pub fn apply_outcome(
        &mut self,
        outcome: SettlementOutcome,
    ) -> Result<OutcomeApplied, AttemptError> {
        if self.state.is_terminal() {
            return Ok(OutcomeApplied::Duplicate { state: self.state });
        }

        let target = if outcome.is_success() {
            PaymentState::Completed
        } else {
            PaymentState::Failed
        };
        self.require_state(PaymentState::Processing, target)?;

        let receipt = outcome.receipt.filter(|r| !r.trim().is_empty());
        if target == PaymentState::Completed && receipt.is_none() {
            return Err(AttemptError::MissingReceiptNumber {
                payment_id: self.id,
            });
        }

        let reason = format!(
            "result code {}: {}",
            outcome.result_code, outcome.result_description
        );
        self.receipt_number = receipt;
        self.result_code = Some(outcome.result_code);
        self.result_description = Some(outcome.result_description);
        self.settled_at = Some(outcome.settled_at.unwrap_or_else(Utc::now));
        self.do_transition(target, &reason);

        Ok(match target {
            PaymentState::Completed => OutcomeApplied::Completed,
            _ => OutcomeApplied::Failed,
        })
    }

    /// Cancel a processing attempt (PROCESSING → CANCELLED).
    pub fn cancel(&mut self, reason: &str) -> Result<(), AttemptError> {
        self.require_state(PaymentState::Processing, PaymentState::Cancelled)?;
        self.do_transition(PaymentState::Cancelled, reason);
        Ok(())
    }

    /// Completed with the network's success code.
    pub fn is_successful(&self) -> bool {
        self.state == PaymentState::Completed
            && self.result_code.as_deref() == Some(SUCCESS_RESULT_CODE)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn require_state(&self, expected: PaymentState, target: PaymentState) -> Result<(), AttemptError> {
        if self.state.is_terminal() {
            return Err(AttemptError::TerminalState { state: self.state });
        }
        if self.state != expected {
            return Err(AttemptError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: PaymentState, reason: &str) {
        let now = Utc::now();
        self.transitions.push(TransitionRecord {
            from_state: self.state,
            to_state: to,
            timestamp: now,
            reason: reason.to_string(),
        });
        self.state = to;
        self.updated_at = now;
    }
}

/// Check an account reference before it is sent with a push.
pub fn validate_account_reference(reference: &str) -> Result<(), AttemptError> {
    if reference.trim().is_empty() {
        return Err(AttemptError::AccountReferenceEmpty);
    }
    let len = reference.chars().count();
    if len > MAX_ACCOUNT_REFERENCE_LEN {
        return Err(AttemptError::AccountReferenceTooLong {
            len,
            max: MAX_ACCOUNT_REFERENCE_LEN,
        });
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pesa_core::normalize_phone;

    fn new_input() -> NewPaymentAttempt {
        NewPaymentAttempt {
            payer_phone: normalize_phone("0712345678").unwrap(),
            amount: Decimal::from(500),
            purpose: PurposeCategory::ServicePayment,
            description: "Freight forwarding deposit".to_string(),
            transaction_reference: Some(TransactionReference::generate()),
            owner: None,
            extra_data: PaymentMetadata::new(),
        }
    }

    fn make_processing() -> PaymentAttempt {
        let mut attempt = PaymentAttempt::create(new_input()).unwrap();
        attempt
            .mark_processing(
                CheckoutRequestId::new("ws_CO_191220191020363925"),
                MerchantRequestId::new("29115-34620561-1"),
            )
            .unwrap();
        attempt
    }

    fn success(receipt: Option<&str>) -> SettlementOutcome {
        SettlementOutcome {
            result_code: "0".to_string(),
            result_description: "The service request is processed successfully.".to_string(),
            receipt: receipt.map(str::to_string),
            settled_at: None,
        }
    }

    fn cancelled_by_user() -> SettlementOutcome {
        SettlementOutcome {
            result_code: "1032".to_string(),
            result_description: "Request cancelled by user".to_string(),
            receipt: None,
            settled_at: None,
        }
    }

    #[test]
    fn new_attempt_is_pending() {
        let attempt = PaymentAttempt::create(new_input()).unwrap();
        assert_eq!(attempt.state, PaymentState::Pending);
        assert!(attempt.checkout_request_id.is_none());
        assert!(attempt.transitions.is_empty());
        assert_eq!(attempt.created_at, attempt.updated_at);
    }

    #[test]
    fn create_rejects_out_of_range_amount() {
        let mut input = new_input();
        input.amount = Decimal::from(150_001);
        assert!(matches!(
            PaymentAttempt::create(input),
            Err(AttemptError::Validation(ValidationError::AmountExceedsLimit { .. }))
        ));
    }

    #[test]
    fn create_rejects_long_description() {
        let mut input = new_input();
        input.description = "x".repeat(201);
        assert_eq!(
            PaymentAttempt::create(input).unwrap_err(),
            AttemptError::DescriptionTooLong { len: 201, max: 200 }
        );
    }

    #[test]
    fn ack_moves_to_processing() {
        let attempt = make_processing();
        assert_eq!(attempt.state, PaymentState::Processing);
        assert_eq!(
            attempt.checkout_request_id.as_ref().unwrap().as_str(),
            "ws_CO_191220191020363925"
        );
        assert_eq!(attempt.transitions.len(), 1);
    }

    #[test]
    fn tracking_id_set_only_once() {
        let mut attempt = make_processing();
        let err = attempt
            .mark_processing(CheckoutRequestId::new("other"), MerchantRequestId::new("m"))
            .unwrap_err();
        assert!(matches!(err, AttemptError::TrackingIdAlreadySet { .. }));
        assert_eq!(
            attempt.checkout_request_id.as_ref().unwrap().as_str(),
            "ws_CO_191220191020363925"
        );
    }

    #[test]
    fn initiation_failure_is_terminal() {
        let mut attempt = PaymentAttempt::create(new_input()).unwrap();
        attempt.mark_initiation_failed("token unavailable").unwrap();
        assert_eq!(attempt.state, PaymentState::Failed);
        assert!(attempt.is_terminal());
        assert!(attempt.result_code.is_none());
    }

    #[test]
    fn success_outcome_completes() {
        let mut attempt = make_processing();
        let applied = attempt.apply_outcome(success(Some("NLJ7RT61SV"))).unwrap();
        assert_eq!(applied, OutcomeApplied::Completed);
        assert_eq!(attempt.state, PaymentState::Completed);
        assert_eq!(attempt.receipt_number.as_deref(), Some("NLJ7RT61SV"));
        assert!(attempt.settled_at.is_some());
        assert!(attempt.is_successful());
    }

    #[test]
    fn failure_outcome_fails() {
        let mut attempt = make_processing();
        let applied = attempt.apply_outcome(cancelled_by_user()).unwrap();
        assert_eq!(applied, OutcomeApplied::Failed);
        assert_eq!(attempt.state, PaymentState::Failed);
        assert_eq!(attempt.result_code.as_deref(), Some("1032"));
        assert!(attempt.receipt_number.is_none());
        assert!(!attempt.is_successful());
    }

    #[test]
    fn success_without_receipt_is_rejected() {
        let mut attempt = make_processing();
        let err = attempt.apply_outcome(success(None)).unwrap_err();
        assert!(matches!(err, AttemptError::MissingReceiptNumber { .. }));
        assert_eq!(attempt.state, PaymentState::Processing);

        let err = attempt.apply_outcome(success(Some("  "))).unwrap_err();
        assert!(matches!(err, AttemptError::MissingReceiptNumber { .. }));
        assert!(attempt.result_code.is_none());
    }

    #[test]
    fn second_terminal_outcome_is_noop() {
        let mut attempt = make_processing();
        attempt.apply_outcome(success(Some("NLJ7RT61SV"))).unwrap();
        let snapshot = attempt.clone();

        let applied = attempt.apply_outcome(cancelled_by_user()).unwrap();
        assert_eq!(
            applied,
            OutcomeApplied::Duplicate {
                state: PaymentState::Completed
            }
        );
        assert_eq!(attempt, snapshot);
    }

    #[test]
    fn outcome_before_ack_is_rejected() {
        let mut attempt = PaymentAttempt::create(new_input()).unwrap();
        let err = attempt.apply_outcome(success(Some("R1"))).unwrap_err();
        assert_eq!(
            err,
            AttemptError::InvalidTransition {
                from: PaymentState::Pending,
                to: PaymentState::Completed
            }
        );
    }

    #[test]
    fn cancel_only_from_processing() {
        let mut pending = PaymentAttempt::create(new_input()).unwrap();
        assert!(pending.cancel("operator").is_err());

        let mut attempt = make_processing();
        attempt.cancel("customer called support").unwrap();
        assert_eq!(attempt.state, PaymentState::Cancelled);

        assert!(matches!(
            attempt.cancel("again"),
            Err(AttemptError::TerminalState { .. })
        ));
    }

    #[test]
    fn transition_log_is_ordered() {
        let mut attempt = make_processing();
        attempt.apply_outcome(cancelled_by_user()).unwrap();
        let edges: Vec<_> = attempt
            .transitions
            .iter()
            .map(|t| (t.from_state, t.to_state))
            .collect();
        assert_eq!(
            edges,
            vec![
                (PaymentState::Pending, PaymentState::Processing),
                (PaymentState::Processing, PaymentState::Failed),
            ]
        );
        assert!(attempt.transitions[1].reason.contains("1032"));
    }

    #[test]
    fn state_round_trips_through_storage_names() {
        for state in [
            PaymentState::Pending,
            PaymentState::Processing,
            PaymentState::Completed,
            PaymentState::Failed,
            PaymentState::Cancelled,
        ] {
            assert_eq!(state.as_str().parse::<PaymentState>().unwrap(), state);
        }
        assert!("PAID".parse::<PaymentState>().is_err());
    }

    #[test]
    fn purpose_serializes_snake_case() {
        let json = serde_json::to_string(&PurposeCategory::BookingPayment).unwrap();
        assert_eq!(json, "\"booking_payment\"");
    }

    #[test]
    fn account_reference_bounds() {
        assert!(validate_account_reference("Air Freight").is_ok());
        assert_eq!(
            validate_account_reference(" "),
            Err(AttemptError::AccountReferenceEmpty)
        );
        assert!(matches!(
            validate_account_reference(&"a".repeat(101)),
            Err(AttemptError::AccountReferenceTooLong { len: 101, .. })
        ));
    }

    #[test]
    fn metadata_keeps_documented_keys() {
        let mut meta = PaymentMetadata::new();
        meta.insert(PaymentMetadata::ACCOUNT_REFERENCE, "Air Freight");
        meta.insert("campaign", serde_json::json!({"utm": "newsletter"}));
        assert_eq!(meta.get_str(PaymentMetadata::ACCOUNT_REFERENCE), Some("Air Freight"));
        assert_eq!(meta.len(), 2);
    }
}
