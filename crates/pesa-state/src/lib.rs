//! # pesa-state: Payment Lifecycle
//!
//! Runtime-checked state machines and records for the payment subsystem.
//!
//! - **Payment attempt** (`payment.rs`): `pending → processing → completed |
//!   failed`, with `pending → failed` on initiation failure and
//!   `processing → cancelled` on administrative cancellation. Terminal
//!   outcomes are applied at most once; a redelivered outcome is a no-op.
//!
//! - **Callback record** (`callback.rs`): append-only audit entry holding a
//!   webhook payload verbatim, with a one-way processed flag.
//!
//! - **Service catalog** (`catalog.rs`): priced services a checkout can be
//!   started from.
//!
//! Records here are plain data. Persistence and network I/O live in
//! `pesa-api` and `pesa-client`.

pub mod callback;
pub mod catalog;
pub mod payment;

pub use callback::{CallbackKind, CallbackRecord};
pub use catalog::{CatalogError, ServiceCatalogEntry};
pub use payment::{
    validate_account_reference, AttemptError, NewPaymentAttempt, OutcomeApplied, PaymentAttempt,
    PaymentMetadata, PaymentState, PurposeCategory, SettlementOutcome, TransitionRecord,
    MAX_ACCOUNT_REFERENCE_LEN, MAX_DESCRIPTION_LEN, SUCCESS_RESULT_CODE,
};
