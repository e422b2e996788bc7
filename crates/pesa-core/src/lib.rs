//! # pesa-core: Foundational Types for the M-Pesa Payment Stack
//!
//! Leaf crate of the workspace. Defines the identifier newtypes shared by
//! every other crate, the canonical phone number type required by the
//! M-Pesa network, and the amount rules enforced before any money moves.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `PaymentId`, `CheckoutRequestId`,
//!    `TransactionReference` and friends are distinct types. A checkout
//!    request id cannot be passed where a merchant request id is expected.
//!
//! 2. **Validated phone numbers.** [`CanonicalPhone`] can only be built by
//!    [`normalize_phone`], so every value in the system is the 12-digit
//!    `254XXXXXXXXX` form.
//!
//! 3. **Decimal amounts.** Amounts are [`rust_decimal::Decimal`] end to end.
//!    Floats never touch money.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pesa-*` crates.
//! - No I/O.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod error;
pub mod identity;
pub mod phone;

pub use amount::{check_amount, validate_amount, whole_units, MAX_TRANSACTION_AMOUNT};
pub use error::ValidationError;
pub use identity::{
    CallbackId, CheckoutRequestId, MerchantRequestId, PaymentId, ServiceId, TransactionReference,
    UserId,
};
pub use phone::{normalize_phone, CanonicalPhone, COUNTRY_CODE};
