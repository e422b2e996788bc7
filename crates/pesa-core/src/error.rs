//! # Validation Errors
//!
//! Input validation failures. These are surfaced to the end user as-is and
//! are never retried.

use thiserror::Error;

/// Rejection of a caller-supplied phone number or amount.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The phone number does not normalize to a 12-digit `254XXXXXXXXX` value.
    #[error("invalid phone number format: '{raw}' normalizes to '{normalized}' ({len} digits, expected 12)")]
    InvalidPhoneFormat {
        /// The value supplied by the caller.
        raw: String,
        /// The digit string after prefix handling.
        normalized: String,
        /// Length of `normalized`.
        len: usize,
    },

    /// The amount could not be parsed as a decimal number.
    #[error("invalid amount format: '{raw}'")]
    InvalidAmountFormat {
        /// The value supplied by the caller.
        raw: String,
    },

    /// The amount is zero or negative.
    #[error("amount must be greater than 0, got {amount}")]
    AmountNotPositive {
        /// The parsed amount.
        amount: String,
    },

    /// The amount is above the network's per-transaction limit.
    #[error("amount {amount} exceeds M-Pesa transaction limit ({limit} KSh)")]
    AmountExceedsLimit {
        /// The parsed amount.
        amount: String,
        /// The configured limit.
        limit: String,
    },
}
