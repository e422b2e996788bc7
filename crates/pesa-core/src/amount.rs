//! # Amount Validation
//!
//! Amounts arrive as user-typed text. [`validate_amount`] parses them into a
//! [`Decimal`] and checks them against the M-Pesa per-transaction limit. The
//! returned value keeps full precision; truncation to whole shillings only
//! happens at the wire boundary via [`whole_units`].

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::ValidationError;

/// Maximum amount for a single M-Pesa transaction, in KSh.
pub const MAX_TRANSACTION_AMOUNT: Decimal = Decimal::from_parts(150_000, 0, 0, false, 0);

/// Parse and range-check a payment amount.
///
/// # Errors
///
/// - [`ValidationError::InvalidAmountFormat`] if `raw` is not a decimal number.
/// - [`ValidationError::AmountNotPositive`] if the amount is `<= 0`.
/// - [`ValidationError::AmountExceedsLimit`] if the amount is above
///   [`MAX_TRANSACTION_AMOUNT`].
pub fn validate_amount(raw: &str) -> Result<Decimal, ValidationError> {
    let amount =
        Decimal::from_str(raw.trim()).map_err(|_| ValidationError::InvalidAmountFormat {
            raw: raw.to_string(),
        })?;

    check_amount(amount)
}

/// Range-check an amount that is already a [`Decimal`].
pub fn check_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::AmountNotPositive {
            amount: amount.to_string(),
        });
    }

    if amount > MAX_TRANSACTION_AMOUNT {
        return Err(ValidationError::AmountExceedsLimit {
            amount: amount.to_string(),
            limit: MAX_TRANSACTION_AMOUNT.to_string(),
        });
    }

    Ok(amount)
}

/// Truncate an amount to whole currency units, as the network requires.
///
/// Returns `None` only if the truncated value does not fit in an `i64`,
/// which cannot happen for amounts that passed [`validate_amount`].
pub fn whole_units(amount: Decimal) -> Option<i64> {
    amount.trunc().to_i64()
}
