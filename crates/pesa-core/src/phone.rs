//! # Phone Number Normalization
//!
//! The M-Pesa network addresses payers by MSISDN in international form
//! without a leading `+`: `254` followed by a 9-digit subscriber number.
//! Customers type numbers in many shapes (`0712 345 678`, `+254-712-345678`,
//! `712345678`); [`normalize_phone`] maps all of them onto that single form.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Kenya's country calling code.
pub const COUNTRY_CODE: &str = "254";

/// National trunk prefix replaced by [`COUNTRY_CODE`].
const TRUNK_PREFIX: char = '0';

/// Length of a canonical MSISDN (`254` + 9 digits).
const CANONICAL_LEN: usize = 12;

/// A phone number in canonical `254XXXXXXXXX` form.
///
/// Only constructible through [`normalize_phone`] (or deserialization,
/// which routes through it), so holding a `CanonicalPhone` proves the
/// value passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalPhone(String);

impl CanonicalPhone {
    /// Borrow the 12-digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CanonicalPhone {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_phone(s)
    }
}

impl<'de> Deserialize<'de> for CanonicalPhone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        normalize_phone(&raw).map_err(serde::de::Error::custom)
    }
}

/// Canonicalize a local or international Kenyan phone number.
///
/// Keeps only ASCII digits (separators, spaces and `+` are dropped), then:
/// - a leading `0` is replaced by `254`;
/// - a value already starting with `254` is left alone;
/// - anything else gets `254` prepended.
///
/// # Errors
///
/// [`ValidationError::InvalidPhoneFormat`] unless the result is exactly 12
/// digits.
pub fn normalize_phone(raw: &str) -> Result<CanonicalPhone, ValidationError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let normalized = if let Some(rest) = digits.strip_prefix(TRUNK_PREFIX) {
        format!("{COUNTRY_CODE}{rest}")
    } else if digits.starts_with(COUNTRY_CODE) {
        digits
    } else {
        format!("{COUNTRY_CODE}{digits}")
    };

    if normalized.len() != CANONICAL_LEN {
        return Err(ValidationError::InvalidPhoneFormat {
            raw: raw.to_string(),
            len: normalized.len(),
            normalized,
        });
    }

    Ok(CanonicalPhone(normalized))
}
