//! Property tests for phone and amount normalization.

use pesa_core::{normalize_phone, validate_amount, ValidationError};
use proptest::prelude::*;

proptest! {
    #[test]
    fn local_numbers_map_to_country_code(subscriber in "[0-9]{9}") {
        let phone = normalize_phone(&format!("0{subscriber}")).expect("0 + 9 digits is valid");
        prop_assert_eq!(phone.as_str(), format!("254{subscriber}"));
    }

    #[test]
    fn normalization_is_idempotent(subscriber in "[0-9]{9}", form in 0usize..4) {
        let raw = match form {
            0 => format!("0{subscriber}"),
            1 => format!("+254{subscriber}"),
            2 => format!("254{subscriber}"),
            _ => format!("{} {} {}", &subscriber[..3], &subscriber[3..6], &subscriber[6..]),
        };
        // A bare subscriber number starting with 0 is a trunk-prefixed
        // 8-digit number, which is legitimately invalid.
        if let Ok(once) = normalize_phone(&raw) {
            let twice = normalize_phone(once.as_str()).expect("canonical form stays valid");
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn canonical_output_is_always_twelve_digits(raw in ".{0,20}") {
        if let Ok(phone) = normalize_phone(&raw) {
            prop_assert_eq!(phone.as_str().len(), 12);
            prop_assert!(phone.as_str().starts_with("254"));
            prop_assert!(phone.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn whole_amounts_in_range_accepted(amount in 1u32..=150_000) {
        let parsed = validate_amount(&amount.to_string()).expect("in range");
        prop_assert_eq!(parsed.to_string(), amount.to_string());
    }

    #[test]
    fn amounts_above_limit_rejected(amount in 150_001u64..10_000_000) {
        let is_exceeds = matches!(
            validate_amount(&amount.to_string()),
            Err(ValidationError::AmountExceedsLimit { .. })
        );
        prop_assert!(is_exceeds);
    }
}
