//! STK request password generation.
//!
//! The password is `base64(shortCode + passkey + timestamp)`, where the
//! timestamp is the request time as `YYYYMMDDHHMMSS` in East Africa Time.
//! The same timestamp must be sent alongside the password, so both are
//! produced together from a single instant and regenerated per request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use zeroize::Zeroizing;

/// Wire format of the `Timestamp` field.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// East Africa Time offset from UTC, in hours. The network validates the
/// timestamp against its own local clock.
pub const NETWORK_UTC_OFFSET_HOURS: i64 = 3;

/// A password together with the timestamp it was derived from.
#[derive(Clone)]
pub struct StkPassword {
    pub password: Zeroizing<String>,
    pub timestamp: String,
}

impl std::fmt::Debug for StkPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StkPassword")
            .field("password", &"[REDACTED]")
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Render `at` in the network's timestamp format and local time.
pub fn network_timestamp(at: DateTime<Utc>) -> String {
    (at.naive_utc() + Duration::hours(NETWORK_UTC_OFFSET_HOURS))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Derive the request password for `at`.
///
/// Pure: two calls with the same inputs in the same second yield the same
/// password.
pub fn generate(short_code: &str, passkey: &str, at: DateTime<Utc>) -> StkPassword {
    let timestamp = network_timestamp(at);
    let raw = Zeroizing::new(format!("{short_code}{passkey}{timestamp}"));
    StkPassword {
        password: Zeroizing::new(STANDARD.encode(raw.as_bytes())),
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PASSKEY: &str = "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 10, 15, h, m, s).unwrap()
    }

    #[test]
    fn timestamp_is_east_africa_time() {
        assert_eq!(network_timestamp(at(7, 30, 0)), "20231015103000");
    }

    #[test]
    fn timestamp_rolls_over_midnight() {
        assert_eq!(network_timestamp(at(22, 15, 9)), "20231016011509");
    }

    #[test]
    fn password_is_base64_of_concatenation() {
        let generated = generate("174379", PASSKEY, at(7, 30, 0));
        let expected = STANDARD.encode(format!("174379{PASSKEY}20231015103000"));
        assert_eq!(generated.password.as_str(), expected);
        assert_eq!(generated.timestamp, "20231015103000");
    }

    #[test]
    fn same_second_same_password() {
        let a = generate("174379", PASSKEY, at(7, 30, 0));
        let b = generate("174379", PASSKEY, at(7, 30, 0));
        assert_eq!(a.password, b.password);

        let c = generate("174379", PASSKEY, at(7, 30, 1));
        assert_ne!(a.password, c.password);
    }

    #[test]
    fn debug_redacts_password() {
        let generated = generate("174379", PASSKEY, at(7, 30, 0));
        let rendered = format!("{generated:?}");
        assert!(!rendered.contains(generated.password.as_str()));
        assert!(rendered.contains("20231015103000"));
    }
}
