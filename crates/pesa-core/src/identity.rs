//! # Identity Newtypes
//!
//! Identifier newtypes for the payment stack. Each identifier is a distinct
//! type: a [`MerchantRequestId`] cannot be passed where a
//! [`CheckoutRequestId`] is expected, even though both are network-issued
//! strings.
//!
//! UUID-based identifiers ([`PaymentId`], [`ServiceId`], [`UserId`],
//! [`CallbackId`]) are owned by this system and always valid by
//! construction. String-based identifiers are either issued by the M-Pesa
//! network ([`CheckoutRequestId`], [`MerchantRequestId`]) or generated
//! locally ([`TransactionReference`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a UUID-backed identifier with the usual constructors.
macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $ty(Uuid);

        impl $ty {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

/// Generates a string-backed identifier issued by the payment network.
macro_rules! network_identifier {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $ty(String);

        impl $ty {
            /// Wrap a network-issued identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $ty {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $ty {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

uuid_identifier!(
    /// Locally generated identity of a payment attempt.
    PaymentId
);

uuid_identifier!(
    /// Identity of a service catalog entry.
    ServiceId
);

uuid_identifier!(
    /// Weak reference to an end-user account owned by the website layer.
    UserId
);

uuid_identifier!(
    /// Identity of an entry in the callback audit log.
    CallbackId
);

network_identifier!(
    /// `CheckoutRequestID` assigned by the network when a push is accepted.
    /// Key for status queries and callback correlation.
    CheckoutRequestId
);

network_identifier!(
    /// `MerchantRequestID` assigned by the network alongside the checkout id.
    MerchantRequestId
);

/// System-assigned business reference for a payment attempt.
///
/// Distinct from [`PaymentId`]: this is the short, human-quotable reference
/// printed on receipts and used in support conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionReference(String);

impl TransactionReference {
    /// Prefix of generated references.
    pub const PREFIX: &'static str = "TXN";

    /// Generate a fresh reference, e.g. `TXN4F1A09C2BE`.
    pub fn generate() -> Self {
        let id = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("{}{}", Self::PREFIX, &id[..10]))
    }

    /// Wrap an existing reference (e.g. one loaded from storage).
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Borrow the reference text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
