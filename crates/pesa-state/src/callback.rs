//! # Callback Audit Records
//!
//! Every webhook delivery is kept verbatim as a [`CallbackRecord`], whether
//! or not it could be parsed or matched to a payment. Records are appended,
//! flagged processed once their outcome has been applied, and never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pesa_core::{CallbackId, PaymentId};

/// Which webhook delivered the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackKind {
    /// Settlement result for an STK push.
    Confirmation,
    /// Pre-settlement validation request.
    Validation,
}

impl CallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::Validation => "validation",
        }
    }

    /// Parse a storage name. Unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirmation" => Some(Self::Confirmation),
            "validation" => Some(Self::Validation),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw webhook payload kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackRecord {
    pub id: CallbackId,
    /// Owning attempt; `None` when the payload could not be correlated.
    pub payment_id: Option<PaymentId>,
    pub kind: CallbackKind,
    /// The payload exactly as received.
    pub raw_data: serde_json::Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl CallbackRecord {
    pub fn new(
        payment_id: Option<PaymentId>,
        kind: CallbackKind,
        raw_data: serde_json::Value,
    ) -> Self {
        Self {
            id: CallbackId::new(),
            payment_id,
            kind,
            raw_data,
            processed: false,
            created_at: Utc::now(),
        }
    }

    /// Flag the record processed. Returns `false` if it already was.
    pub fn mark_processed(&mut self) -> bool {
        if self.processed {
            return false;
        }
        self.processed = true;
        true
    }
}
