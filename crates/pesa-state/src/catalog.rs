//! # Service Catalog
//!
//! Priced services shown on the website. A service-payment checkout takes
//! its amount from [`ServiceCatalogEntry::base_price`] and its account
//! reference from the service name.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pesa_core::{check_amount, ServiceId, ValidationError};

use crate::payment::MAX_ACCOUNT_REFERENCE_LEN;

/// Errors raised when building a catalog entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("service name must not be empty")]
    EmptyName,

    /// The name doubles as the push account reference, so it shares that limit.
    #[error("service name is {len} characters, maximum is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("invalid base price: {0}")]
    InvalidPrice(#[from] ValidationError),
}

/// A priced service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCatalogEntry {
    pub id: ServiceId,
    pub name: String,
    pub description: String,
    pub base_price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ServiceCatalogEntry {
    /// Build an active entry. The base price must be a valid payment amount.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        base_price: Decimal,
    ) -> Result<Self, CatalogError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }
        let len = name.chars().count();
        if len > MAX_ACCOUNT_REFERENCE_LEN {
            return Err(CatalogError::NameTooLong {
                len,
                max: MAX_ACCOUNT_REFERENCE_LEN,
            });
        }
        let base_price = check_amount(base_price)?;

        Ok(Self {
            id: ServiceId::new(),
            name,
            description: description.into(),
            base_price,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}
