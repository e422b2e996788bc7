//! Service catalog persistence.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use pesa_core::ServiceId;
use pesa_state::ServiceCatalogEntry;

use super::decode_error;

/// Insert a catalog entry.
pub async fn insert(pool: &PgPool, entry: &ServiceCatalogEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO service_catalog (id, name, description, base_price, is_active, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(*entry.id.as_uuid())
    .bind(&entry.name)
    .bind(&entry.description)
    .bind(entry.base_price.to_string())
    .bind(entry.is_active)
    .bind(entry.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the whole catalog on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ServiceCatalogEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, description, base_price, is_active, created_at
         FROM service_catalog ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ServiceRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: Uuid,
    name: String,
    description: String,
    base_price: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl ServiceRow {
    fn into_record(self) -> Result<ServiceCatalogEntry, sqlx::Error> {
        Ok(ServiceCatalogEntry {
            id: ServiceId::from_uuid(self.id),
            name: self.name,
            description: self.description,
            base_price: Decimal::from_str(&self.base_price).map_err(decode_error)?,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}
