//! Callback audit log persistence.
//!
//! Records are append-only; the only update is the one-way `processed` flag.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use pesa_core::{CallbackId, PaymentId};
use pesa_state::{CallbackKind, CallbackRecord};

/// Append a callback record.
pub async fn insert(pool: &PgPool, record: &CallbackRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO payment_callbacks (id, payment_id, kind, raw_data, processed, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(*record.id.as_uuid())
    .bind(record.payment_id.map(|p| *p.as_uuid()))
    .bind(record.kind.as_str())
    .bind(Json(&record.raw_data))
    .bind(record.processed)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set the processed flag.
pub async fn mark_processed(pool: &PgPool, id: &CallbackId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE payment_callbacks SET processed = true WHERE id = $1")
        .bind(*id.as_uuid())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all callback records on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CallbackRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CallbackRow>(
        "SELECT id, payment_id, kind, raw_data, processed, created_at
         FROM payment_callbacks ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CallbackRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct CallbackRow {
    id: Uuid,
    payment_id: Option<Uuid>,
    kind: String,
    raw_data: Json<serde_json::Value>,
    processed: bool,
    created_at: DateTime<Utc>,
}

impl CallbackRow {
    fn into_record(self) -> CallbackRecord {
        CallbackRecord {
            id: CallbackId::from_uuid(self.id),
            payment_id: self.payment_id.map(PaymentId::from_uuid),
            kind: CallbackKind::parse(&self.kind).unwrap_or_else(|| {
                tracing::warn!(
                    kind = %self.kind,
                    "unknown callback kind in database, treating as confirmation"
                );
                CallbackKind::Confirmation
            }),
            raw_data: self.raw_data.0,
            processed: self.processed,
            created_at: self.created_at,
        }
    }
}
