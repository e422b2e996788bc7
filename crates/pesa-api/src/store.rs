//! # Payment Record Store
//!
//! In-memory storage of payment attempts, callback records and catalog
//! entries, using `DashMap`. When a Postgres pool is attached every write is
//! mirrored to the database, and [`PaymentStore::hydrate`] reloads state on
//! startup.
//!
//! ## Atomicity
//!
//! [`PaymentStore::update_payment`] runs the transition closure while
//! holding the map's entry guard, on a copy that is only committed if the
//! closure succeeds. Two concurrent deliveries of the same settlement
//! therefore serialize: the first moves the attempt out of `processing`,
//! the second observes a terminal state and becomes a no-op. The database
//! write uses the same condition (`WHERE state = <state before>`), so it
//! cannot overwrite a newer row either. If that write fails the in-memory
//! commit is rolled back, so a redelivery finds the attempt where the
//! database left it.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sqlx::PgPool;
use thiserror::Error;

use pesa_core::{CallbackId, CheckoutRequestId, PaymentId, ServiceId, TransactionReference};
use pesa_state::{AttemptError, CallbackRecord, PaymentAttempt, PaymentState, ServiceCatalogEntry};

use crate::db;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("payment {payment_id} not found")]
    PaymentNotFound { payment_id: PaymentId },

    #[error("service {service_id} not found")]
    ServiceNotFound { service_id: ServiceId },

    /// Transaction references are unique across all attempts.
    #[error("transaction reference {reference} already in use")]
    DuplicateReference { reference: String },

    #[error(transparent)]
    Attempt(#[from] AttemptError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

struct Inner {
    payments: DashMap<PaymentId, PaymentAttempt>,
    by_checkout: DashMap<CheckoutRequestId, PaymentId>,
    references: DashMap<TransactionReference, PaymentId>,
    callbacks: DashMap<CallbackId, CallbackRecord>,
    services: DashMap<ServiceId, ServiceCatalogEntry>,
    pool: Option<PgPool>,
}

/// Shared payment store.
///
/// Cheaply cloneable via `Arc`; all clones share the same data.
#[derive(Clone)]
pub struct PaymentStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PaymentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentStore")
            .field("payments", &self.inner.payments.len())
            .field("callbacks", &self.inner.callbacks.len())
            .field("services", &self.inner.services.len())
            .field("persistent", &self.inner.pool.is_some())
            .finish()
    }
}

impl Default for PaymentStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PaymentStore {
    pub fn new(pool: Option<PgPool>) -> Self {
        Self {
            inner: Arc::new(Inner {
                payments: DashMap::new(),
                by_checkout: DashMap::new(),
                references: DashMap::new(),
                callbacks: DashMap::new(),
                services: DashMap::new(),
                pool,
            }),
        }
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Load all persisted records into memory. No-op without a pool.
    pub async fn hydrate(&self) -> Result<(), StoreError> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };

        let payments = db::payments::load_all(pool).await?;
        let callbacks = db::callbacks::load_all(pool).await?;
        let services = db::services::load_all(pool).await?;
        tracing::info!(
            payments = payments.len(),
            callbacks = callbacks.len(),
            services = services.len(),
            "hydrated payment store from database"
        );

        for attempt in payments {
            self.index(&attempt);
            self.inner.payments.insert(attempt.id, attempt);
        }
        for record in callbacks {
            self.inner.callbacks.insert(record.id, record);
        }
        for entry in services {
            self.inner.services.insert(entry.id, entry);
        }
        Ok(())
    }

    // ── Payments ─────────────────────────────────────────────────────

    /// Insert a new attempt, enforcing transaction-reference uniqueness.
    pub async fn insert_payment(&self, attempt: PaymentAttempt) -> Result<(), StoreError> {
        if let Some(reference) = &attempt.transaction_reference {
            match self.inner.references.entry(reference.clone()) {
                Entry::Occupied(_) => {
                    return Err(StoreError::DuplicateReference {
                        reference: reference.to_string(),
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(attempt.id);
                }
            }
        }

        if let Some(pool) = self.pool() {
            if let Err(e) = db::payments::insert(pool, &attempt).await {
                if let Some(reference) = &attempt.transaction_reference {
                    self.inner.references.remove(reference);
                }
                return Err(e.into());
            }
        }

        self.inner.payments.insert(attempt.id, attempt);
        Ok(())
    }

    pub fn get_payment(&self, id: &PaymentId) -> Option<PaymentAttempt> {
        self.inner.payments.get(id).map(|p| p.value().clone())
    }

    /// Resolve a network checkout id to the owning attempt.
    pub fn find_by_checkout(&self, checkout_request_id: &CheckoutRequestId) -> Option<PaymentId> {
        self.inner
            .by_checkout
            .get(checkout_request_id)
            .map(|id| *id.value())
    }

    /// Apply `transition` to the attempt atomically.
    ///
    /// On success the updated attempt is committed, indexed and persisted,
    /// and returned together with the closure's result. On error nothing
    /// changes: a failed database write restores the previous attempt.
    pub async fn update_payment<F, R>(
        &self,
        id: &PaymentId,
        transition: F,
    ) -> Result<(R, PaymentAttempt), StoreError>
    where
        F: FnOnce(&mut PaymentAttempt) -> Result<R, AttemptError>,
    {
        let (result, before, updated, changed) = {
            let mut guard = self
                .inner
                .payments
                .get_mut(id)
                .ok_or(StoreError::PaymentNotFound { payment_id: *id })?;
            let before = guard.value().clone();
            let mut working = before.clone();
            let result = transition(&mut working)?;
            let changed = working != before;
            if changed {
                *guard.value_mut() = working.clone();
            }
            (result, before, working, changed)
        };

        if !changed {
            return Ok((result, updated));
        }

        if let Some(pool) = self.pool() {
            match db::payments::update(pool, &updated, before.state).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    payment_id = %updated.id,
                    expected_state = %before.state,
                    "payment row changed concurrently; database update skipped"
                ),
                Err(e) => {
                    self.restore(&updated, before);
                    return Err(e.into());
                }
            }
        }

        self.index(&updated);
        Ok((result, updated))
    }

    /// Put `before` back unless the attempt moved past `committed` meanwhile.
    fn restore(&self, committed: &PaymentAttempt, before: PaymentAttempt) {
        if let Some(mut guard) = self.inner.payments.get_mut(&committed.id) {
            if *guard.value() == *committed {
                tracing::warn!(
                    payment_id = %committed.id,
                    state = %before.state,
                    "database write failed; payment transition rolled back"
                );
                *guard.value_mut() = before;
            }
        }
    }

    /// Count attempts per state.
    pub fn count_by_state(&self) -> Vec<(PaymentState, usize)> {
        let mut counts = [
            (PaymentState::Pending, 0usize),
            (PaymentState::Processing, 0),
            (PaymentState::Completed, 0),
            (PaymentState::Failed, 0),
            (PaymentState::Cancelled, 0),
        ];
        for entry in self.inner.payments.iter() {
            if let Some(slot) = counts.iter_mut().find(|(s, _)| *s == entry.state) {
                slot.1 += 1;
            }
        }
        counts.to_vec()
    }

    fn index(&self, attempt: &PaymentAttempt) {
        if let Some(checkout) = &attempt.checkout_request_id {
            self.inner.by_checkout.insert(checkout.clone(), attempt.id);
        }
        if let Some(reference) = &attempt.transaction_reference {
            self.inner.references.insert(reference.clone(), attempt.id);
        }
    }

    // ── Callbacks ────────────────────────────────────────────────────

    /// Append a callback record.
    pub async fn insert_callback(&self, record: CallbackRecord) -> Result<(), StoreError> {
        if let Some(pool) = self.pool() {
            db::callbacks::insert(pool, &record).await?;
        }
        self.inner.callbacks.insert(record.id, record);
        Ok(())
    }

    /// Flag a callback record processed. Returns `false` if it already was
    /// or does not exist.
    pub async fn mark_callback_processed(&self, id: &CallbackId) -> Result<bool, StoreError> {
        let changed = match self.inner.callbacks.get_mut(id) {
            Some(mut record) => record.mark_processed(),
            None => false,
        };
        if changed {
            if let Some(pool) = self.pool() {
                db::callbacks::mark_processed(pool, id).await?;
            }
        }
        Ok(changed)
    }

    pub fn get_callback(&self, id: &CallbackId) -> Option<CallbackRecord> {
        self.inner.callbacks.get(id).map(|r| r.value().clone())
    }

    /// Callback records of one attempt, oldest first.
    pub fn callbacks_for(&self, payment_id: &PaymentId) -> Vec<CallbackRecord> {
        let mut records: Vec<CallbackRecord> = self
            .inner
            .callbacks
            .iter()
            .filter(|r| r.payment_id.as_ref() == Some(payment_id))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    pub fn callback_count(&self) -> usize {
        self.inner.callbacks.len()
    }

    // ── Service catalog ──────────────────────────────────────────────

    pub async fn insert_service(&self, entry: ServiceCatalogEntry) -> Result<(), StoreError> {
        if let Some(pool) = self.pool() {
            db::services::insert(pool, &entry).await?;
        }
        self.inner.services.insert(entry.id, entry);
        Ok(())
    }

    pub fn get_service(&self, id: &ServiceId) -> Option<ServiceCatalogEntry> {
        self.inner.services.get(id).map(|s| s.value().clone())
    }

    /// Active entries, ordered by name.
    pub fn list_active_services(&self) -> Vec<ServiceCatalogEntry> {
        let mut entries: Vec<ServiceCatalogEntry> = self
            .inner
            .services
            .iter()
            .filter(|s| s.is_active)
            .map(|s| s.value().clone())
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}
