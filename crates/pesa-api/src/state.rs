//! # Application State
//!
//! Shared state handed to every handler: the payment store, the optional
//! STK gateway and the server configuration.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use pesa_client::StkGateway;

use crate::config::ServerConfig;
use crate::store::PaymentStore;

/// Shared application state.
///
/// Cheaply cloneable; clones share the same store and gateway.
#[derive(Clone)]
pub struct AppState {
    pub store: PaymentStore,
    /// `None` when no M-Pesa credentials are configured. Payment routes
    /// then answer 503 while the webhook and catalog keep working.
    pub gateway: Option<Arc<dyn StkGateway>>,
    pub config: ServerConfig,
    /// Handle of the installed Prometheus recorder, when metrics are on.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("gateway", &self.gateway.is_some())
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// In-memory state with no gateway and default configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default(), PaymentStore::default(), None, None)
    }

    pub fn with_config(
        config: ServerConfig,
        store: PaymentStore,
        gateway: Option<Arc<dyn StkGateway>>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
            metrics,
        }
    }

    /// Replace the gateway.
    pub fn with_gateway(mut self, gateway: Arc<dyn StkGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// The gateway, or 503 when none is configured.
    pub fn require_gateway(&self) -> Result<Arc<dyn StkGateway>, crate::error::AppError> {
        self.gateway.clone().ok_or_else(|| {
            crate::error::AppError::ServiceUnavailable(
                "M-Pesa client not configured: set MPESA_* credentials".into(),
            )
        })
    }
}
