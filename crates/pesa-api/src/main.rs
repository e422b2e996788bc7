//! # pesa-api: Binary Entry Point
//!
//! Reads configuration from the environment, connects the optional
//! database, builds the M-Pesa client and serves the API.

use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;

use pesa_api::config::ServerConfig;
use pesa_api::store::PaymentStore;
use pesa_api::AppState;
use pesa_client::{DarajaClient, DarajaConfig, StkGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(?config, "starting pesa-api");

    let metrics = if config.metrics_enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing Prometheus recorder")?;
        Some(handle)
    } else {
        None
    };

    let db_pool = pesa_api::db::init_pool(config.database_url.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let gateway: Option<Arc<dyn StkGateway>> = match DarajaConfig::from_env() {
        Ok(daraja_config) => {
            tracing::info!(environment = %daraja_config.environment, "M-Pesa client configured");
            let client = DarajaClient::new(daraja_config).context("building M-Pesa client")?;
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!("M-Pesa client not configured: {e}. Payment endpoints will return 503.");
            None
        }
    };

    let store = PaymentStore::new(db_pool);
    store.hydrate().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    let addr = config.bind;
    let state = AppState::with_config(config, store, gateway, metrics);
    let app = pesa_api::app(state);

    tracing::info!("pesa-api listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
