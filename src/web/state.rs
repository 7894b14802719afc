//! # Web Application State
//!
//! Shared state for the web surface: database pool, gateway client, and
//! configuration, all built explicitly at startup.

use crate::config::StorefrontConfig;
use crate::error::{Result, StorefrontError};
use crate::mpesa::MpesaClient;
use crate::services::{CheckoutService, ReconciliationService};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub mpesa: MpesaClient,
    pub config: StorefrontConfig,
}

impl AppState {
    /// Build the application state from configuration: connect the pool and
    /// construct the gateway client.
    pub async fn from_config(config: StorefrontConfig) -> Result<Self> {
        info!(
            max_connections = config.database.max_connections,
            "Connecting database pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.database.url)
            .await
            .map_err(|e| StorefrontError::DatabaseError(e.to_string()))?;

        let mpesa = MpesaClient::new(config.mpesa.clone())
            .map_err(|e| StorefrontError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            pool,
            mpesa,
            config,
        })
    }

    pub fn checkout_service(&self) -> CheckoutService {
        CheckoutService::new(self.pool.clone(), self.mpesa.clone())
    }

    pub fn reconciliation_service(&self) -> ReconciliationService {
        ReconciliationService::new(self.pool.clone())
    }
}
