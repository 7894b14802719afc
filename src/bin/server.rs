//! Storefront API server binary.

use storefront_core::config::StorefrontConfig;
use storefront_core::logging::init_logging;
use storefront_core::web::{router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = StorefrontConfig::from_env()?;
    let bind_address = config.bind_address.clone();

    let state = AppState::from_config(config).await?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(%bind_address, "Storefront server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
