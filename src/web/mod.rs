//! # Web Surface
//!
//! Axum router, shared state, and error conversions for the storefront API.

pub mod errors;
pub mod handlers;
pub mod state;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/ready", get(handlers::health::readiness_probe))
        .route("/v1/products", get(handlers::orders::list_products))
        .route("/v1/carts/items", post(handlers::orders::add_to_cart))
        .route("/v1/carts/checkout", post(handlers::orders::checkout))
        .route("/v1/orders/:id", get(handlers::orders::order_detail))
        .route("/v1/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route(
            "/v1/orders/:id/payments",
            get(handlers::payments::list_order_payments)
                .post(handlers::payments::initiate_payment),
        )
        .route(
            "/v1/payments/mpesa/callback",
            post(handlers::payments::mpesa_callback),
        )
        .with_state(state)
}
