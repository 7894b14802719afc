//! # Cart and Order Handlers
//!
//! Cart mutation, checkout, cancellation, and the read-only order detail
//! projection (order + line items + tracking history + progress index).
//!
//! Identity is an external collaborator; handlers take an explicit `user_id`
//! where the original relied on the session user.

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{Order, OrderItem, OrderTracking, PaymentAttempt, Product};
use crate::state_machine::{OrderEvent, OrderStateMachine};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// In-stock catalog listing: GET /v1/products
pub async fn list_products(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ProductResponse>>> {
    let products = Product::list_in_stock(&state.pool).await?;
    Ok(Json(
        products
            .into_iter()
            .map(|p| ProductResponse {
                id: p.id,
                name: p.name,
                price: p.price,
                quantity: p.quantity,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub user_id: i64,
    pub product_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub total_amount: Decimal,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TrackingEntry {
    pub status: String,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct PaymentSummary {
    pub id: i64,
    pub amount: Decimal,
    pub phone_number: String,
    pub status: String,
    pub checkout_request_id: Option<String>,
}

/// Order detail projection
#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    /// Position in the fixed tracking sequence
    /// `[pending, processing, shipped, completed, cancelled]`
    pub progress_index: usize,
    pub total_amount: Decimal,
    pub shipping_address: Option<String>,
    pub created_at: NaiveDateTime,
    pub items: Vec<OrderItemResponse>,
    pub tracking: Vec<TrackingEntry>,
    pub pending_payments: Vec<PaymentSummary>,
}

fn order_response(order: &Order) -> OrderResponse {
    OrderResponse {
        id: order.id,
        user_id: order.user_id,
        status: order.status.clone(),
        total_amount: order.total_amount,
        created_at: order.created_at,
    }
}

/// Add one unit of a product to the caller's open cart: POST /v1/carts/items
///
/// Creates the pending order implicitly when the cart is empty; a product
/// already in the cart has its quantity incremented.
pub async fn add_to_cart(
    State(state): State<AppState>,
    Json(request): Json<AddToCartRequest>,
) -> ApiResult<Json<CartItemResponse>> {
    let product = Product::find_by_id(&state.pool, request.product_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !product.is_in_stock {
        return Err(ApiError::unprocessable(format!(
            "Product '{}' is out of stock",
            product.name
        )));
    }

    let order = Order::open_cart_for_user(&state.pool, request.user_id).await?;
    let item = OrderItem::add_one(&state.pool, order.id, product.id, product.price).await?;

    info!(
        order_id = order.id,
        product_id = product.id,
        quantity = item.quantity,
        "Added product to cart"
    );

    Ok(Json(CartItemResponse {
        order_id: item.order_id,
        product_id: item.product_id,
        quantity: item.quantity,
        unit_price: item.unit_price,
    }))
}

/// Recompute the cart total ahead of payment: POST /v1/carts/checkout
pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state.checkout_service().checkout(request.user_id).await?;
    Ok(Json(order_response(&order)))
}

/// Order detail projection: GET /v1/orders/:id
pub async fn order_detail(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<OrderDetailResponse>> {
    let order = Order::find_by_id(&state.pool, order_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let items = OrderItem::for_order(&state.pool, order.id).await?;
    let tracking = OrderTracking::history(&state.pool, order.id).await?;
    let pending = PaymentAttempt::find_pending_for_order(&state.pool, order.id).await?;

    let progress_index = order
        .state()
        .map(|s| s.progress_index())
        .map_err(|_| ApiError::Internal)?;

    Ok(Json(OrderDetailResponse {
        id: order.id,
        user_id: order.user_id,
        status: order.status.clone(),
        progress_index,
        total_amount: order.total_amount,
        shipping_address: order.shipping_address.clone(),
        created_at: order.created_at,
        items: items
            .iter()
            .map(|item| OrderItemResponse {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total(),
            })
            .collect(),
        tracking: tracking
            .into_iter()
            .map(|entry| TrackingEntry {
                status: entry.status,
                note: entry.note,
                created_at: entry.created_at,
            })
            .collect(),
        pending_payments: pending
            .into_iter()
            .map(|attempt| PaymentSummary {
                id: attempt.id,
                amount: attempt.amount,
                phone_number: attempt.phone_number,
                status: attempt.status,
                checkout_request_id: attempt.checkout_request_id,
            })
            .collect(),
    }))
}

/// Cancel an open order: POST /v1/orders/:id/cancel
///
/// Only legal while the order is still pending; a shipped or paid order
/// returns 422 with the transition error and its status stays unchanged.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(request): Json<CancelOrderRequest>,
) -> ApiResult<Json<OrderResponse>> {
    let order = Order::find_for_user(&state.pool, order_id, request.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let machine = OrderStateMachine::new(order.id, state.pool.clone());
    machine.transition(OrderEvent::Cancel).await?;

    info!(order_id = order.id, "Order cancelled by customer");

    let order = Order::find_by_id(&state.pool, order.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(order_response(&order)))
}
