//! # Checkout Service
//!
//! Customer-facing side of the payment flow: recompute the cart total at
//! checkout, then initiate an STK push and persist the attempt.
//!
//! Every push that reaches the gateway leaves a [`PaymentAttempt`] row holding
//! the raw gateway payload, whether the gateway accepted it or not; only a
//! transport failure (connection error, timeout) persists nothing and is
//! surfaced to the caller.

use crate::models::{NewPaymentAttempt, Order, OrderItem, PaymentAttempt, PaymentStoreError};
use crate::mpesa::{MpesaClient, MpesaError};
use crate::state_machine::{OrderState, PaymentState};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Order not found")]
    OrderNotFound,

    #[error("Order has no line items")]
    EmptyOrder,

    #[error("Order is not open for payment")]
    OrderNotOpen,

    #[error(transparent)]
    Gateway(#[from] MpesaError),

    #[error(transparent)]
    PaymentStore(#[from] PaymentStoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of initiating a push payment
#[derive(Debug)]
pub struct PaymentInitiation {
    pub attempt: PaymentAttempt,
    /// Whether the gateway accepted the push (a callback will follow)
    pub accepted: bool,
    /// User-facing outcome message
    pub message: String,
}

pub struct CheckoutService {
    pool: PgPool,
    mpesa: MpesaClient,
}

impl CheckoutService {
    pub fn new(pool: PgPool, mpesa: MpesaClient) -> Self {
        Self { pool, mpesa }
    }

    /// Prepare the customer's open cart for payment.
    ///
    /// Recomputes `total_amount` from the line items so the amount pushed to
    /// the gateway matches what the customer sees.
    pub async fn checkout(&self, user_id: i64) -> Result<Order, CheckoutError> {
        let order = Order::open_cart_for_user(&self.pool, user_id).await?;

        let items = OrderItem::for_order(&self.pool, order.id).await?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }

        let mut tx = self.pool.begin().await?;
        Order::recompute_total(&mut tx, order.id).await?;
        tx.commit().await?;

        Order::find_by_id(&self.pool, order.id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)
    }

    /// Send one STK push for an order and record the attempt.
    ///
    /// Phone normalization failures and transport errors propagate without
    /// touching the database. A gateway-declined push is persisted as a
    /// `failed` attempt right away; an accepted one as `pending`, to be
    /// finalized by the callback.
    pub async fn initiate_payment(
        &self,
        order_id: i64,
        user_id: i64,
        phone_number: &str,
    ) -> Result<PaymentInitiation, CheckoutError> {
        let order = Order::find_for_user(&self.pool, order_id, user_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.state() != Ok(OrderState::Pending) {
            return Err(CheckoutError::OrderNotOpen);
        }
        let items = OrderItem::for_order(&self.pool, order.id).await?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }

        let push = self
            .mpesa
            .stk_push(order.id, order.total_amount, phone_number)
            .await?;

        let (status, message) = if push.accepted() {
            (
                PaymentState::Pending,
                "STK push sent. Complete payment on your phone.".to_string(),
            )
        } else {
            (
                PaymentState::Failed,
                format!(
                    "Failed to initiate M-Pesa payment: {}",
                    push.error_description()
                ),
            )
        };

        let attempt = PaymentAttempt::create(
            &self.pool,
            NewPaymentAttempt {
                order_id: Some(order.id),
                amount: push.charged_amount,
                phone_number: push.phone_number.clone(),
                mpesa_receipt: None,
                checkout_request_id: push.checkout_request_id().map(str::to_string),
                response: push.raw.clone(),
                status,
            },
        )
        .await?;

        if push.accepted() {
            info!(
                order_id = order.id,
                attempt_id = attempt.id,
                correlation_id = ?attempt.checkout_request_id,
                "STK push accepted by gateway"
            );
        } else {
            warn!(
                order_id = order.id,
                attempt_id = attempt.id,
                message = %message,
                "STK push declined by gateway"
            );
        }

        Ok(PaymentInitiation {
            attempt,
            accepted: push.accepted(),
            message,
        })
    }
}
