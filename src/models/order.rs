//! # Order Model
//!
//! Cart-like mutable order aggregate with a status column managed by the
//! [`crate::state_machine::OrderStateMachine`].
//!
//! ## Overview
//!
//! An order is created implicitly (status `pending`) the first time a customer
//! adds an item to an empty cart. The total is recomputed from line items at
//! checkout, never live. Once paid, orders are never hard-deleted.
//!
//! ## Database Schema
//!
//! Maps to the `orders` table:
//! ```sql
//! CREATE TABLE orders (
//!   id BIGSERIAL PRIMARY KEY,
//!   user_id BIGINT NOT NULL,
//!   status VARCHAR NOT NULL DEFAULT 'pending',
//!   total_amount NUMERIC(12,2) NOT NULL DEFAULT 0,
//!   shipping_address TEXT,
//!   created_at TIMESTAMP NOT NULL DEFAULT NOW(),
//!   pending_at TIMESTAMP,
//!   processing_at TIMESTAMP,
//!   shipped_at TIMESTAMP,
//!   completed_at TIMESTAMP,
//!   cancelled_at TIMESTAMP
//! );
//!
//! CREATE UNIQUE INDEX idx_orders_one_open_cart ON orders (user_id)
//!   WHERE status = 'pending';
//! ```
//!
//! One nullable timestamp column exists per status; the state machine stamps
//! the matching column on each transition. The partial unique index enforces
//! at most one open cart per customer.

use crate::state_machine::OrderState;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub total_amount: Decimal,
    pub shipping_address: Option<String>,
    pub created_at: NaiveDateTime,
    pub pending_at: Option<NaiveDateTime>,
    pub processing_at: Option<NaiveDateTime>,
    pub shipped_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
}

const ORDER_COLUMNS: &str = "id, user_id, status, total_amount, shipping_address, created_at, \
                             pending_at, processing_at, shipped_at, completed_at, cancelled_at";

impl Order {
    /// Parse the status column into the typed state
    pub fn state(&self) -> Result<OrderState, String> {
        self.status.parse()
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, Self>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an order scoped to its owning customer
    pub async fn find_for_user(
        pool: &PgPool,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Self>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Find the customer's open cart, creating one when none exists.
    ///
    /// Mirrors the implicit order creation on first add-to-cart: at most one
    /// pending order per customer is used as the cart.
    pub async fn open_cart_for_user(pool: &PgPool, user_id: i64) -> Result<Self, sqlx::Error> {
        let query =
            format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND status = 'pending' ORDER BY id LIMIT 1");
        if let Some(order) = sqlx::query_as::<_, Self>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await?
        {
            return Ok(order);
        }

        // Two concurrent first adds can race past the select; the partial
        // unique index on (user_id) WHERE status = 'pending' turns the
        // loser's insert into a no-op, and the follow-up select finds the
        // winner's cart.
        let insert = format!(
            "INSERT INTO orders (user_id, status, pending_at) VALUES ($1, 'pending', NOW()) \
             ON CONFLICT (user_id) WHERE status = 'pending' DO NOTHING \
             RETURNING {ORDER_COLUMNS}"
        );
        if let Some(order) = sqlx::query_as::<_, Self>(&insert)
            .bind(user_id)
            .fetch_optional(pool)
            .await?
        {
            return Ok(order);
        }

        sqlx::query_as::<_, Self>(&query)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Recompute the order total from its line items inside a transaction.
    ///
    /// The invariant is that `total_amount` equals the sum of
    /// `quantity * unit_price` over the line items as of the last recompute.
    pub async fn recompute_total(
        conn: &mut PgConnection,
        order_id: i64,
    ) -> Result<Decimal, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE orders
            SET total_amount = COALESCE(
                (SELECT SUM(quantity * unit_price) FROM order_items WHERE order_id = $1),
                0
            )
            WHERE id = $1
            RETURNING total_amount
            "#,
        )
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test]
    async fn test_open_cart_is_reused_not_duplicated(pool: PgPool) -> sqlx::Result<()> {
        let first = Order::open_cart_for_user(&pool, 42).await?;
        let second = Order::open_cart_for_user(&pool, 42).await?;
        assert_eq!(first.id, second.id);

        let pending_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE user_id = 42 AND status = 'pending'",
        )
        .fetch_one(&pool)
        .await?;
        assert_eq!(pending_count, 1);
        Ok(())
    }

    #[sqlx::test]
    async fn test_concurrent_cart_creation_yields_one_cart(pool: PgPool) -> sqlx::Result<()> {
        // Both callers run the select-then-insert at once; the partial unique
        // index arbitrates so exactly one pending order survives.
        let (left, right) = tokio::join!(
            Order::open_cart_for_user(&pool, 42),
            Order::open_cart_for_user(&pool, 42),
        );
        assert_eq!(left?.id, right?.id);

        let pending_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE user_id = 42 AND status = 'pending'",
        )
        .fetch_one(&pool)
        .await?;
        assert_eq!(pending_count, 1);
        Ok(())
    }

    #[sqlx::test]
    async fn test_new_cart_after_previous_cart_closes(pool: PgPool) -> sqlx::Result<()> {
        let first = Order::open_cart_for_user(&pool, 42).await?;
        sqlx::query("UPDATE orders SET status = 'cancelled', cancelled_at = NOW() WHERE id = $1")
            .bind(first.id)
            .execute(&pool)
            .await?;

        let second = Order::open_cart_for_user(&pool, 42).await?;
        assert_ne!(first.id, second.id);
        assert_eq!(second.status, "pending");
        Ok(())
    }
}
