//! # Order Tracking Model
//!
//! Append-only status history for orders, written by the state machine in the
//! same transaction as the status update. Serves the tracking timeline on the
//! order detail projection.
//!
//! ## Database Schema
//!
//! Maps to the `order_tracking` table:
//! ```sql
//! CREATE TABLE order_tracking (
//!   id BIGSERIAL PRIMARY KEY,
//!   order_id BIGINT NOT NULL REFERENCES orders(id),
//!   status VARCHAR NOT NULL,
//!   note TEXT,
//!   created_at TIMESTAMP NOT NULL DEFAULT NOW()
//! );
//! ```

use crate::state_machine::OrderState;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderTracking {
    pub id: i64,
    pub order_id: i64,
    pub status: String,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}

impl OrderTracking {
    /// Append a tracking row inside an existing transaction
    pub async fn record(
        conn: &mut PgConnection,
        order_id: i64,
        status: OrderState,
        note: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO order_tracking (order_id, status, note)
            VALUES ($1, $2, $3)
            RETURNING id, order_id, status, note, created_at
            "#,
        )
        .bind(order_id)
        .bind(status.to_string())
        .bind(note)
        .fetch_one(&mut *conn)
        .await
    }

    /// Chronological tracking history for an order
    pub async fn history(pool: &PgPool, order_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, order_id, status, note, created_at
            FROM order_tracking
            WHERE order_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
    }
}
