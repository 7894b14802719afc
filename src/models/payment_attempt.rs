//! # Payment Attempt Model
//!
//! Append-mostly log of M-Pesa STK push attempts keyed by the gateway-issued
//! `CheckoutRequestID` correlation id.
//!
//! ## Overview
//!
//! A row is created in `pending` the moment a push request gets a gateway
//! response (or directly in `failed` when the gateway rejects the push).
//! The only update ever applied afterwards is the single terminal-status
//! write performed by reconciliation: a compare-and-set on `status =
//! 'pending'`, so a redelivered callback matches zero rows and changes
//! nothing. The raw gateway payload is always stored for audit.
//!
//! ## Database Schema
//!
//! Maps to the `payment_attempts` table:
//! ```sql
//! CREATE TABLE payment_attempts (
//!   id BIGSERIAL PRIMARY KEY,
//!   order_id BIGINT REFERENCES orders(id),
//!   amount NUMERIC(12,2) NOT NULL,
//!   phone_number VARCHAR NOT NULL,
//!   mpesa_receipt VARCHAR,
//!   checkout_request_id VARCHAR UNIQUE,
//!   response JSONB NOT NULL,
//!   status VARCHAR NOT NULL DEFAULT 'pending',
//!   created_at TIMESTAMP NOT NULL DEFAULT NOW(),
//!   updated_at TIMESTAMP NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! `order_id` is nullable: a callback referencing an order that cannot be
//! resolved is still recorded, never dropped.

use crate::state_machine::PaymentState;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentStoreError {
    /// A non-null correlation id collided with an existing row. Indicates a
    /// replayed or redelivered push response, never surfaced to a user.
    #[error("Duplicate correlation id: {0}")]
    DuplicateCorrelationId(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PaymentAttempt {
    pub id: i64,
    pub order_id: Option<i64>,
    pub amount: Decimal,
    pub phone_number: String,
    pub mpesa_receipt: Option<String>,
    pub checkout_request_id: Option<String>,
    pub response: serde_json::Value,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// New PaymentAttempt for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentAttempt {
    pub order_id: Option<i64>,
    pub amount: Decimal,
    pub phone_number: String,
    pub mpesa_receipt: Option<String>,
    pub checkout_request_id: Option<String>,
    pub response: serde_json::Value,
    pub status: PaymentState,
}

const ATTEMPT_COLUMNS: &str = "id, order_id, amount, phone_number, mpesa_receipt, \
                               checkout_request_id, response, status, created_at, updated_at";

impl PaymentAttempt {
    /// Parse the status column into the typed state
    pub fn state(&self) -> Result<PaymentState, String> {
        self.status.parse()
    }

    pub async fn create(
        pool: &PgPool,
        new_attempt: NewPaymentAttempt,
    ) -> Result<Self, PaymentStoreError> {
        let mut conn = pool.acquire().await?;
        Self::create_in_tx(&mut conn, new_attempt).await
    }

    /// Insert an attempt inside an existing transaction.
    ///
    /// A unique violation on `checkout_request_id` maps to
    /// [`PaymentStoreError::DuplicateCorrelationId`].
    pub async fn create_in_tx(
        conn: &mut PgConnection,
        new_attempt: NewPaymentAttempt,
    ) -> Result<Self, PaymentStoreError> {
        let insert = format!(
            "INSERT INTO payment_attempts \
             (order_id, amount, phone_number, mpesa_receipt, checkout_request_id, response, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {ATTEMPT_COLUMNS}"
        );

        let result = sqlx::query_as::<_, Self>(&insert)
            .bind(new_attempt.order_id)
            .bind(new_attempt.amount)
            .bind(&new_attempt.phone_number)
            .bind(&new_attempt.mpesa_receipt)
            .bind(&new_attempt.checkout_request_id)
            .bind(&new_attempt.response)
            .bind(new_attempt.status.to_string())
            .fetch_one(&mut *conn)
            .await;

        match result {
            Ok(attempt) => Ok(attempt),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(PaymentStoreError::DuplicateCorrelationId(
                    new_attempt.checkout_request_id.unwrap_or_default(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_correlation_id(
        pool: &PgPool,
        correlation_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query =
            format!("SELECT {ATTEMPT_COLUMNS} FROM payment_attempts WHERE checkout_request_id = $1");
        sqlx::query_as::<_, Self>(&query)
            .bind(correlation_id)
            .fetch_optional(pool)
            .await
    }

    /// Attempts still awaiting a callback for this order, newest first
    pub async fn find_pending_for_order(
        pool: &PgPool,
        order_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM payment_attempts \
             WHERE order_id = $1 AND status = 'pending' ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Self>(&query)
            .bind(order_id)
            .fetch_all(pool)
            .await
    }

    /// Full attempt history for an order, newest first (one row per retry)
    pub async fn find_for_order(pool: &PgPool, order_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM payment_attempts \
             WHERE order_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Self>(&query)
            .bind(order_id)
            .fetch_all(pool)
            .await
    }

    /// Terminal-status write: move the matching pending attempt to `completed`.
    ///
    /// Returns `None` when no pending attempt holds this correlation id,
    /// which is how a redelivered callback becomes a no-op.
    pub async fn complete_in_tx(
        conn: &mut PgConnection,
        correlation_id: &str,
        receipt: Option<&str>,
        callback_payload: &serde_json::Value,
    ) -> Result<Option<Self>, sqlx::Error> {
        let update = format!(
            "UPDATE payment_attempts \
             SET status = 'completed', \
                 mpesa_receipt = COALESCE($2, mpesa_receipt), \
                 response = $3, \
                 updated_at = NOW() \
             WHERE checkout_request_id = $1 AND status = 'pending' \
             RETURNING {ATTEMPT_COLUMNS}"
        );
        sqlx::query_as::<_, Self>(&update)
            .bind(correlation_id)
            .bind(receipt)
            .bind(callback_payload)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Terminal-status write: move the matching pending attempt to `failed`
    pub async fn fail_in_tx(
        conn: &mut PgConnection,
        correlation_id: &str,
        callback_payload: &serde_json::Value,
    ) -> Result<Option<Self>, sqlx::Error> {
        let update = format!(
            "UPDATE payment_attempts \
             SET status = 'failed', response = $2, updated_at = NOW() \
             WHERE checkout_request_id = $1 AND status = 'pending' \
             RETURNING {ATTEMPT_COLUMNS}"
        );
        sqlx::query_as::<_, Self>(&update)
            .bind(correlation_id)
            .bind(callback_payload)
            .fetch_optional(&mut *conn)
            .await
    }
}
