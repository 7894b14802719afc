//! # Payment Reconciliation Service
//!
//! Consumes one asynchronous, at-least-once, unordered gateway callback and
//! applies it exactly once in effect.
//!
//! ## Idempotency
//!
//! The terminal status is written by transitioning the matching pending
//! attempt in place (compare-and-set on `status = 'pending'`), not by
//! appending a new row per delivery. A redelivered callback finds the attempt
//! already terminal and becomes a no-op; the order's paid transition likewise
//! loses its compare-and-set and is ignored. Replaying an identical callback
//! body therefore never changes the final state.
//!
//! ## Never-drop policy
//!
//! A success callback whose order reference cannot be resolved, or whose
//! correlation id matches no recorded push, is still persisted as an audit
//! attempt (with a null order) rather than discarded.
//!
//! ## Atomicity
//!
//! Finalizing a paid order runs as one transaction: decrement stock for each
//! line item, mark the order paid, write the payment record. A stock decrement
//! that would go negative aborts the whole transaction, leaving the attempt
//! pending for a redelivery to retry. A paid transition that loses its
//! compare-and-set (the order was cancelled concurrently) rolls back only the
//! stock and order mutations via a savepoint; the attempt's terminal write and
//! the raw payload still commit, so a confirmed charge is never left
//! unrecorded.

use crate::models::{NewPaymentAttempt, Order, OrderItem, PaymentAttempt, PaymentStoreError, Product};
use crate::mpesa::{CallbackEnvelope, StkCallback};
use crate::state_machine::{
    OrderEvent, OrderStateMachine, PaymentState, StateMachineError,
};
use serde_json::Value;
use sqlx::{Acquire, PgPool};
use tracing::{debug, error, info, warn};

/// How a callback was applied
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackDisposition {
    /// Payment confirmed; order id is None when the reference was unresolvable
    Completed { order_id: Option<i64> },
    /// Gateway reported failure or cancellation; the order stays open
    Failed,
    /// Redelivery of an already-reconciled callback; nothing changed
    Duplicate,
    /// Finalization aborted (stock would go negative); attempt left pending
    Aborted { reason: String },
}

pub struct ReconciliationService {
    pool: PgPool,
}

impl ReconciliationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply one syntactically valid callback envelope.
    ///
    /// The caller acknowledges the gateway regardless of the disposition;
    /// only a database error propagates, and even that is caught at the
    /// handler boundary.
    pub async fn process_callback(
        &self,
        raw: Value,
        envelope: &CallbackEnvelope,
    ) -> Result<CallbackDisposition, sqlx::Error> {
        let callback = envelope.stk_callback();

        // Redelivery check up front: an attempt already terminal for this
        // correlation id means this envelope was reconciled before.
        if let Some(correlation_id) = callback.checkout_request_id.as_deref() {
            if let Some(existing) =
                PaymentAttempt::find_by_correlation_id(&self.pool, correlation_id).await?
            {
                if existing.state().map(|s| s.is_terminal()).unwrap_or(false) {
                    debug!(correlation_id, "Redelivered callback; no-op");
                    return Ok(CallbackDisposition::Duplicate);
                }
            }
        }

        if callback.is_success() {
            self.apply_success(raw, callback).await
        } else {
            self.apply_failure(raw, callback).await
        }
    }

    async fn apply_success(
        &self,
        raw: Value,
        callback: &StkCallback,
    ) -> Result<CallbackDisposition, sqlx::Error> {
        let order = match callback.bill_ref() {
            Some(order_id) => Order::find_by_id(&self.pool, order_id).await?,
            None => None,
        };
        if order.is_none() {
            // Never drop a callback: record it without an order for audit
            warn!(
                bill_ref = ?callback.bill_ref(),
                correlation_id = ?callback.checkout_request_id,
                "Success callback references no resolvable order"
            );
        }

        let items = match &order {
            Some(order) => OrderItem::for_order(&self.pool, order.id).await?,
            None => Vec::new(),
        };

        let mut tx = self.pool.begin().await?;

        // Terminal write on the matching pending attempt
        let mut transitioned = None;
        if let Some(correlation_id) = callback.checkout_request_id.as_deref() {
            transitioned = PaymentAttempt::complete_in_tx(
                &mut tx,
                correlation_id,
                callback.receipt().as_deref(),
                &raw,
            )
            .await?;
        }

        // No pending attempt to transition: insert a completed audit row
        if transitioned.is_none() {
            let new_attempt = NewPaymentAttempt {
                order_id: order.as_ref().map(|o| o.id),
                amount: callback.amount().unwrap_or_default(),
                phone_number: callback.phone_number().unwrap_or_default(),
                mpesa_receipt: callback.receipt(),
                checkout_request_id: callback.checkout_request_id.clone(),
                response: raw.clone(),
                status: PaymentState::Completed,
            };
            match PaymentAttempt::create_in_tx(&mut tx, new_attempt).await {
                Ok(_) => {}
                Err(PaymentStoreError::DuplicateCorrelationId(correlation_id)) => {
                    // Lost a race with a concurrent delivery of the same callback
                    debug!(correlation_id, "Concurrent duplicate delivery; no-op");
                    tx.rollback().await?;
                    return Ok(CallbackDisposition::Duplicate);
                }
                Err(PaymentStoreError::Database(e)) => return Err(e),
            }
        }

        let order_id = order.as_ref().map(|o| o.id);
        if let Some(order) = order {
            let event = OrderEvent::PaymentConfirmed {
                receipt: callback.receipt(),
            };
            match order.state() {
                Ok(current) => {
                    match OrderStateMachine::determine_target_state(current, &event) {
                        Ok(target) => {
                            // Stock decrement and the paid transition commit or
                            // roll back as a unit under a savepoint. Losing the
                            // transition race undoes only the savepoint; the
                            // attempt's terminal write above still commits, so
                            // the confirmed charge stays on record.
                            let mut finalization = tx.begin().await?;
                            let mut shortage = None;
                            for item in &items {
                                let decremented = Product::decrement_stock(
                                    &mut finalization,
                                    item.product_id,
                                    item.quantity,
                                )
                                .await?;
                                if !decremented {
                                    error!(
                                        order_id = order.id,
                                        product_id = item.product_id,
                                        quantity = item.quantity,
                                        "Stock would go negative; aborting paid finalization"
                                    );
                                    shortage = Some(item.product_id);
                                    break;
                                }
                            }
                            if let Some(product_id) = shortage {
                                // Leave the attempt pending so a redelivery can
                                // retry once stock is restored.
                                finalization.rollback().await?;
                                tx.rollback().await?;
                                return Ok(CallbackDisposition::Aborted {
                                    reason: format!("insufficient stock for product {product_id}"),
                                });
                            }

                            match OrderStateMachine::apply(
                                &mut finalization,
                                order.id,
                                current,
                                target,
                                &event,
                            )
                            .await
                            {
                                Ok(()) => {
                                    finalization.commit().await?;
                                    info!(order_id = order.id, "Order marked paid");
                                }
                                Err(StateMachineError::InvalidTransition { .. }) => {
                                    // Another actor transitioned the order first
                                    // (e.g. a cancellation). Undo the stock
                                    // mutation but keep the payment record.
                                    debug!(
                                        order_id = order.id,
                                        "Paid transition lost the race; keeping the payment record"
                                    );
                                    finalization.rollback().await?;
                                }
                                Err(StateMachineError::Database(e)) => return Err(e),
                                Err(StateMachineError::Internal(msg)) => {
                                    error!(order_id = order.id, %msg, "Paid transition failed");
                                    finalization.rollback().await?;
                                }
                            }
                        }
                        Err(_) => {
                            // Already paid or cancelled; record stands, order untouched
                            debug!(
                                order_id = order.id,
                                status = %order.status,
                                "Order not awaiting payment; leaving status unchanged"
                            );
                        }
                    }
                }
                Err(status) => {
                    error!(order_id = order.id, %status, "Unparseable order status");
                }
            }
        }

        tx.commit().await?;
        Ok(CallbackDisposition::Completed { order_id })
    }

    async fn apply_failure(
        &self,
        raw: Value,
        callback: &StkCallback,
    ) -> Result<CallbackDisposition, sqlx::Error> {
        warn!(
            result_code = callback.result_code,
            result_desc = ?callback.result_desc,
            correlation_id = ?callback.checkout_request_id,
            "Payment failed or cancelled"
        );

        let mut tx = self.pool.begin().await?;

        let mut transitioned = None;
        if let Some(correlation_id) = callback.checkout_request_id.as_deref() {
            transitioned = PaymentAttempt::fail_in_tx(&mut tx, correlation_id, &raw).await?;
        }

        if transitioned.is_none() {
            // Unknown correlation id: still record the failure with whatever
            // partial metadata the gateway sent (often just a phone number)
            let phone_number = callback
                .phone_number()
                .or_else(|| callback.first_item_value())
                .unwrap_or_default();
            let new_attempt = NewPaymentAttempt {
                order_id: None,
                amount: callback.amount().unwrap_or_default(),
                phone_number,
                mpesa_receipt: None,
                checkout_request_id: callback.checkout_request_id.clone(),
                response: raw.clone(),
                status: PaymentState::Failed,
            };
            match PaymentAttempt::create_in_tx(&mut tx, new_attempt).await {
                Ok(_) => {}
                Err(PaymentStoreError::DuplicateCorrelationId(correlation_id)) => {
                    debug!(correlation_id, "Concurrent duplicate delivery; no-op");
                    tx.rollback().await?;
                    return Ok(CallbackDisposition::Duplicate);
                }
                Err(PaymentStoreError::Database(e)) => return Err(e),
            }
        }

        // No order mutation on failure: the order stays open for a retry
        tx.commit().await?;
        Ok(CallbackDisposition::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seed_product(pool: &PgPool, quantity: i32) -> sqlx::Result<i64> {
        sqlx::query_scalar(
            "INSERT INTO products (name, price, quantity) \
             VALUES ('Widget', 100.00, $1) RETURNING id",
        )
        .bind(quantity)
        .fetch_one(pool)
        .await
    }

    async fn seed_order(pool: &PgPool, status: &str) -> sqlx::Result<i64> {
        sqlx::query_scalar(
            "INSERT INTO orders (user_id, status, pending_at) \
             VALUES (7, $1, NOW()) RETURNING id",
        )
        .bind(status)
        .fetch_one(pool)
        .await
    }

    async fn seed_item(
        pool: &PgPool,
        order_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price) \
             VALUES ($1, $2, $3, 100.00)",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn seed_pending_attempt(
        pool: &PgPool,
        order_id: i64,
        correlation_id: &str,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO payment_attempts \
             (order_id, amount, phone_number, checkout_request_id, response, status) \
             VALUES ($1, 200.00, '254712345678', $2, '{}'::jsonb, 'pending')",
        )
        .bind(order_id)
        .bind(correlation_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    fn success_envelope(bill_ref: i64, correlation_id: &str) -> Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": correlation_id,
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 200.0},
                            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                            {"Name": "BillRefNumber", "Value": bill_ref},
                            {"Name": "PhoneNumber", "Value": 254712345678_u64}
                        ]
                    }
                }
            }
        })
    }

    async fn order_status(pool: &PgPool, order_id: i64) -> sqlx::Result<String> {
        sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_one(pool)
            .await
    }

    async fn stock_level(pool: &PgPool, product_id: i64) -> sqlx::Result<i32> {
        sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_one(pool)
            .await
    }

    #[sqlx::test]
    async fn test_redelivered_success_callback_is_a_noop(pool: PgPool) -> sqlx::Result<()> {
        let product_id = seed_product(&pool, 5).await?;
        let order_id = seed_order(&pool, "pending").await?;
        seed_item(&pool, order_id, product_id, 2).await?;
        seed_pending_attempt(&pool, order_id, "ws_CO_1202").await?;

        let raw = success_envelope(order_id, "ws_CO_1202");
        let envelope: CallbackEnvelope = serde_json::from_value(raw.clone()).unwrap();
        let service = ReconciliationService::new(pool.clone());

        let first = service.process_callback(raw.clone(), &envelope).await?;
        assert_eq!(
            first,
            CallbackDisposition::Completed {
                order_id: Some(order_id)
            }
        );
        assert_eq!(order_status(&pool, order_id).await?, "processing");
        assert_eq!(stock_level(&pool, product_id).await?, 3);

        let second = service.process_callback(raw, &envelope).await?;
        assert_eq!(second, CallbackDisposition::Duplicate);

        // Nothing moved twice
        assert_eq!(order_status(&pool, order_id).await?, "processing");
        assert_eq!(stock_level(&pool, product_id).await?, 3);
        let attempt = PaymentAttempt::find_by_correlation_id(&pool, "ws_CO_1202")
            .await?
            .unwrap();
        assert_eq!(attempt.status, "completed");
        assert_eq!(attempt.mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));
        Ok(())
    }

    #[sqlx::test]
    async fn test_unresolvable_order_reference_is_still_recorded(pool: PgPool) -> sqlx::Result<()> {
        let raw = success_envelope(999_999, "ws_CO_9000");
        let envelope: CallbackEnvelope = serde_json::from_value(raw.clone()).unwrap();
        let service = ReconciliationService::new(pool.clone());

        let disposition = service.process_callback(raw, &envelope).await?;
        assert_eq!(disposition, CallbackDisposition::Completed { order_id: None });

        // Recorded with a null order for audit, never dropped
        let attempt = PaymentAttempt::find_by_correlation_id(&pool, "ws_CO_9000")
            .await?
            .unwrap();
        assert_eq!(attempt.order_id, None);
        assert_eq!(attempt.status, "completed");
        assert_eq!(attempt.mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));
        Ok(())
    }

    #[sqlx::test]
    async fn test_success_for_cancelled_order_keeps_payment_record(pool: PgPool) -> sqlx::Result<()> {
        let product_id = seed_product(&pool, 5).await?;
        let order_id = seed_order(&pool, "cancelled").await?;
        seed_item(&pool, order_id, product_id, 2).await?;
        seed_pending_attempt(&pool, order_id, "ws_CO_5150").await?;

        let raw = success_envelope(order_id, "ws_CO_5150");
        let envelope: CallbackEnvelope = serde_json::from_value(raw.clone()).unwrap();
        let service = ReconciliationService::new(pool.clone());

        let disposition = service.process_callback(raw, &envelope).await?;
        assert_eq!(
            disposition,
            CallbackDisposition::Completed {
                order_id: Some(order_id)
            }
        );

        // The confirmed charge is on record even though the order could not
        // take the paid transition; stock and status are untouched.
        let attempt = PaymentAttempt::find_by_correlation_id(&pool, "ws_CO_5150")
            .await?
            .unwrap();
        assert_eq!(attempt.status, "completed");
        assert_eq!(order_status(&pool, order_id).await?, "cancelled");
        assert_eq!(stock_level(&pool, product_id).await?, 5);
        Ok(())
    }

    #[sqlx::test]
    async fn test_insufficient_stock_aborts_finalization(pool: PgPool) -> sqlx::Result<()> {
        let product_id = seed_product(&pool, 1).await?;
        let order_id = seed_order(&pool, "pending").await?;
        seed_item(&pool, order_id, product_id, 2).await?;
        seed_pending_attempt(&pool, order_id, "ws_CO_7777").await?;

        let raw = success_envelope(order_id, "ws_CO_7777");
        let envelope: CallbackEnvelope = serde_json::from_value(raw.clone()).unwrap();
        let service = ReconciliationService::new(pool.clone());

        let disposition = service.process_callback(raw, &envelope).await?;
        assert!(matches!(disposition, CallbackDisposition::Aborted { .. }));

        // Everything rolled back; the attempt stays pending for a retry
        let attempt = PaymentAttempt::find_by_correlation_id(&pool, "ws_CO_7777")
            .await?
            .unwrap();
        assert_eq!(attempt.status, "pending");
        assert_eq!(order_status(&pool, order_id).await?, "pending");
        assert_eq!(stock_level(&pool, product_id).await?, 1);
        Ok(())
    }

    #[sqlx::test]
    async fn test_failure_callback_leaves_order_open(pool: PgPool) -> sqlx::Result<()> {
        let product_id = seed_product(&pool, 5).await?;
        let order_id = seed_order(&pool, "pending").await?;
        seed_item(&pool, order_id, product_id, 2).await?;
        seed_pending_attempt(&pool, order_id, "ws_CO_1032").await?;

        let raw = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_1032",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });
        let envelope: CallbackEnvelope = serde_json::from_value(raw.clone()).unwrap();
        let service = ReconciliationService::new(pool.clone());

        let disposition = service.process_callback(raw, &envelope).await?;
        assert_eq!(disposition, CallbackDisposition::Failed);

        let attempt = PaymentAttempt::find_by_correlation_id(&pool, "ws_CO_1032")
            .await?
            .unwrap();
        assert_eq!(attempt.status, "failed");
        assert_eq!(order_status(&pool, order_id).await?, "pending");
        assert_eq!(stock_level(&pool, product_id).await?, 5);
        Ok(())
    }
}
