use super::{
    errors::{StateMachineError, StateMachineResult},
    events::OrderEvent,
    states::OrderState,
};
use crate::models::order_tracking::OrderTracking;
use sqlx::{PgConnection, PgPool};

/// Explicit order lifecycle state machine.
///
/// Replaces scattered `if status == "pending"` checks with a single transition
/// table; illegal transitions are rejected before any row is touched. Current
/// state always comes from the database, never from a cached struct, so two
/// racing actors (customer cancel vs. gateway callback) resolve through the
/// compare-and-set on the status column.
pub struct OrderStateMachine {
    order_id: i64,
    pool: PgPool,
}

impl OrderStateMachine {
    pub fn new(order_id: i64, pool: PgPool) -> Self {
        Self { order_id, pool }
    }

    /// Get the current state of the order
    pub async fn current_state(&self) -> StateMachineResult<OrderState> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(self.order_id)
                .fetch_optional(&self.pool)
                .await?;

        match status {
            Some(status) => status.parse().map_err(|_| {
                StateMachineError::Internal(format!("Invalid state in database: {status}"))
            }),
            None => Err(StateMachineError::Internal(format!(
                "Order {} not found",
                self.order_id
            ))),
        }
    }

    /// Attempt to transition the order state
    pub async fn transition(&self, event: OrderEvent) -> StateMachineResult<OrderState> {
        let current_state = self.current_state().await?;
        let target_state = Self::determine_target_state(current_state, &event)?;

        let mut tx = self.pool.begin().await?;
        Self::apply(&mut tx, self.order_id, current_state, target_state, &event).await?;
        tx.commit().await?;

        Ok(target_state)
    }

    /// Determine the target state based on current state and event.
    ///
    /// This is the whole transition table. Cancellation is only legal while
    /// the order is still an open pending cart.
    pub fn determine_target_state(
        current_state: OrderState,
        event: &OrderEvent,
    ) -> StateMachineResult<OrderState> {
        let target = match (current_state, event) {
            (OrderState::Pending, OrderEvent::PaymentConfirmed { .. }) => OrderState::Processing,
            (OrderState::Processing, OrderEvent::Ship) => OrderState::Shipped,
            (OrderState::Shipped, OrderEvent::Deliver) => OrderState::Completed,
            (OrderState::Pending, OrderEvent::Cancel) => OrderState::Cancelled,

            (from_state, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Apply a validated transition inside an existing transaction.
    ///
    /// The status update is a compare-and-set on the previous state; zero rows
    /// affected means another actor transitioned the order first and this
    /// transition is rejected. The matching status timestamp column is stamped
    /// and a tracking row appended in the same transaction.
    pub(crate) async fn apply(
        conn: &mut PgConnection,
        order_id: i64,
        from_state: OrderState,
        to_state: OrderState,
        event: &OrderEvent,
    ) -> StateMachineResult<()> {
        let timestamp_column = status_timestamp_column(to_state);
        let update = format!(
            "UPDATE orders SET status = $1, {timestamp_column} = NOW() \
             WHERE id = $2 AND status = $3"
        );

        let result = sqlx::query(&update)
            .bind(to_state.to_string())
            .bind(order_id)
            .bind(from_state.to_string())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StateMachineError::InvalidTransition {
                from: from_state.to_string(),
                event: event.event_type().to_string(),
            });
        }

        let note = transition_note(event);
        OrderTracking::record(conn, order_id, to_state, note).await?;

        Ok(())
    }

    /// Check if the order is in a terminal state
    pub async fn is_terminal(&self) -> StateMachineResult<bool> {
        let current_state = self.current_state().await?;
        Ok(current_state.is_terminal())
    }

    pub fn order_id(&self) -> i64 {
        self.order_id
    }
}

/// Each order status has its own nullable timestamp column on the row.
fn status_timestamp_column(state: OrderState) -> &'static str {
    match state {
        OrderState::Pending => "pending_at",
        OrderState::Processing => "processing_at",
        OrderState::Shipped => "shipped_at",
        OrderState::Completed => "completed_at",
        OrderState::Cancelled => "cancelled_at",
    }
}

fn transition_note(event: &OrderEvent) -> Option<String> {
    match event {
        OrderEvent::PaymentConfirmed {
            receipt: Some(receipt),
        } => Some(format!("Payment confirmed, receipt {receipt}")),
        OrderEvent::PaymentConfirmed { receipt: None } => {
            Some("Payment confirmed".to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert_eq!(
            OrderStateMachine::determine_target_state(
                OrderState::Pending,
                &OrderEvent::payment_confirmed("QGR7TEST01"),
            )
            .unwrap(),
            OrderState::Processing
        );

        assert_eq!(
            OrderStateMachine::determine_target_state(OrderState::Processing, &OrderEvent::Ship)
                .unwrap(),
            OrderState::Shipped
        );

        assert_eq!(
            OrderStateMachine::determine_target_state(OrderState::Shipped, &OrderEvent::Deliver)
                .unwrap(),
            OrderState::Completed
        );

        assert_eq!(
            OrderStateMachine::determine_target_state(OrderState::Pending, &OrderEvent::Cancel)
                .unwrap(),
            OrderState::Cancelled
        );
    }

    #[test]
    fn test_cancel_rejected_after_payment() {
        // Cancel is only legal from pending
        assert!(OrderStateMachine::determine_target_state(
            OrderState::Processing,
            &OrderEvent::Cancel
        )
        .is_err());
        assert!(OrderStateMachine::determine_target_state(
            OrderState::Shipped,
            &OrderEvent::Cancel
        )
        .is_err());
        assert!(OrderStateMachine::determine_target_state(
            OrderState::Completed,
            &OrderEvent::Cancel
        )
        .is_err());
    }

    #[test]
    fn test_invalid_transitions() {
        // Cannot pay a cancelled order
        assert!(OrderStateMachine::determine_target_state(
            OrderState::Cancelled,
            &OrderEvent::PaymentConfirmed { receipt: None }
        )
        .is_err());

        // Cannot skip straight from pending to shipped
        assert!(
            OrderStateMachine::determine_target_state(OrderState::Pending, &OrderEvent::Ship)
                .is_err()
        );

        // Paying twice is not a legal edge; the caller treats it as a no-op
        assert!(OrderStateMachine::determine_target_state(
            OrderState::Processing,
            &OrderEvent::PaymentConfirmed { receipt: None }
        )
        .is_err());
    }

    #[test]
    fn test_timestamp_columns() {
        assert_eq!(
            status_timestamp_column(OrderState::Processing),
            "processing_at"
        );
        assert_eq!(
            status_timestamp_column(OrderState::Cancelled),
            "cancelled_at"
        );
    }
}
