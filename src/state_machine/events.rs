use serde::{Deserialize, Serialize};

/// Events that can trigger order state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Gateway confirmed payment for this order
    PaymentConfirmed {
        /// Gateway receipt number, when the callback carried one
        receipt: Option<String>,
    },
    /// Order handed to the courier
    Ship,
    /// Order delivered to the customer
    Deliver,
    /// Customer cancelled the open order
    Cancel,
}

impl OrderEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::Ship => "ship",
            Self::Deliver => "deliver",
            Self::Cancel => "cancel",
        }
    }

    /// Extract the gateway receipt if this is a payment confirmation
    pub fn receipt(&self) -> Option<&str> {
        match self {
            Self::PaymentConfirmed { receipt } => receipt.as_deref(),
            _ => None,
        }
    }

    /// Check if this event ends the order's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deliver | Self::Cancel)
    }
}

impl OrderEvent {
    /// Create a payment confirmation event with a receipt number
    pub fn payment_confirmed(receipt: impl Into<String>) -> Self {
        Self::PaymentConfirmed {
            receipt: Some(receipt.into()),
        }
    }
}
