use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed status ordering used by the order-detail progress projection.
pub const ORDER_STATE_SEQUENCE: [OrderState; 5] = [
    OrderState::Pending,
    OrderState::Processing,
    OrderState::Shipped,
    OrderState::Completed,
    OrderState::Cancelled,
];

/// Order lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Open cart awaiting checkout and payment
    Pending,
    /// Payment confirmed, order is being packed
    Processing,
    /// Out for delivery
    Shipped,
    /// Delivered to the customer
    Completed,
    /// Cancelled before payment
    Cancelled,
}

impl OrderState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Check if the order is still an open cart (mutable, cancellable)
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Check if payment has been confirmed for this order
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Processing | Self::Shipped | Self::Completed)
    }

    /// Position of this state in the fixed tracking sequence
    pub fn progress_index(&self) -> usize {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Shipped => 2,
            Self::Completed => 3,
            Self::Cancelled => 4,
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid order state: {s}")),
        }
    }
}

/// Payment attempt states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Push request sent, awaiting the gateway callback
    Pending,
    /// Gateway confirmed the payment
    Completed,
    /// Gateway reported failure or cancellation, or the push was rejected
    Failed,
}

impl PaymentState {
    /// Check if this is a terminal state (written at most once)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for PaymentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid payment state: {s}")),
        }
    }
}

/// Default state for new orders
impl Default for OrderState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Default state for new payment attempts
impl Default for PaymentState {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_state_terminal_check() {
        assert!(OrderState::Completed.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
        assert!(!OrderState::Pending.is_terminal());
        assert!(!OrderState::Processing.is_terminal());
        assert!(!OrderState::Shipped.is_terminal());
    }

    #[test]
    fn test_order_state_paid_check() {
        assert!(OrderState::Processing.is_paid());
        assert!(OrderState::Shipped.is_paid());
        assert!(OrderState::Completed.is_paid());
        assert!(!OrderState::Pending.is_paid());
        assert!(!OrderState::Cancelled.is_paid());
    }

    #[test]
    fn test_progress_index_matches_sequence() {
        for (index, state) in ORDER_STATE_SEQUENCE.iter().enumerate() {
            assert_eq!(state.progress_index(), index);
        }
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(OrderState::Processing.to_string(), "processing");
        assert_eq!(
            "shipped".parse::<OrderState>().unwrap(),
            OrderState::Shipped
        );

        assert_eq!(PaymentState::Failed.to_string(), "failed");
        assert_eq!(
            "completed".parse::<PaymentState>().unwrap(),
            PaymentState::Completed
        );
        assert!("paid".parse::<OrderState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let state = OrderState::Processing;
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"processing\"");

        let parsed: OrderState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_payment_state_terminal_check() {
        assert!(PaymentState::Completed.is_terminal());
        assert!(PaymentState::Failed.is_terminal());
        assert!(!PaymentState::Pending.is_terminal());
    }
}
