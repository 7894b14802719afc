use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum StorefrontError {
    DatabaseError(String),
    StateTransitionError(String),
    PaymentError(String),
    ValidationError(String),
    ConfigurationError(String),
    GatewayError(String),
}

impl fmt::Display for StorefrontError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorefrontError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            StorefrontError::StateTransitionError(msg) => {
                write!(f, "State transition error: {msg}")
            }
            StorefrontError::PaymentError(msg) => write!(f, "Payment error: {msg}"),
            StorefrontError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            StorefrontError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            StorefrontError::GatewayError(msg) => write!(f, "Gateway error: {msg}"),
        }
    }
}

impl std::error::Error for StorefrontError {}

pub type Result<T> = std::result::Result<T, StorefrontError>;
