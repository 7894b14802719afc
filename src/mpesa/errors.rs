use thiserror::Error;

/// Errors raised while talking to the M-Pesa gateway
#[derive(Debug, Error)]
pub enum MpesaError {
    /// User input rejected before any network call; recoverable by reprompt
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    /// The gateway rejected the configured client credentials
    #[error("Gateway authentication failed: {0}")]
    Auth(String),

    /// Transport failure or timeout reaching the gateway; nothing persisted
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The charge amount cannot be encoded in the gateway's integer format
    #[error("Amount not representable: {0}")]
    InvalidAmount(String),

    /// Gateway configuration is malformed (non-numeric shortcode, bad URL)
    #[error("Gateway configuration error: {0}")]
    Config(String),
}
