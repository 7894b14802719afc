//! # Service Layer
//!
//! Orchestrates the payment flow across the gateway client, the data layer,
//! and the order state machine. Handlers stay thin; transaction boundaries
//! live here.

pub mod checkout;
pub mod reconciliation;

pub use checkout::{CheckoutError, CheckoutService, PaymentInitiation};
pub use reconciliation::{CallbackDisposition, ReconciliationService};
