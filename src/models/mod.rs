//! # Data Layer
//!
//! SQLx-backed models for the storefront schema. Multi-row invariants (stock
//! decrement + status change + payment record) are enforced by running the
//! `*_in_tx` variants inside a single transaction at the service layer.

pub mod order;
pub mod order_item;
pub mod order_tracking;
pub mod payment_attempt;
pub mod product;

pub use order::Order;
pub use order_item::OrderItem;
pub use order_tracking::OrderTracking;
pub use payment_attempt::{NewPaymentAttempt, PaymentAttempt, PaymentStoreError};
pub use product::Product;
