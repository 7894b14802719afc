// M-Pesa gateway integration: push-payment client, phone normalization,
// and the asynchronous callback envelope.

pub mod callback;
pub mod client;
pub mod errors;
pub mod phone;

pub use callback::{CallbackEnvelope, StkCallback};
pub use client::{MpesaClient, StkPush};
pub use errors::MpesaError;
