// State machine module for the order and payment lifecycles
//
// Replaces the original string-status conditionals with explicit tagged enums
// and a transition table enforced at the function boundary.

pub mod errors;
pub mod events;
pub mod order_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::OrderEvent;
pub use order_state_machine::OrderStateMachine;
pub use states::{OrderState, PaymentState, ORDER_STATE_SEQUENCE};
