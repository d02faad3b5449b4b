//! State management for placed orders.
//!
//! This module provides the state machine that applies status transitions to
//! stored orders, ensuring only legal changes are ever persisted.

pub mod order;

pub use order::{OrderStateError, OrderStateMachine};
