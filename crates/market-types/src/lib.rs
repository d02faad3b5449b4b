//! Common types module for the marketplace order lifecycle.
//!
//! This module defines the core data types and structures used throughout
//! the workspace. It provides a centralized location for shared types
//! to ensure consistency across all components.

/// Checkout draft types: selections, delivery details, bills.
pub mod checkout;
/// Event types for inter-component communication.
pub mod events;
/// Order types including statuses and the transition graph.
pub mod order;
/// Product snapshots and catalog entries.
pub mod product;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility functions for formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use checkout::*;
pub use events::*;
pub use order::*;
pub use product::*;
pub use registry::*;
pub use storage::*;
pub use utils::{format_amount, mask_phone};
pub use validation::*;
