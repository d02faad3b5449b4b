//! Utility functions shared across the marketplace crates.

pub mod formatting;

pub use formatting::{format_amount, mask_phone};
