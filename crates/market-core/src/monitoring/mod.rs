//! Background monitoring of placed orders.
//!
//! The watcher turns the polled orders collection into a sequence of status
//! change notifications, either as a stream or as events on the bus.

pub mod watcher;

pub use watcher::{OrderWatcher, WatcherHandle};
