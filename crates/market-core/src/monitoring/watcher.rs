//! Order status watcher.
//!
//! Polls the orders collection and reports status changes since the previous
//! poll. The first time an order is seen its status is only recorded; a
//! notification is produced for every later poll that finds a different
//! status.

use crate::engine::event_bus::EventBus;
use chrono::Utc;
use futures::Stream;
use market_storage::StorageService;
use market_types::{MarketEvent, Order, OrderEvent, OrderId, OrderStatus, StatusChange, StorageKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Tracks the last observed status of every order.
pub struct OrderWatcher {
	storage: Arc<StorageService>,
	observed: HashMap<OrderId, OrderStatus>,
}

impl OrderWatcher {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			observed: HashMap::new(),
		}
	}

	/// Last status recorded for `order_id`, if the order has been seen.
	pub fn observed(&self, order_id: OrderId) -> Option<OrderStatus> {
		self.observed.get(&order_id).copied()
	}

	/// Runs one polling tick and returns the changes it detected.
	///
	/// A failed read counts as an empty list, so a transient backend problem
	/// neither produces notifications nor forgets earlier observations.
	pub async fn poll(&mut self) -> Vec<StatusChange> {
		let orders: Vec<Order> = match self.storage.get(StorageKey::Orders).await {
			Ok(orders) => orders.unwrap_or_default(),
			Err(e) => {
				tracing::warn!(error = %e, "Failed to read orders, skipping this poll");
				Vec::new()
			},
		};

		let observed_at = Utc::now();
		let mut changes = Vec::new();
		for order in &orders {
			match self.observed.insert(order.id(), order.status()) {
				Some(previous) if previous != order.status() => changes.push(StatusChange {
					order_id: order.id(),
					previous_status: previous,
					new_status: order.status(),
					observed_at,
				}),
				Some(_) => {},
				None => {
					tracing::trace!(order_id = %order.id(), status = %order.status(), "Order first observed");
				},
			}
		}
		changes
	}

	/// Polls every `period` and yields each detected change.
	///
	/// Polling stops when the stream is dropped.
	pub fn into_stream(mut self, period: Duration) -> impl Stream<Item = StatusChange> + Send {
		async_stream::stream! {
			let mut ticker = tokio::time::interval(period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			loop {
				ticker.tick().await;
				for change in self.poll().await {
					yield change;
				}
			}
		}
	}

	/// Polls in a background task and publishes every change on `event_bus`.
	pub fn spawn(mut self, event_bus: EventBus, period: Duration) -> WatcherHandle {
		let (stop_tx, mut stop_rx) = mpsc::channel(1);

		let join = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			tracing::info!(interval_secs = period.as_secs(), "Order watcher started");

			loop {
				tokio::select! {
					_ = stop_rx.recv() => break,
					_ = ticker.tick() => {
						for change in self.poll().await {
							tracing::info!(
								order_id = %change.order_id,
								from = %change.previous_status,
								to = %change.new_status,
								"Order status changed"
							);
							event_bus
								.publish(MarketEvent::Order(OrderEvent::StatusChanged(change)))
								.ok();
						}
					}
				}
			}

			tracing::info!("Order watcher stopped");
		});

		WatcherHandle { stop_tx, join }
	}
}

/// Handle to a watcher running in the background.
pub struct WatcherHandle {
	stop_tx: mpsc::Sender<()>,
	join: JoinHandle<()>,
}

impl WatcherHandle {
	/// Signals the watcher to stop and waits until its task has finished.
	pub async fn stop(self) {
		self.stop_tx.send(()).await.ok();
		if let Err(e) = self.join.await {
			tracing::warn!(error = %e, "Order watcher task ended abnormally");
		}
	}

	/// Whether the background task has exited.
	pub fn is_finished(&self) -> bool {
		self.join.is_finished()
	}
}
