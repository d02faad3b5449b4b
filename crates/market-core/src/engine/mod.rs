//! Marketplace engine.
//!
//! Holds the wired components (Record Store, catalog, identity, state machine,
//! query surface and event bus) and runs the background loop that keeps the
//! order watcher and storage cleanup alive.

pub mod event_bus;
pub mod lifecycle;

use crate::catalog::CatalogInterface;
use crate::checkout::{CheckoutSettings, CheckoutWizard};
use crate::identity::IdentityProvider;
use crate::monitoring::OrderWatcher;
use crate::query::OrderQuery;
use crate::state::OrderStateMachine;
use market_config::Config;
use market_storage::StorageService;
use market_types::{format_amount, CheckoutEvent, MarketEvent, OrderEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Catalog error: {0}")]
	Catalog(String),
}

/// The assembled marketplace.
#[derive(Clone)]
pub struct MarketEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) catalog: Arc<dyn CatalogInterface>,
	pub(crate) identity: Arc<dyn IdentityProvider>,
	pub(crate) event_bus: event_bus::EventBus,
	pub(crate) state_machine: Arc<OrderStateMachine>,
	pub(crate) query: Arc<OrderQuery>,
}

impl MarketEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		catalog: Arc<dyn CatalogInterface>,
		identity: Arc<dyn IdentityProvider>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let state_machine = Arc::new(OrderStateMachine::new(
			storage.clone(),
			event_bus.clone(),
		));
		let query = Arc::new(OrderQuery::new(storage.clone()));

		Self {
			config,
			storage,
			catalog,
			identity,
			event_bus,
			state_machine,
			query,
		}
	}

	/// Starts a checkout for the current user.
	///
	/// The wizard begins at product selection; call
	/// [`CheckoutWizard::resume`] to continue from persisted drafts.
	pub fn checkout(&self) -> CheckoutWizard {
		CheckoutWizard::new(
			self.storage.clone(),
			self.catalog.clone(),
			self.identity.clone(),
			self.event_bus.clone(),
			CheckoutSettings::from(&self.config.checkout),
		)
	}

	/// A fresh watcher with no observations.
	pub fn watcher(&self) -> OrderWatcher {
		OrderWatcher::new(self.storage.clone())
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.config.watcher.poll_interval_seconds)
	}

	/// Runs until Ctrl-C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for shutdown signal");
			}
		})
		.await
	}

	/// Runs the watcher and storage cleanup, logging every event, until
	/// `shutdown` completes. The watcher is stopped before returning.
	pub async fn run_until<S>(&self, shutdown: S) -> Result<(), EngineError>
	where
		S: Future<Output = ()>,
	{
		let mut event_receiver = self.event_bus.subscribe();
		let watcher = self
			.watcher()
			.spawn(self.event_bus.clone(), self.poll_interval());

		// Start storage cleanup task
		let storage = self.storage.clone();
		let cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));
		let cleanup_handle = tokio::spawn(async move {
			let mut interval = cleanup_interval;
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		});

		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				event = event_receiver.recv() => match event {
					Ok(event) => self.log_event(&event),
					Err(RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Event log fell behind");
					},
					Err(RecvError::Closed) => break,
				},
				_ = &mut shutdown => {
					tracing::info!("Shutdown requested");
					break;
				}
			}
		}

		cleanup_handle.abort();
		watcher.stop().await;

		Ok(())
	}

	fn log_event(&self, event: &MarketEvent) {
		match event {
			MarketEvent::Order(OrderEvent::Placed {
				order_id,
				total_amount,
			}) => {
				tracing::info!(
					order_id = %order_id,
					total = %format_amount(*total_amount, &self.config.market.currency),
					"Order placed"
				);
			},
			MarketEvent::Order(OrderEvent::StatusChanged(change)) => {
				tracing::info!(order_id = %change.order_id, "{}", change);
			},
			MarketEvent::Order(OrderEvent::StatusUpdated { order_id, from, to }) => {
				tracing::debug!(order_id = %order_id, from = %from, to = %to, "Status updated");
			},
			MarketEvent::Checkout(CheckoutEvent::StepChanged { from, to }) => {
				tracing::debug!(from = %from, to = %to, "Checkout step changed");
			},
			MarketEvent::Checkout(CheckoutEvent::Redirected {
				requested,
				redirect_to,
			}) => {
				tracing::debug!(requested = %requested, redirect_to = %redirect_to, "Checkout redirected");
			},
		}
	}

	pub fn state_machine(&self) -> &Arc<OrderStateMachine> {
		&self.state_machine
	}

	pub fn query(&self) -> &Arc<OrderQuery> {
		&self.query
	}

	pub fn catalog(&self) -> &Arc<dyn CatalogInterface> {
		&self.catalog
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::builder::{MarketBuilder, MarketFactories};
	use crate::checkout::CheckoutError;
	use crate::query::OrderFilter;
	use crate::state::OrderStateError;
	use crate::test_support::{catalog_product, valid_delivery_form};
	use market_config::builders::config::ConfigBuilder;
	use market_storage::StorageFactory;
	use market_types::{CheckoutStep, DeliveryForm, OrderStatus, StatusChange};
	use rust_decimal::Decimal;
	use std::collections::HashMap;

	fn engine() -> MarketEngine {
		let config = ConfigBuilder::new()
			.poll_interval_seconds(5)
			.product(catalog_product(50))
			.build();
		let factories = MarketFactories {
			storage_factories: market_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect::<HashMap<String, StorageFactory>>(),
		};
		MarketBuilder::new(config).build(factories).unwrap()
	}

	#[tokio::test(start_paused = true)]
	async fn test_buy_and_track_groundnut_oil() {
		let engine = engine();
		let mut watcher = engine.watcher();
		assert!(watcher.poll().await.is_empty());

		let mut checkout = engine.checkout();
		let selection = checkout.select_product(3, 70).await.unwrap();
		assert_eq!(selection.quantity.get(), 50);

		let rejected = DeliveryForm {
			full_name: Some("Jo".into()),
			phone_number: Some("12345".into()),
			..valid_delivery_form()
		};
		match checkout.submit_delivery(rejected).await.unwrap_err() {
			CheckoutError::Validation(errors) => {
				assert!(errors.contains("fullName"));
				assert!(errors.contains("phoneNumber"));
			},
			other => panic!("unexpected error: {:?}", other),
		}
		assert_eq!(checkout.current_step(), CheckoutStep::EnteringDelivery);

		checkout.submit_delivery(valid_delivery_form()).await.unwrap();
		let bill = checkout.review_bill().await.unwrap();
		assert_eq!(bill.total_amount, Decimal::from(10040));

		let order = checkout.confirm("cash_on_delivery").await.unwrap();
		assert_eq!(order.status(), OrderStatus::Pending);
		assert_eq!(order.total_amount(), Decimal::from(10040));
		assert_eq!(order.product().price, Decimal::from(200));
		let id = order.id();

		// First sight of the new order is silent
		assert!(watcher.poll().await.is_empty());

		let machine = engine.state_machine();
		assert!(matches!(
			machine
				.transition_order_status(id, OrderStatus::Shipped)
				.await
				.unwrap_err(),
			OrderStateError::InvalidTransition { .. }
		));
		assert_eq!(
			engine.query().get_order(id).await.unwrap().status(),
			OrderStatus::Pending
		);

		let mut notifications: Vec<StatusChange> = Vec::new();
		for status in [
			OrderStatus::Processing,
			OrderStatus::Shipped,
			OrderStatus::Delivered,
		] {
			machine.transition_order_status(id, status).await.unwrap();
			notifications.extend(watcher.poll().await);
		}
		assert!(watcher.poll().await.is_empty());

		let seen: Vec<(OrderStatus, OrderStatus)> = notifications
			.iter()
			.map(|c| (c.previous_status, c.new_status))
			.collect();
		assert_eq!(
			seen,
			vec![
				(OrderStatus::Pending, OrderStatus::Processing),
				(OrderStatus::Processing, OrderStatus::Shipped),
				(OrderStatus::Shipped, OrderStatus::Delivered),
			]
		);

		let delivered = engine
			.query()
			.list_orders(OrderFilter::Delivered)
			.await
			.unwrap();
		assert_eq!(delivered.len(), 1);
		assert!(engine
			.query()
			.list_orders(OrderFilter::Active)
			.await
			.unwrap()
			.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_run_publishes_watcher_changes_until_shutdown() {
		let engine = engine();
		let mut events = engine.event_bus().subscribe();
		let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

		let runner = {
			let engine = engine.clone();
			tokio::spawn(async move {
				engine
					.run_until(async {
						stop_rx.await.ok();
					})
					.await
			})
		};

		let mut checkout = engine.checkout();
		checkout.select_product(3, 1).await.unwrap();
		checkout.submit_delivery(valid_delivery_form()).await.unwrap();
		let id = checkout.confirm("upi").await.unwrap().id();

		// Let the watcher record the pending order before it moves on
		tokio::time::sleep(Duration::from_secs(6)).await;
		engine.state_machine().advance(id).await.unwrap();

		loop {
			if let MarketEvent::Order(OrderEvent::StatusChanged(change)) =
				events.recv().await.unwrap()
			{
				assert_eq!(change.order_id, id);
				assert_eq!(change.new_status, OrderStatus::Processing);
				break;
			}
		}

		stop_tx.send(()).unwrap();
		runner.await.unwrap().unwrap();
	}
}
