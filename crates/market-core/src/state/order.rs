//! Order state machine implementation.
//!
//! Applies status transitions to placed orders: pending -> processing ->
//! shipped -> delivered, with cancellation allowed until shipment. Every
//! change is a single atomic update of the orders collection, so the next
//! watcher poll observes it.

use crate::engine::event_bus::EventBus;
use market_storage::{StorageError, StorageService};
use market_types::{
	MarketEvent, Order, OrderEvent, OrderId, OrderStatus, StorageKey, TransitionError,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order not found: {0}")]
	OrderNotFound(OrderId),
	#[error("Order status changed concurrently: expected {expected}, found {actual}")]
	Conflict {
		expected: OrderStatus,
		actual: OrderStatus,
	},
	#[error("Order can no longer be cancelled (status {status})")]
	CancellationNotAllowed { status: OrderStatus },
	#[error("Order is already {status} and cannot advance")]
	Terminal { status: OrderStatus },
}

impl From<StorageError> for OrderStateError {
	fn from(err: StorageError) -> Self {
		OrderStateError::Storage(err.to_string())
	}
}

impl From<TransitionError> for OrderStateError {
	fn from(err: TransitionError) -> Self {
		match err {
			TransitionError::InvalidTransition { from, to } => {
				OrderStateError::InvalidTransition { from, to }
			},
		}
	}
}

/// Manages order state transitions and persistence
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
	event_bus: EventBus,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>, event_bus: EventBus) -> Self {
		Self { storage, event_bus }
	}

	/// Applies `updater` to one order inside an atomic collection update.
	///
	/// Returns the order as stored afterwards. If `updater` fails the
	/// collection is not written.
	async fn update_order_with<F>(&self, order_id: OrderId, updater: F) -> Result<Order, OrderStateError>
	where
		F: FnOnce(&mut Order) -> Result<(), OrderStateError>,
	{
		let (from, order) = self
			.storage
			.update_collection(StorageKey::Orders, |orders: &mut Vec<Order>| {
				let order = orders
					.iter_mut()
					.find(|o| o.id() == order_id)
					.ok_or(OrderStateError::OrderNotFound(order_id))?;
				let from = order.status();
				updater(order)?;
				Ok::<_, OrderStateError>((from, order.clone()))
			})
			.await?;

		if from != order.status() {
			tracing::info!(from = %from, to = %order.status(), "Order status updated");
			self.event_bus
				.publish(MarketEvent::Order(OrderEvent::StatusUpdated {
					order_id,
					from,
					to: order.status(),
				}))
				.ok();
		}

		Ok(order)
	}

	/// Transitions an order to a new status with validation
	#[instrument(skip_all, fields(order_id = %order_id, to = %new_status))]
	pub async fn transition_order_status(
		&self,
		order_id: OrderId,
		new_status: OrderStatus,
	) -> Result<Order, OrderStateError> {
		self.update_order_with(order_id, |order| Ok(order.transition(new_status)?))
			.await
	}

	/// Transitions only if the order is still in `expected`.
	///
	/// Lets a caller that read the order earlier detect that someone else
	/// moved it in the meantime.
	#[instrument(skip_all, fields(order_id = %order_id, to = %new_status))]
	pub async fn compare_and_transition(
		&self,
		order_id: OrderId,
		expected: OrderStatus,
		new_status: OrderStatus,
	) -> Result<Order, OrderStateError> {
		self.update_order_with(order_id, |order| {
			if order.status() != expected {
				return Err(OrderStateError::Conflict {
					expected,
					actual: order.status(),
				});
			}
			Ok(order.transition(new_status)?)
		})
		.await
	}

	/// Moves the order one step along the happy path.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn advance(&self, order_id: OrderId) -> Result<Order, OrderStateError> {
		self.update_order_with(order_id, |order| {
			let next = order.status().next().ok_or(OrderStateError::Terminal {
				status: order.status(),
			})?;
			Ok(order.transition(next)?)
		})
		.await
	}

	/// Cancels an order that has not shipped yet.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order, OrderStateError> {
		self.update_order_with(order_id, |order| {
			if !order.status().can_cancel() {
				return Err(OrderStateError::CancellationNotAllowed {
					status: order.status(),
				});
			}
			Ok(order.transition(OrderStatus::Cancelled)?)
		})
		.await
	}

	/// Whether the order may still be cancelled.
	pub async fn can_cancel(&self, order_id: OrderId) -> Result<bool, OrderStateError> {
		Ok(self.get_order(order_id).await?.status().can_cancel())
	}

	/// Gets an order by ID
	pub async fn get_order(&self, order_id: OrderId) -> Result<Order, OrderStateError> {
		let orders: Vec<Order> = self
			.storage
			.get(StorageKey::Orders)
			.await?
			.unwrap_or_default();
		orders
			.into_iter()
			.find(|o| o.id() == order_id)
			.ok_or(OrderStateError::OrderNotFound(order_id))
	}
}
