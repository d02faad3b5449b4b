//! Event types for inter-component communication.
//!
//! Events flow through the engine's event bus so that views, loggers and
//! notification sinks can react to order lifecycle changes without being
//! coupled to the components that produce them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CheckoutStep, OrderId, OrderStatus};

/// Main event type encompassing all marketplace events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
	/// Events from the checkout wizard.
	Checkout(CheckoutEvent),
	/// Events from the order lifecycle.
	Order(OrderEvent),
}

/// Events related to the checkout wizard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CheckoutEvent {
	/// The wizard moved to a new step.
	StepChanged {
		from: CheckoutStep,
		to: CheckoutStep,
	},
	/// A step was requested without its upstream data.
	Redirected {
		requested: CheckoutStep,
		redirect_to: CheckoutStep,
	},
}

/// Events related to placed orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// An order was placed at checkout confirmation.
	Placed {
		order_id: OrderId,
		total_amount: Decimal,
	},
	/// A status transition was applied through the state machine.
	StatusUpdated {
		order_id: OrderId,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// The watcher observed a status change on a poll.
	StatusChanged(StatusChange),
}

/// A status delta detected by the watcher. One is emitted per actual change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
	pub order_id: OrderId,
	pub previous_status: OrderStatus,
	pub new_status: OrderStatus,
	pub observed_at: DateTime<Utc>,
}

impl fmt::Display for StatusChange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Order #{} is now {} (was {})",
			self.order_id, self.new_status, self.previous_status
		)
	}
}
