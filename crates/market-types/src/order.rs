//! Order types for the marketplace.
//!
//! This module defines the durable order record, its status lifecycle and the
//! transition graph that governs how the status of a placed order may change.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use thiserror::Error;

use crate::{DeliveryDetails, ProductSnapshot};

/// Errors raised by the order status transition graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
	/// The requested edge is not part of the transition graph.
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// Error returned when parsing an order status from text fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown order status: {0}")]
pub struct ParseStatusError(pub String);

/// Human-facing order identifier.
///
/// Order ids are six-digit numbers (100000..=999999). Uniqueness is enforced by
/// the component that allocates them, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u32);

impl OrderId {
	/// Smallest valid order id.
	pub const MIN: u32 = 100_000;
	/// Largest valid order id.
	pub const MAX: u32 = 999_999;

	/// Wraps a raw value, returning `None` if it is not a six-digit number.
	pub fn new(value: u32) -> Option<Self> {
		(Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
	}

	pub fn value(&self) -> u32 {
		self.0
	}
}

impl fmt::Display for OrderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for OrderId {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let value: u32 = s
			.trim()
			.trim_start_matches('#')
			.parse()
			.map_err(|_| format!("Order id must be a number: {}", s))?;
		Self::new(value).ok_or_else(|| format!("Order id must have six digits: {}", s))
	}
}

/// Status of an order.
///
/// The happy path is totally ordered: pending < processing < shipped < delivered.
/// `Cancelled` is reachable only from `Pending` or `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// Order has been placed and awaits packing.
	Pending,
	/// Order is being packed by the seller.
	#[serde(alias = "packed")]
	Processing,
	/// Order has left the seller.
	Shipped,
	/// Order reached the buyer. Terminal.
	Delivered,
	/// Order was cancelled before shipment. Terminal.
	Cancelled,
}

/// Static transition table; each status maps to the statuses it may move to.
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Pending,
		HashSet::from([OrderStatus::Processing, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::Processing,
		HashSet::from([OrderStatus::Shipped, OrderStatus::Cancelled]),
	);
	m.insert(OrderStatus::Shipped, HashSet::from([OrderStatus::Delivered]));
	m.insert(OrderStatus::Delivered, HashSet::new()); // terminal
	m.insert(OrderStatus::Cancelled, HashSet::new()); // terminal
	m
});

impl OrderStatus {
	/// Returns all statuses in lifecycle order.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::Processing,
			Self::Shipped,
			Self::Delivered,
			Self::Cancelled,
		]
		.into_iter()
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Processing => "processing",
			OrderStatus::Shipped => "shipped",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
		}
	}

	/// Position on the happy path. `Cancelled` has no rank.
	pub fn rank(&self) -> Option<u8> {
		match self {
			OrderStatus::Pending => Some(0),
			OrderStatus::Processing => Some(1),
			OrderStatus::Shipped => Some(2),
			OrderStatus::Delivered => Some(3),
			OrderStatus::Cancelled => None,
		}
	}

	/// The next status on the happy path, if any.
	pub fn next(&self) -> Option<Self> {
		match self {
			OrderStatus::Pending => Some(OrderStatus::Processing),
			OrderStatus::Processing => Some(OrderStatus::Shipped),
			OrderStatus::Shipped => Some(OrderStatus::Delivered),
			OrderStatus::Delivered | OrderStatus::Cancelled => None,
		}
	}

	pub fn is_terminal(&self) -> bool {
		TRANSITIONS.get(self).is_none_or(|set| set.is_empty())
	}

	/// Whether an order in this status may still be cancelled.
	pub fn can_cancel(&self) -> bool {
		self.can_transition_to(&OrderStatus::Cancelled)
	}

	/// Checks whether `self -> to` is an edge of the transition graph.
	pub fn can_transition_to(&self, to: &OrderStatus) -> bool {
		TRANSITIONS.get(self).is_some_and(|set| set.contains(to))
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = ParseStatusError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"pending" => Ok(Self::Pending),
			"processing" | "packed" => Ok(Self::Processing),
			"shipped" => Ok(Self::Shipped),
			"delivered" => Ok(Self::Delivered),
			"cancelled" | "canceled" => Ok(Self::Cancelled),
			_ => Err(ParseStatusError(s.to_string())),
		}
	}
}

/// A placed order.
///
/// Everything except `status` is fixed at creation. The status only changes
/// through [`Order::transition`], which enforces the transition graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	id: OrderId,
	product: ProductSnapshot,
	quantity: NonZeroU32,
	delivery_info: DeliveryDetails,
	status: OrderStatus,
	date: DateTime<Utc>,
	total_amount: Decimal,
	payment_method: String,
}

impl Order {
	/// Creates a new order in `Pending` status.
	pub fn new(
		id: OrderId,
		product: ProductSnapshot,
		quantity: NonZeroU32,
		delivery_info: DeliveryDetails,
		date: DateTime<Utc>,
		total_amount: Decimal,
		payment_method: impl Into<String>,
	) -> Self {
		Self {
			id,
			product,
			quantity,
			delivery_info,
			status: OrderStatus::Pending,
			date,
			total_amount,
			payment_method: payment_method.into(),
		}
	}

	pub fn id(&self) -> OrderId {
		self.id
	}

	pub fn product(&self) -> &ProductSnapshot {
		&self.product
	}

	pub fn quantity(&self) -> u32 {
		self.quantity.get()
	}

	pub fn delivery_info(&self) -> &DeliveryDetails {
		&self.delivery_info
	}

	pub fn status(&self) -> OrderStatus {
		self.status
	}

	pub fn date(&self) -> DateTime<Utc> {
		self.date
	}

	pub fn total_amount(&self) -> Decimal {
		self.total_amount
	}

	pub fn payment_method(&self) -> &str {
		&self.payment_method
	}

	/// Moves the order to `new_status` if the edge is legal.
	///
	/// On error the order is left untouched.
	pub fn transition(&mut self, new_status: OrderStatus) -> Result<(), TransitionError> {
		if !self.status.can_transition_to(&new_status) {
			return Err(TransitionError::InvalidTransition {
				from: self.status,
				to: new_status,
			});
		}
		self.status = new_status;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::DeliveryForm;

	fn sample_order() -> Order {
		let product = ProductSnapshot {
			id: 3,
			name: "Cold pressed groundnut oil".to_string(),
			image: "/images/oil.png".to_string(),
			price: Decimal::from(200),
			unit: "L".to_string(),
			description: None,
			owner: "Ravi Kumar".to_string(),
			location: "Mandya".to_string(),
		};
		let delivery = DeliveryForm {
			full_name: Some("John Doe".into()),
			phone_number: Some("9876543210".into()),
			address: Some("12 Farm Rd".into()),
			pin_code: Some("560001".into()),
			..Default::default()
		}
		.validate()
		.unwrap();
		Order::new(
			OrderId::new(123456).unwrap(),
			product,
			NonZeroU32::new(2).unwrap(),
			delivery,
			Utc::now(),
			Decimal::from(440),
			"cash_on_delivery",
		)
	}

	#[test]
	fn test_order_id_bounds() {
		assert!(OrderId::new(99_999).is_none());
		assert!(OrderId::new(1_000_000).is_none());
		assert_eq!(OrderId::new(560_001).unwrap().to_string(), "560001");
		assert_eq!("#123456".parse::<OrderId>().unwrap().value(), 123456);
		assert!("12".parse::<OrderId>().is_err());
	}

	#[test]
	fn test_happy_path_edges() {
		assert!(OrderStatus::Pending.can_transition_to(&OrderStatus::Processing));
		assert!(OrderStatus::Processing.can_transition_to(&OrderStatus::Shipped));
		assert!(OrderStatus::Shipped.can_transition_to(&OrderStatus::Delivered));
	}

	#[test]
	fn test_rejected_edges() {
		// Skipping ahead
		assert!(!OrderStatus::Pending.can_transition_to(&OrderStatus::Shipped));
		// Same-status no-op
		assert!(!OrderStatus::Pending.can_transition_to(&OrderStatus::Pending));
		// Backward
		assert!(!OrderStatus::Shipped.can_transition_to(&OrderStatus::Processing));
		// Out of terminal states
		for status in OrderStatus::all() {
			assert!(!OrderStatus::Delivered.can_transition_to(&status));
			assert!(!OrderStatus::Cancelled.can_transition_to(&status));
		}
	}

	#[test]
	fn test_cancel_capability() {
		assert!(OrderStatus::Pending.can_cancel());
		assert!(OrderStatus::Processing.can_cancel());
		assert!(!OrderStatus::Shipped.can_cancel());
		assert!(!OrderStatus::Delivered.can_cancel());
		assert!(!OrderStatus::Cancelled.can_cancel());
	}

	#[test]
	fn test_every_legal_edge_moves_forward_or_cancels() {
		for from in OrderStatus::all() {
			for to in OrderStatus::all() {
				if from.can_transition_to(&to) {
					match (from.rank(), to.rank()) {
						(Some(a), Some(b)) => assert_eq!(b, a + 1),
						(_, None) => assert!(from.can_cancel()),
						(None, Some(_)) => panic!("left a terminal state"),
					}
				}
			}
		}
	}

	#[test]
	fn test_rejected_transition_leaves_order_unchanged() {
		let mut order = sample_order();
		let before = order.clone();

		let err = order.transition(OrderStatus::Shipped).unwrap_err();
		assert_eq!(
			err,
			TransitionError::InvalidTransition {
				from: OrderStatus::Pending,
				to: OrderStatus::Shipped
			}
		);
		assert_eq!(order, before);

		order.transition(OrderStatus::Processing).unwrap();
		assert_eq!(order.status(), OrderStatus::Processing);
	}

	#[test]
	fn test_status_parsing_and_serde() {
		assert_eq!("packed".parse::<OrderStatus>().unwrap(), OrderStatus::Processing);
		assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
		assert!("lost".parse::<OrderStatus>().is_err());

		let json = serde_json::to_string(&OrderStatus::Delivered).unwrap();
		assert_eq!(json, "\"delivered\"");
		let packed: OrderStatus = serde_json::from_str("\"packed\"").unwrap();
		assert_eq!(packed, OrderStatus::Processing);
	}

	#[test]
	fn test_order_wire_format_uses_camel_case() {
		let order = sample_order();
		let value = serde_json::to_value(&order).unwrap();
		assert_eq!(value["id"], 123456);
		assert_eq!(value["status"], "pending");
		assert_eq!(value["paymentMethod"], "cash_on_delivery");
		assert_eq!(value["deliveryInfo"]["fullName"], "John Doe");
		assert!(value.get("totalAmount").is_some());

		let back: Order = serde_json::from_value(value).unwrap();
		assert_eq!(back, order);
	}
}
