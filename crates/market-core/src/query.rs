//! Read-only views over placed orders.
//!
//! Backs the order list and order detail pages. Every call reads the store
//! afresh; nothing is cached between calls.

use market_storage::{StorageError, StorageService};
use market_types::{Order, OrderId, OrderStatus, StorageKey};
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while querying orders.
#[derive(Debug, Error)]
pub enum QueryError {
	#[error("Order not found: {0}")]
	NotFound(OrderId),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for QueryError {
	fn from(err: StorageError) -> Self {
		QueryError::Storage(err.to_string())
	}
}

/// Which orders a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderFilter {
	/// Every order, cancelled ones included.
	#[default]
	All,
	/// Orders still moving through fulfilment.
	Active,
	Delivered,
}

impl OrderFilter {
	pub fn matches(&self, status: OrderStatus) -> bool {
		match self {
			OrderFilter::All => true,
			OrderFilter::Active => !status.is_terminal(),
			OrderFilter::Delivered => status == OrderStatus::Delivered,
		}
	}
}

impl fmt::Display for OrderFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderFilter::All => write!(f, "all"),
			OrderFilter::Active => write!(f, "active"),
			OrderFilter::Delivered => write!(f, "delivered"),
		}
	}
}

impl FromStr for OrderFilter {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"all" => Ok(OrderFilter::All),
			"active" => Ok(OrderFilter::Active),
			"delivered" => Ok(OrderFilter::Delivered),
			other => Err(format!("Unknown order filter: {}", other)),
		}
	}
}

/// Number of orders per status, in lifecycle order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
	pub counts: Vec<(OrderStatus, usize)>,
}

impl OrderSummary {
	pub fn count(&self, status: OrderStatus) -> usize {
		self.counts
			.iter()
			.find(|(s, _)| *s == status)
			.map_or(0, |(_, n)| *n)
	}

	pub fn total(&self) -> usize {
		self.counts.iter().map(|(_, n)| n).sum()
	}

	pub fn active(&self) -> usize {
		self.counts
			.iter()
			.filter(|(s, _)| OrderFilter::Active.matches(*s))
			.map(|(_, n)| n)
			.sum()
	}
}

/// Query surface over the orders collection.
pub struct OrderQuery {
	storage: Arc<StorageService>,
}

impl OrderQuery {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	async fn load(&self) -> Result<Vec<Order>, QueryError> {
		Ok(self
			.storage
			.get(StorageKey::Orders)
			.await?
			.unwrap_or_default())
	}

	/// Orders matching `filter`, newest first. Ties on date go to the higher id.
	pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>, QueryError> {
		let mut orders: Vec<Order> = self
			.load()
			.await?
			.into_iter()
			.filter(|o| filter.matches(o.status()))
			.collect();
		orders.sort_by_key(|o| Reverse((o.date(), o.id())));
		Ok(orders)
	}

	pub async fn get_order(&self, order_id: OrderId) -> Result<Order, QueryError> {
		self.load()
			.await?
			.into_iter()
			.find(|o| o.id() == order_id)
			.ok_or(QueryError::NotFound(order_id))
	}

	pub async fn summary(&self) -> Result<OrderSummary, QueryError> {
		let orders = self.load().await?;
		let counts = OrderStatus::all()
			.map(|status| {
				let n = orders.iter().filter(|o| o.status() == status).count();
				(status, n)
			})
			.collect();
		Ok(OrderSummary { counts })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{order_placed_at, set_status, storage};
	use chrono::{Duration, TimeZone, Utc};

	async fn seeded() -> (OrderQuery, Vec<OrderId>) {
		let storage = storage();
		let base = Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap();
		let plan = [
			(100100, 0, OrderStatus::Pending),
			(100200, 2, OrderStatus::Delivered),
			(100300, 1, OrderStatus::Cancelled),
			(100400, 3, OrderStatus::Shipped),
			(100500, 3, OrderStatus::Processing),
		];

		let mut ids = Vec::new();
		for (id, hours, status) in plan {
			let order = order_placed_at(id, base + Duration::hours(hours));
			let order_id = order.id();
			storage.append(StorageKey::Orders, order).await.unwrap();
			set_status(&storage, order_id, status).await;
			ids.push(order_id);
		}
		(OrderQuery::new(storage), ids)
	}

	fn ids(orders: &[Order]) -> Vec<u32> {
		orders.iter().map(|o| o.id().value()).collect()
	}

	#[tokio::test]
	async fn test_listing_is_newest_first() {
		let (query, _) = seeded().await;

		let all = query.list_orders(OrderFilter::All).await.unwrap();
		assert_eq!(ids(&all), vec![100500, 100400, 100200, 100300, 100100]);
	}

	#[tokio::test]
	async fn test_filters() {
		let (query, _) = seeded().await;

		let active = query.list_orders(OrderFilter::Active).await.unwrap();
		assert_eq!(ids(&active), vec![100500, 100400, 100100]);

		let delivered = query.list_orders(OrderFilter::Delivered).await.unwrap();
		assert_eq!(ids(&delivered), vec![100200]);

		assert_eq!("Active".parse::<OrderFilter>(), Ok(OrderFilter::Active));
		assert!("cancelled".parse::<OrderFilter>().is_err());
	}

	#[tokio::test]
	async fn test_get_and_summary() {
		let (query, ids) = seeded().await;

		let order = query.get_order(ids[3]).await.unwrap();
		assert_eq!(order.status(), OrderStatus::Shipped);

		let missing = OrderId::new(654321).unwrap();
		assert!(matches!(
			query.get_order(missing).await.unwrap_err(),
			QueryError::NotFound(id) if id == missing
		));

		let summary = query.summary().await.unwrap();
		assert_eq!(summary.total(), 5);
		assert_eq!(summary.active(), 3);
		assert_eq!(summary.count(OrderStatus::Cancelled), 1);
		assert_eq!(summary.counts.len(), 5);
	}

	#[tokio::test]
	async fn test_empty_store() {
		let query = OrderQuery::new(storage());
		assert!(query.list_orders(OrderFilter::All).await.unwrap().is_empty());
		assert_eq!(query.summary().await.unwrap().total(), 0);
	}
}
