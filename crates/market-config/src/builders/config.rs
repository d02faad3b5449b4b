//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{
	CatalogConfig, CheckoutConfig, Config, IdentityConfig, MarketConfig, StorageConfig,
	WatcherConfig,
};
use market_types::CatalogProduct;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to in-memory storage, a 40 INR delivery fee, an empty catalog
/// and no signed-in user.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	market_id: String,
	currency: String,
	namespace: Option<String>,
	delivery_fee: Decimal,
	payment_methods: Vec<String>,
	storage_primary: String,
	storage_config: toml::Value,
	storage_cleanup_interval_seconds: u64,
	poll_interval_seconds: u64,
	identity: Option<IdentityConfig>,
	products: Vec<CatalogProduct>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		let checkout = CheckoutConfig::default();
		Self {
			market_id: "test-market".to_string(),
			currency: "INR".to_string(),
			namespace: None,
			delivery_fee: checkout.delivery_fee,
			payment_methods: checkout.payment_methods,
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::Table::new()),
			storage_cleanup_interval_seconds: 60,
			poll_interval_seconds: 1,
			identity: None,
			products: Vec::new(),
		}
	}

	pub fn market_id(mut self, id: impl Into<String>) -> Self {
		self.market_id = id.into();
		self
	}

	pub fn currency(mut self, currency: impl Into<String>) -> Self {
		self.currency = currency.into();
		self
	}

	/// Sets the storage key namespace.
	pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = Some(namespace.into());
		self
	}

	pub fn delivery_fee(mut self, fee: Decimal) -> Self {
		self.delivery_fee = fee;
		self
	}

	pub fn payment_methods(mut self, methods: Vec<String>) -> Self {
		self.payment_methods = methods;
		self
	}

	/// Sets the primary storage implementation and its configuration table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	/// Sets the storage cleanup interval in seconds.
	pub fn storage_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.storage_cleanup_interval_seconds = interval;
		self
	}

	/// Sets the watcher poll interval in seconds.
	pub fn poll_interval_seconds(mut self, interval: u64) -> Self {
		self.poll_interval_seconds = interval;
		self
	}

	/// Sets the signed-in user's display name.
	pub fn identity_name(mut self, name: impl Into<String>) -> Self {
		self.identity = Some(IdentityConfig {
			name: Some(name.into()),
			email: None,
		});
		self
	}

	/// Adds a product to the catalog.
	pub fn product(mut self, product: CatalogProduct) -> Self {
		self.products.push(product);
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(self.storage_primary.clone(), self.storage_config);

		Config {
			market: MarketConfig {
				id: self.market_id,
				currency: self.currency,
				namespace: self.namespace,
			},
			checkout: CheckoutConfig {
				delivery_fee: self.delivery_fee,
				payment_methods: self.payment_methods,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			watcher: WatcherConfig {
				poll_interval_seconds: self.poll_interval_seconds,
			},
			identity: self.identity,
			catalog: CatalogConfig {
				products: self.products,
			},
		}
	}
}
