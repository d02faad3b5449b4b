//! Configuration module for the marketplace.
//!
//! This module provides structures and utilities for managing marketplace
//! configuration. It supports loading configuration from TOML files and
//! validates that every section is usable before the engine is built.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}

use market_types::CatalogProduct;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the marketplace.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this marketplace instance.
	pub market: MarketConfig,
	/// Checkout pricing and payment options.
	#[serde(default)]
	pub checkout: CheckoutConfig,
	/// Configuration for the Record Store backend.
	pub storage: StorageConfig,
	/// Order status watcher cadence.
	#[serde(default)]
	pub watcher: WatcherConfig,
	/// The signed-in user, if any.
	pub identity: Option<IdentityConfig>,
	/// Products offered for sale.
	#[serde(default)]
	pub catalog: CatalogConfig,
}

/// Configuration specific to the marketplace instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketConfig {
	/// Unique identifier for this marketplace instance.
	pub id: String,
	/// Currency code printed in front of amounts.
	#[serde(default = "default_currency")]
	pub currency: String,
	/// Optional prefix for every storage key, isolating one buyer session.
	pub namespace: Option<String>,
}

fn default_currency() -> String {
	"INR".to_string()
}

/// Checkout pricing and payment options.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutConfig {
	/// Flat fee added to every order.
	#[serde(default = "default_delivery_fee")]
	pub delivery_fee: Decimal,
	/// Payment methods the buyer may choose at confirmation.
	#[serde(default = "default_payment_methods")]
	pub payment_methods: Vec<String>,
}

impl Default for CheckoutConfig {
	fn default() -> Self {
		Self {
			delivery_fee: default_delivery_fee(),
			payment_methods: default_payment_methods(),
		}
	}
}

fn default_delivery_fee() -> Decimal {
	Decimal::from(40)
}

fn default_payment_methods() -> Vec<String> {
	vec![
		"cash_on_delivery".to_string(),
		"upi".to_string(),
		"card".to_string(),
	]
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	pub cleanup_interval_seconds: u64,
}

/// Configuration for the order status watcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatcherConfig {
	/// Seconds between two polls of the order list.
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
}

impl Default for WatcherConfig {
	fn default() -> Self {
		Self {
			poll_interval_seconds: default_poll_interval_seconds(),
		}
	}
}

fn default_poll_interval_seconds() -> u64 {
	5
}

/// The current user as known to the identity collaborator.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IdentityConfig {
	pub name: Option<String>,
	pub email: Option<String>,
}

/// Static product catalog.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogConfig {
	#[serde(default)]
	pub products: Vec<CatalogProduct>,
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();

		let value = match (std::env::var(var_name), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name
				)))
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// This checks every section:
	/// - Market ID and currency are not empty
	/// - Delivery fee is not negative and at least one payment method exists
	/// - Primary storage is configured and the cleanup interval is within bounds
	/// - The watcher interval is within bounds
	/// - Catalog products have unique ids and sane prices
	fn validate(&self) -> Result<(), ConfigError> {
		// Validate market config
		if self.market.id.trim().is_empty() {
			return Err(ConfigError::Validation("Market ID cannot be empty".into()));
		}
		if self.market.currency.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Market currency cannot be empty".into(),
			));
		}

		// Validate checkout config
		if self.checkout.delivery_fee.is_sign_negative() {
			return Err(ConfigError::Validation(
				"Checkout delivery_fee cannot be negative".into(),
			));
		}
		if self.checkout.payment_methods.is_empty() {
			return Err(ConfigError::Validation(
				"At least one payment method must be configured".into(),
			));
		}
		if self
			.checkout
			.payment_methods
			.iter()
			.any(|m| m.trim().is_empty())
		{
			return Err(ConfigError::Validation(
				"Payment method names cannot be empty".into(),
			));
		}

		// Validate storage config
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		// Validate watcher config
		if self.watcher.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Watcher poll_interval_seconds must be greater than 0".into(),
			));
		}
		if self.watcher.poll_interval_seconds > 3600 {
			return Err(ConfigError::Validation(
				"Watcher poll_interval_seconds cannot exceed 3600 (1 hour)".into(),
			));
		}

		self.validate_catalog()
	}

	fn validate_catalog(&self) -> Result<(), ConfigError> {
		let mut seen = HashSet::new();
		for product in &self.catalog.products {
			if !seen.insert(product.id) {
				return Err(ConfigError::Validation(format!(
					"Duplicate catalog product id {}",
					product.id
				)));
			}
			if product.name.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Catalog product {} must have a name",
					product.id
				)));
			}
			if product.price.is_sign_negative() {
				return Err(ConfigError::Validation(format!(
					"Catalog product {} has a negative price",
					product.id
				)));
			}
		}
		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
