//! Builder pattern for constructing the marketplace engine.
//!
//! Resolves the configured storage backend through a factory map and wires
//! the remaining components around it. The catalog and identity
//! collaborators default to the ones described by the configuration and can
//! be replaced before building.

use crate::catalog::{CatalogInterface, StaticCatalog};
use crate::engine::{event_bus::EventBus, MarketEngine};
use crate::identity::{ConfiguredIdentity, IdentityProvider};
use market_config::Config;
use market_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions the builder resolves configured implementations with.
pub struct MarketFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for a [`MarketEngine`].
pub struct MarketBuilder {
	config: Config,
	catalog: Option<Arc<dyn CatalogInterface>>,
	identity: Option<Arc<dyn IdentityProvider>>,
}

impl MarketBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			catalog: None,
			identity: None,
		}
	}

	/// Uses `catalog` instead of the configured product list.
	pub fn with_catalog(mut self, catalog: Arc<dyn CatalogInterface>) -> Self {
		self.catalog = Some(catalog);
		self
	}

	pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
		self.identity = Some(identity);
		self
	}

	pub fn build<SF>(self, factories: MarketFactories<SF>) -> Result<MarketEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary_storage = &self.config.storage.primary;
		if !factories.storage_factories.contains_key(primary_storage) {
			return Err(BuilderError::MissingComponent(format!(
				"no storage implementation named '{}'",
				primary_storage
			)));
		}

		// Create storage implementations
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "Unknown implementation, skipped");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = primary_storage == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' has no configuration",
				primary_storage
			))
		})?;

		let mut storage = StorageService::new(storage_backend);
		if let Some(namespace) = &self.config.market.namespace {
			storage = storage.with_namespace(namespace.clone());
		}
		let storage = Arc::new(storage);

		let catalog = match self.catalog {
			Some(catalog) => catalog,
			None => {
				let catalog = StaticCatalog::from_config(&self.config.catalog);
				tracing::info!(component = "catalog", products = catalog.len(), "Loaded");
				Arc::new(catalog)
			},
		};
		let identity = self.identity.unwrap_or_else(|| {
			Arc::new(ConfiguredIdentity::from_config(self.config.identity.as_ref()))
		});

		Ok(MarketEngine::new(
			self.config,
			storage,
			catalog,
			identity,
			EventBus::new(1000),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::identity::CurrentUser;
	use crate::test_support::catalog_product;
	use market_config::builders::config::ConfigBuilder;
	use market_storage::StorageFactory;

	fn factories() -> MarketFactories<StorageFactory> {
		MarketFactories {
			storage_factories: market_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	struct FixedIdentity;

	impl IdentityProvider for FixedIdentity {
		fn current_user(&self) -> Option<CurrentUser> {
			Some(CurrentUser {
				name: Some("Meera".into()),
				email: None,
			})
		}
	}

	#[tokio::test]
	async fn test_build_with_file_storage() {
		let dir = tempfile::tempdir().unwrap();
		let mut table = toml::map::Map::new();
		table.insert(
			"storage_path".into(),
			toml::Value::String(dir.path().to_string_lossy().into_owned()),
		);
		let config = ConfigBuilder::new()
			.storage("file", toml::Value::Table(table))
			.product(catalog_product(5))
			.build();

		let engine = MarketBuilder::new(config).build(factories()).unwrap();
		engine.initialize().await.unwrap();

		let mut checkout = engine.checkout();
		checkout.select_product(3, 2).await.unwrap();
		assert!(dir.path().join("draft_selection.bin").exists());
	}

	#[test]
	fn test_unknown_primary_storage() {
		let config = ConfigBuilder::new()
			.storage("redis", toml::Value::Table(Default::default()))
			.build();

		assert!(matches!(
			MarketBuilder::new(config).build(factories()),
			Err(BuilderError::MissingComponent(_))
		));
	}

	#[test]
	fn test_invalid_storage_configuration() {
		let mut table = toml::map::Map::new();
		table.insert("storage_path".into(), toml::Value::Integer(7));
		let config = ConfigBuilder::new()
			.storage("file", toml::Value::Table(table))
			.build();

		assert!(matches!(
			MarketBuilder::new(config).build(factories()),
			Err(BuilderError::Config(_))
		));
	}

	#[tokio::test]
	async fn test_overrides_replace_configured_collaborators() {
		let config = ConfigBuilder::new()
			.identity_name("Configured")
			.product(catalog_product(5))
			.build();
		let engine = MarketBuilder::new(config)
			.with_catalog(Arc::new(StaticCatalog::new([])))
			.with_identity(Arc::new(FixedIdentity))
			.build(factories())
			.unwrap();

		assert!(engine.catalog().list_products().await.unwrap().is_empty());
		let defaults = engine.checkout().delivery_defaults().await.unwrap();
		assert_eq!(defaults.full_name.as_deref(), Some("Meera"));
	}
}
