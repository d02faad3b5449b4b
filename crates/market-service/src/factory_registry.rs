//! Registry of the storage backends the binary can build.
//!
//! Backends register themselves through `market_storage::get_all_implementations`;
//! the registry resolves the names used in the `[storage]` section against them.

use market_config::Config;
use market_core::{MarketBuilder, MarketEngine, MarketFactories};
use market_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Known implementation factories, keyed by name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Factories for every implementation named in `config`.
	///
	/// Fails on the first name no backend is registered under.
	pub fn storage_factories_for(
		&self,
		config: &Config,
	) -> Result<HashMap<String, StorageFactory>, String> {
		let mut factories = HashMap::new();
		for name in config.storage.implementations.keys() {
			let Some(factory) = self.storage.get(name) else {
				let mut available: Vec<_> = self.storage.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown storage implementation '{}'. Available: [{}]",
					name,
					available.join(", ")
				));
			};
			factories.insert(name.clone(), *factory);
		}
		Ok(factories)
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// The process-wide registry, populated on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();
		for (name, factory) in market_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}
		registry
	})
}

/// Builds the engine from configuration using the registered backends.
pub fn build_engine_from_config(
	config: Config,
) -> Result<MarketEngine, Box<dyn std::error::Error>> {
	let storage_factories = get_registry().storage_factories_for(&config)?;
	let engine = MarketBuilder::new(config).build(MarketFactories { storage_factories })?;
	Ok(engine)
}
