//! Startup and shutdown of the marketplace engine.

use super::{EngineError, MarketEngine};

impl MarketEngine {
	/// Checks that the catalog and the orders collection are readable and
	/// logs what the engine starts with.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let products = self
			.catalog
			.list_products()
			.await
			.map_err(|e| EngineError::Catalog(e.to_string()))?;
		let summary = self
			.query
			.summary()
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;

		if products.is_empty() {
			tracing::warn!("Catalog is empty, nothing can be checked out");
		}
		tracing::info!(
			market_id = %self.config.market.id,
			products = products.len(),
			orders = summary.total(),
			active_orders = summary.active(),
			"Marketplace initialized"
		);
		Ok(())
	}

	/// Removes expired storage entries one last time.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down marketplace engine");

		let removed = self
			.storage
			.cleanup_expired()
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;
		if removed > 0 {
			tracing::debug!(removed, "Removed expired entries on shutdown");
		}
		Ok(())
	}
}
