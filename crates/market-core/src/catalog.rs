//! Product catalog collaborator.
//!
//! The checkout only needs to look products up by id. Catalog management
//! lives elsewhere; this crate ships a static catalog read from configuration.

use async_trait::async_trait;
use market_config::CatalogConfig;
use market_types::CatalogProduct;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while talking to the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
	#[error("Catalog unavailable: {0}")]
	Unavailable(String),
}

/// Read access to the product catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogInterface: Send + Sync {
	/// Looks up one product. `Ok(None)` means the id is unknown.
	async fn get_product(&self, id: u64) -> Result<Option<CatalogProduct>, CatalogError>;

	/// Lists every product, ordered by id.
	async fn list_products(&self) -> Result<Vec<CatalogProduct>, CatalogError>;
}

/// Catalog backed by the `[[catalog.products]]` configuration entries.
pub struct StaticCatalog {
	products: BTreeMap<u64, CatalogProduct>,
}

impl StaticCatalog {
	pub fn new(products: impl IntoIterator<Item = CatalogProduct>) -> Self {
		Self {
			products: products.into_iter().map(|p| (p.id, p)).collect(),
		}
	}

	pub fn from_config(config: &CatalogConfig) -> Self {
		Self::new(config.products.iter().cloned())
	}

	pub fn len(&self) -> usize {
		self.products.len()
	}

	pub fn is_empty(&self) -> bool {
		self.products.is_empty()
	}
}

#[async_trait]
impl CatalogInterface for StaticCatalog {
	async fn get_product(&self, id: u64) -> Result<Option<CatalogProduct>, CatalogError> {
		Ok(self.products.get(&id).cloned())
	}

	async fn list_products(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
		Ok(self.products.values().cloned().collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal::Decimal;

	fn product(id: u64, name: &str) -> CatalogProduct {
		CatalogProduct {
			id,
			name: name.to_string(),
			image: String::new(),
			price: Decimal::from(30),
			unit: "kg".to_string(),
			description: None,
			owner: "Lakshmi".to_string(),
			location: "Hassan".to_string(),
			available_quantity: 12,
		}
	}

	#[tokio::test]
	async fn test_lookup_and_listing_order() {
		let catalog = StaticCatalog::new([product(9, "Ragi"), product(2, "Tomato")]);

		assert_eq!(catalog.len(), 2);
		assert_eq!(
			catalog.get_product(9).await.unwrap().map(|p| p.name),
			Some("Ragi".to_string())
		);
		assert!(catalog.get_product(4).await.unwrap().is_none());

		let ids: Vec<u64> = catalog
			.list_products()
			.await
			.unwrap()
			.into_iter()
			.map(|p| p.id)
			.collect();
		assert_eq!(ids, vec![2, 9]);
	}
}
