//! Product types shared between the catalog and placed orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Value copy of a catalog item taken when the buyer selects it.
///
/// Orders embed this snapshot so later catalog edits never change the
/// price or description of historical orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
	pub id: u64,
	pub name: String,
	pub image: String,
	pub price: Decimal,
	/// Selling unit such as "kg" or "L".
	pub unit: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Farmer or seller listing the product.
	pub owner: String,
	pub location: String,
}

/// A catalog entry as returned by the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
	pub id: u64,
	pub name: String,
	#[serde(default)]
	pub image: String,
	pub price: Decimal,
	pub unit: String,
	#[serde(default)]
	pub description: Option<String>,
	pub owner: String,
	pub location: String,
	/// Quantity the seller can currently supply.
	pub available_quantity: u32,
}

impl CatalogProduct {
	/// Takes an immutable snapshot of the product's display fields.
	pub fn snapshot(&self) -> ProductSnapshot {
		ProductSnapshot {
			id: self.id,
			name: self.name.clone(),
			image: self.image.clone(),
			price: self.price,
			unit: self.unit.clone(),
			description: self.description.clone(),
			owner: self.owner.clone(),
			location: self.location.clone(),
		}
	}
}
