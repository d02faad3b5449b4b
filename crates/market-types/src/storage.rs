//! Storage-related types for the marketplace.

use std::str::FromStr;

/// Storage keys for the persisted buckets.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Single slot holding the current product selection (transient)
	DraftSelection,
	/// Single slot holding the entered delivery details (transient)
	DraftDelivery,
	/// Append-only list of placed orders (durable)
	Orders,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::DraftSelection => "draft_selection",
			StorageKey::DraftDelivery => "draft_delivery",
			StorageKey::Orders => "orders",
		}
	}

	/// Whether the bucket only lives until the checkout it belongs to completes.
	pub fn is_transient(&self) -> bool {
		!matches!(self, StorageKey::Orders)
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::DraftSelection, Self::DraftDelivery, Self::Orders].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"draft_selection" => Ok(Self::DraftSelection),
			"draft_delivery" => Ok(Self::DraftDelivery),
			"orders" => Ok(Self::Orders),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
