//! Record Store for the marketplace.
//!
//! This module provides the keyed persistence layer behind checkout drafts and
//! placed orders. A low-level byte-oriented [`StorageInterface`] is implemented
//! by pluggable backends, and [`StorageService`] layers typed JSON access and
//! atomic read-modify-write of collections on top of it.

use async_trait::async_trait;
use market_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// Backends only deal in raw bytes keyed by strings. Typing, namespacing and
/// write serialization are handled by [`StorageService`].
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key. Deleting a missing key succeeds.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries from storage and returns how many were removed.
	///
	/// Backends without expiration keep the default no-op.
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples used to build the factory map
/// the engine builder resolves `storage.primary` against.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Typed access to the Record Store.
///
/// Values are stored as JSON under a [`StorageKey`], optionally prefixed by a
/// namespace so several checkout sessions can share one backend. All mutating
/// operations are serialized through an async mutex, which makes
/// [`append`](Self::append) and [`update_collection`](Self::update_collection)
/// free of lost updates within one process.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
	/// Prefix applied to every key, if configured.
	namespace: Option<String>,
	/// Serializes writers.
	write_lock: Mutex<()>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self {
			backend,
			namespace: None,
			write_lock: Mutex::new(()),
		}
	}

	/// Prefixes every key with `namespace`.
	pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
		let namespace = namespace.into();
		self.namespace = (!namespace.is_empty()).then_some(namespace);
		self
	}

	fn full_key(&self, key: StorageKey) -> String {
		match &self.namespace {
			Some(ns) => format!("{}:{}", ns, key.as_str()),
			None => key.as_str().to_string(),
		}
	}

	async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
		let bytes = match self.backend.get_bytes(key).await {
			Ok(bytes) => bytes,
			Err(StorageError::NotFound) => return Ok(None),
			Err(e) => return Err(e),
		};
		serde_json::from_slice(&bytes)
			.map(Some)
			.map_err(|e| StorageError::Serialization(e.to_string()))
	}

	async fn write<T: Serialize + ?Sized>(
		&self,
		key: &str,
		value: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(key, bytes, ttl).await
	}

	/// Reads and deserializes the value under `key`.
	///
	/// An absent key yields `Ok(None)`, which callers can tell apart from a
	/// stored empty collection.
	pub async fn get<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>, StorageError> {
		self.read(&self.full_key(key)).await
	}

	/// Replaces the value under `key`.
	pub async fn set<T: Serialize + ?Sized>(
		&self,
		key: StorageKey,
		value: &T,
	) -> Result<(), StorageError> {
		self.set_with_ttl(key, value, None).await
	}

	/// Replaces the value under `key` with an explicit time-to-live.
	///
	/// `None` lets the backend apply its configured per-key TTL.
	pub async fn set_with_ttl<T: Serialize + ?Sized>(
		&self,
		key: StorageKey,
		value: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		self.write(&self.full_key(key), value, ttl).await
	}

	/// Removes the value under `key`. Removing an absent key succeeds.
	pub async fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		self.backend.delete(&self.full_key(key)).await
	}

	/// Checks whether a value is stored under `key`.
	pub async fn exists(&self, key: StorageKey) -> Result<bool, StorageError> {
		self.backend.exists(&self.full_key(key)).await
	}

	/// Appends one item to the list under `key`, creating the list if absent.
	///
	/// Returns the length of the list after the append.
	pub async fn append<T>(&self, key: StorageKey, item: T) -> Result<usize, StorageError>
	where
		T: Serialize + DeserializeOwned + Send,
	{
		self.update_collection(key, |items: &mut Vec<T>| {
			items.push(item);
			Ok::<_, StorageError>(items.len())
		})
		.await
	}

	/// Atomically reads, modifies and writes back the list under `key`.
	///
	/// An absent list is presented to `f` as empty. If `f` returns an error the
	/// stored list is left untouched.
	pub async fn update_collection<T, R, E, F>(&self, key: StorageKey, f: F) -> Result<R, E>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce(&mut Vec<T>) -> Result<R, E>,
		E: From<StorageError>,
	{
		let _guard = self.write_lock.lock().await;
		let full_key = self.full_key(key);

		let mut items: Vec<T> = self.read(&full_key).await?.unwrap_or_default();
		let result = f(&mut items)?;
		self.write(&full_key, &items, None).await?;

		Ok(result)
	}

	/// Removes expired entries from storage.
	///
	/// Returns the number of entries that were removed.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.backend.cleanup_expired().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use std::sync::Arc;

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_absent_is_distinct_from_empty() {
		let storage = service();

		let absent: Option<Vec<u32>> = storage.get(StorageKey::Orders).await.unwrap();
		assert!(absent.is_none());
		assert!(!storage.exists(StorageKey::Orders).await.unwrap());

		storage.set(StorageKey::Orders, &Vec::<u32>::new()).await.unwrap();
		let empty: Option<Vec<u32>> = storage.get(StorageKey::Orders).await.unwrap();
		assert_eq!(empty, Some(vec![]));
	}

	#[tokio::test]
	async fn test_set_overwrites_and_remove_clears() {
		let storage = service();

		storage.set(StorageKey::DraftSelection, "first").await.unwrap();
		storage.set(StorageKey::DraftSelection, "second").await.unwrap();
		let value: Option<String> = storage.get(StorageKey::DraftSelection).await.unwrap();
		assert_eq!(value.as_deref(), Some("second"));

		storage.remove(StorageKey::DraftSelection).await.unwrap();
		storage.remove(StorageKey::DraftSelection).await.unwrap();
		let value: Option<String> = storage.get(StorageKey::DraftSelection).await.unwrap();
		assert!(value.is_none());
	}

	#[tokio::test]
	async fn test_concurrent_appends_lose_nothing() {
		let storage = Arc::new(service());

		let mut handles = Vec::new();
		for i in 0..25u32 {
			let storage = storage.clone();
			handles.push(tokio::spawn(async move {
				storage.append(StorageKey::Orders, i).await.unwrap()
			}));
		}
		for handle in handles {
			handle.await.unwrap();
		}

		let mut stored: Vec<u32> = storage.get(StorageKey::Orders).await.unwrap().unwrap();
		stored.sort_unstable();
		assert_eq!(stored, (0..25).collect::<Vec<_>>());
	}

	#[tokio::test]
	async fn test_failed_update_writes_nothing() {
		let storage = service();
		storage.append(StorageKey::Orders, 7u32).await.unwrap();

		let result: Result<(), StorageError> = storage
			.update_collection(StorageKey::Orders, |items: &mut Vec<u32>| {
				items.clear();
				Err(StorageError::Backend("rejected".into()))
			})
			.await;
		assert!(result.is_err());

		let stored: Vec<u32> = storage.get(StorageKey::Orders).await.unwrap().unwrap();
		assert_eq!(stored, vec![7]);
	}

	#[tokio::test]
	async fn test_corrupt_value_is_a_serialization_error() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes("orders", b"not json".to_vec(), None)
			.await
			.unwrap();
		let storage = StorageService::new(Box::new(backend));

		let result: Result<Option<Vec<u32>>, _> = storage.get(StorageKey::Orders).await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}

	#[tokio::test]
	async fn test_namespace_prefixes_keys() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes("orders", b"[1]".to_vec(), None)
			.await
			.unwrap();
		let storage = StorageService::new(Box::new(backend)).with_namespace("buyer-42");

		let value: Option<Vec<u32>> = storage.get(StorageKey::Orders).await.unwrap();
		assert!(value.is_none());

		storage.append(StorageKey::Orders, 2u32).await.unwrap();
		let value: Option<Vec<u32>> = storage.get(StorageKey::Orders).await.unwrap();
		assert_eq!(value, Some(vec![2]));
	}

	#[test]
	fn test_registry_lists_both_backends() {
		let names: Vec<&str> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert!(names.contains(&"file"));
		assert!(names.contains(&"memory"));
	}
}
