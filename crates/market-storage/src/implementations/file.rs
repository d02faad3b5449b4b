//! File-backed Record Store.
//!
//! Each key is stored as one file under the configured directory. Files start
//! with a fixed-size header carrying an optional expiry, and every write goes
//! through a temporary file followed by a rename so a crash never leaves a
//! half-written order list behind.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use market_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StorageKey, ValidationError,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

const DEFAULT_STORAGE_PATH: &str = "./data/market";

fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size file header for TTL support.
///
/// Binary layout (64 bytes total):
/// - [0-3]: Magic bytes "MKTS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-63]: Reserved
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"MKTS";
	const VERSION: u16 = 1;
	const SIZE: usize = 64;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			unix_now().saturating_add(ttl.as_secs())
		};

		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Missing file header".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && unix_now() >= self.expires_at
	}
}

/// Per-key TTLs read from `ttl_<key>` settings. Only transient keys may
/// expire; keys without a setting never do.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	fn from_config(config: &toml::Value) -> Self {
		let ttls = StorageKey::all()
			.filter(StorageKey::is_transient)
			.filter_map(|key| {
				config
					.get(format!("ttl_{}", key.as_str()))
					.and_then(|v| v.as_integer())
					.and_then(|secs| u64::try_from(secs).ok())
					.map(|secs| (key, Duration::from_secs(secs)))
			})
			.collect();

		Self { ttls }
	}

	fn get_ttl(&self, key: StorageKey) -> Duration {
		self.ttls.get(&key).copied().unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	/// Maps a key such as `"buyer-42:orders"` to `<base>/buyer-42%3Aorders.bin`.
	///
	/// Separators are percent-encoded so distinct keys never share a file.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let mut safe_key = String::with_capacity(key.len());
		for c in key.chars() {
			match c {
				'%' => safe_key.push_str("%25"),
				'/' => safe_key.push_str("%2F"),
				'\\' => safe_key.push_str("%5C"),
				':' => safe_key.push_str("%3A"),
				c => safe_key.push(c),
			}
		}
		self.base_path.join(format!("{}.bin", safe_key))
	}

	/// The bucket a key belongs to, read from its last segment after any namespace.
	fn storage_key(key: &str) -> Option<StorageKey> {
		key.rsplit(':').next().and_then(|name| name.parse().ok())
	}

	fn get_ttl_for_key(&self, key: &str) -> Duration {
		Self::storage_key(key)
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	async fn read_live(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		let data = match fs::read(self.get_file_path(key)).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Ok(None);
		}
		Ok(Some(data[FileHeader::SIZE..].to_vec()))
	}

	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut removed = 0;
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}

			let data = match fs::read(&path).await {
				Ok(data) => data,
				Err(e) => {
					tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
					continue;
				},
			};

			match FileHeader::deserialize(&data) {
				Ok(header) if header.is_expired() => match fs::remove_file(&path).await {
					Ok(()) => removed += 1,
					Err(e) => tracing::warn!("Failed to remove expired file {:?}: {}", path, e),
				},
				Ok(_) => {},
				Err(e) => tracing::debug!("Skipping file {:?}: {}", path, e),
			}
		}

		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.read_live(key).await?.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Durable buckets never expire, whatever the caller asks for.
		let ttl = match Self::storage_key(key) {
			Some(sk) if !sk.is_transient() => Duration::ZERO,
			_ => ttl.unwrap_or_else(|| self.get_ttl_for_key(key)),
		};
		let header = FileHeader::new(ttl);

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.get_file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.read_live(key).await?.is_some())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)];
		optional_fields.extend(
			StorageKey::all()
				.filter(StorageKey::is_transient)
				.map(|key| {
					Field::new(
						format!("ttl_{}", key.as_str()),
						FieldType::Integer {
							min: Some(0),
							max: None,
						},
					)
				}),
		);

		for key in StorageKey::all().filter(|key| !key.is_transient()) {
			let name = format!("ttl_{}", key.as_str());
			if config.get(&name).is_some() {
				return Err(ValidationError::InvalidValue {
					field: name,
					message: "durable data cannot expire".to_string(),
				});
			}
		}

		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: "./data/market")
/// - `ttl_draft_selection`, `ttl_draft_delivery`: seconds, 0 = never expire
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn storage_in(dir: &TempDir, ttl_config: TtlConfig) -> FileStorage {
		FileStorage::new(dir.path().to_path_buf(), ttl_config)
	}

	async fn write_with_expiry(storage: &FileStorage, key: &str, expires_at: u64) {
		let header = FileHeader {
			version: FileHeader::VERSION,
			expires_at,
		};
		let mut data = header.serialize().to_vec();
		data.extend_from_slice(b"[]");
		fs::write(storage.get_file_path(key), data).await.unwrap();
	}

	#[test]
	fn test_header_layout() {
		let header = FileHeader {
			version: 1,
			expires_at: 1_700_000_000,
		};
		let bytes = header.serialize();
		assert_eq!(&bytes[0..4], b"MKTS");
		assert_eq!(FileHeader::deserialize(&bytes).unwrap(), header);
		assert!(FileHeader::deserialize(&bytes[..10]).is_err());
		assert!(FileHeader::deserialize(&[0u8; 64]).is_err());
	}

	#[tokio::test]
	async fn test_roundtrip_and_delete() {
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir, TtlConfig::default());

		storage
			.set_bytes("buyer-1:orders", b"[1,2]".to_vec(), None)
			.await
			.unwrap();
		assert!(dir.path().join("buyer-1%3Aorders.bin").exists());
		assert_eq!(storage.get_bytes("buyer-1:orders").await.unwrap(), b"[1,2]");
		assert!(storage.exists("buyer-1:orders").await.unwrap());

		storage.delete("buyer-1:orders").await.unwrap();
		storage.delete("buyer-1:orders").await.unwrap();
		assert!(matches!(
			storage.get_bytes("buyer-1:orders").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_expired_entries_are_hidden_and_cleaned() {
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir, TtlConfig::default());

		write_with_expiry(&storage, "draft_selection", 1).await;
		write_with_expiry(&storage, "orders", 0).await;

		assert!(!storage.exists("draft_selection").await.unwrap());
		assert!(matches!(
			storage.get_bytes("draft_selection").await,
			Err(StorageError::NotFound)
		));

		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert!(!dir.path().join("draft_selection.bin").exists());
		assert!(dir.path().join("orders.bin").exists());
	}

	#[tokio::test]
	async fn test_ttl_is_taken_from_key_after_namespace() {
		let config: toml::Value = toml::from_str("ttl_draft_delivery = 3600").unwrap();
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir, TtlConfig::from_config(&config));

		assert_eq!(
			storage.get_ttl_for_key("buyer-7:draft_delivery"),
			Duration::from_secs(3600)
		);
		assert_eq!(storage.get_ttl_for_key("orders"), Duration::ZERO);
		assert_eq!(storage.get_ttl_for_key("unknown"), Duration::ZERO);

		storage
			.set_bytes("buyer-7:draft_delivery", b"{}".to_vec(), None)
			.await
			.unwrap();
		let data = fs::read(dir.path().join("buyer-7%3Adraft_delivery.bin"))
			.await
			.unwrap();
		let header = FileHeader::deserialize(&data).unwrap();
		assert!(header.expires_at > unix_now());
	}

	#[tokio::test]
	async fn test_cleanup_on_missing_directory() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().join("absent"), TtlConfig::default());
		assert_eq!(storage.cleanup_expired().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_orders_never_expire() {
		let config: toml::Value =
			toml::from_str("ttl_orders = 1\nttl_draft_selection = 1").unwrap();
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir, TtlConfig::from_config(&config));
		assert_eq!(storage.get_ttl_for_key("buyer-7:orders"), Duration::ZERO);

		storage
			.set_bytes("buyer-7:orders", b"[123456]".to_vec(), None)
			.await
			.unwrap();
		storage
			.set_bytes("orders", b"[654321]".to_vec(), Some(Duration::from_secs(1)))
			.await
			.unwrap();
		for file in ["buyer-7%3Aorders.bin", "orders.bin"] {
			let data = fs::read(dir.path().join(file)).await.unwrap();
			assert_eq!(FileHeader::deserialize(&data).unwrap().expires_at, 0);
		}

		write_with_expiry(&storage, "buyer-7:draft_selection", 1).await;
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert_eq!(
			storage.get_bytes("buyer-7:orders").await.unwrap(),
			b"[123456]"
		);
		assert_eq!(storage.get_bytes("orders").await.unwrap(), b"[654321]");
	}

	#[tokio::test]
	async fn test_namespaces_with_separators_do_not_collide() {
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir, TtlConfig::default());

		storage
			.set_bytes("buyer:42:orders", b"[1]".to_vec(), None)
			.await
			.unwrap();
		storage
			.set_bytes("buyer_42:orders", b"[2]".to_vec(), None)
			.await
			.unwrap();
		storage
			.set_bytes("a/b%3A:orders", b"[3]".to_vec(), None)
			.await
			.unwrap();

		assert_eq!(storage.get_bytes("buyer:42:orders").await.unwrap(), b"[1]");
		assert_eq!(storage.get_bytes("buyer_42:orders").await.unwrap(), b"[2]");
		assert_eq!(storage.get_bytes("a/b%3A:orders").await.unwrap(), b"[3]");
		assert!(dir.path().join("a%2Fb%253A%3Aorders.bin").exists());
	}

	#[test]
	fn test_schema_rejects_negative_ttl() {
		let bad: toml::Value = toml::from_str("ttl_draft_selection = -1").unwrap();
		assert!(FileStorageSchema.validate(&bad).is_err());
		assert!(matches!(
			create_storage(&bad),
			Err(StorageError::Configuration(_))
		));

		let good: toml::Value =
			toml::from_str("storage_path = \"/tmp/market\"\nttl_draft_selection = 0").unwrap();
		assert!(create_storage(&good).is_ok());

		let durable: toml::Value = toml::from_str("ttl_orders = 0").unwrap();
		assert!(matches!(
			create_storage(&durable),
			Err(StorageError::Configuration(msg)) if msg.contains("ttl_orders")
		));
	}
}
