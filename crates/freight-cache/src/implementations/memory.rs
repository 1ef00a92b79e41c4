//! In-memory cache backend implementation for the freight quoting engine.
//!
//! This module provides a memory-based implementation of the StorageInterface trait,
//! useful for testing and single-process deployments where persistence across
//! restarts is not required but TTL-based expiry still must be honoured.

use crate::{QueryFilter, StorageError, StorageIndexes, StorageInterface};
use async_trait::async_trait;
use freight_types::{ConfigSchema, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// A stored value paired with its optional expiry instant.
struct Entry {
	value: Vec<u8>,
	expires_at: Option<u64>,
}

impl Entry {
	fn is_expired(&self) -> bool {
		match self.expires_at {
			Some(expires_at) => now_secs() >= expires_at,
			None => false,
		}
	}
}

fn now_secs() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// In-memory cache implementation.
///
/// Stores data in a HashMap guarded by a read-write lock. Indexes are ignored
/// (querying always returns empty), but TTL is enforced: reads of an expired
/// key behave as if the key were never set, and `cleanup_expired` actually
/// sweeps expired entries rather than being a no-op.
pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self { store: Arc::new(RwLock::new(HashMap::new())) }
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		match store.get(key) {
			Some(entry) if !entry.is_expired() => Ok(entry.value.clone()),
			_ => Err(StorageError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		_indexes: Option<StorageIndexes>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		// Indexes are ignored for memory storage; querying is not meaningful here.
		let expires_at = ttl.filter(|d| !d.is_zero()).map(|d| now_secs().saturating_add(d.as_secs()));
		let mut store = self.store.write().await;
		store.insert(key.to_string(), Entry { value, expires_at });
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.get(key).is_some_and(|e| !e.is_expired()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn query(&self, _namespace: &str, _filter: QueryFilter) -> Result<Vec<String>, StorageError> {
		// Memory storage keeps no indexes, so querying is not meaningful.
		Ok(Vec::new())
	}

	async fn get_batch(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let store = self.store.read().await;
		let mut results = Vec::new();

		for key in keys {
			if let Some(entry) = store.get(key) {
				if !entry.is_expired() {
					results.push((key.clone(), entry.value.clone()));
				}
			}
		}

		Ok(results)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let mut store = self.store.write().await;
		let before = store.len();
		store.retain(|_, entry| !entry.is_expired());
		Ok(before - store.len())
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl MemoryStorageSchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		let instance = Self;
		instance.validate(config)
	}
}

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Factory function to create a memory cache backend from configuration.
///
/// Configuration parameters:
/// - None required for memory storage
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema::validate_config(config)
		.map_err(|e| StorageError::Configuration(format!("Invalid configuration: {}", e)))?;

	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory cache implementation.
pub struct Registry;

impl freight_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "test_key";
		let value = b"test_value".to_vec();
		storage.set_bytes(key, value.clone(), None, None).await.unwrap();

		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved, value);

		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());

		let result = storage.get_bytes(key).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_overwrite() {
		let storage = MemoryStorage::new();

		let key = "overwrite_key";
		let value1 = b"value1".to_vec();
		let value2 = b"value2".to_vec();

		storage.set_bytes(key, value1.clone(), None, None).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), value1);

		storage.set_bytes(key, value2.clone(), None, None).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), value2);
	}

	#[tokio::test]
	async fn test_ttl_expiry_makes_key_unreadable() {
		let storage = MemoryStorage::new();
		let key = "short_lived";

		storage
			.set_bytes(key, b"v".to_vec(), None, Some(Duration::from_secs(0)))
			.await
			.unwrap();
		// A zero-duration TTL is treated as "no expiry" (matching the file backend's
		// convention where 0 means permanent), so this key should still be present.
		assert!(storage.exists(key).await.unwrap());

		// Directly age an entry by writing one with an already-past expiry.
		{
			let mut store = storage.store.write().await;
			store.insert(key.to_string(), Entry { value: b"v".to_vec(), expires_at: Some(1) });
		}
		assert!(!storage.exists(key).await.unwrap());
		assert!(matches!(storage.get_bytes(key).await, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_cleanup_expired_sweeps_stale_entries() {
		let storage = MemoryStorage::new();
		{
			let mut store = storage.store.write().await;
			store.insert("stale".to_string(), Entry { value: b"v".to_vec(), expires_at: Some(1) });
			store.insert("fresh".to_string(), Entry { value: b"v".to_vec(), expires_at: None });
		}
		let removed = storage.cleanup_expired().await.unwrap();
		assert_eq!(removed, 1);
		assert!(storage.exists("fresh").await.unwrap());
	}
}
