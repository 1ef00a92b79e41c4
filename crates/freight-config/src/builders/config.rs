//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{
	ApiConfig, CacheConfig, CarriersConfig, Config, DistanceServiceConfig, EngineConfig,
	ZonesConfig,
};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Provides an easy way to create test configurations with sensible defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	engine_id: String,
	monitoring_timeout_minutes: u64,
	fanout_batch_size: usize,
	cache_primary: String,
	cache_cleanup_interval_seconds: u64,
	quote_ttl_seconds: u64,
	master_pincode_file: String,
	utsf_directory: String,
	fallback_vendor_ids: Vec<String>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			engine_id: "test-engine".to_string(),
			monitoring_timeout_minutes: 1,
			fanout_batch_size: 8,
			cache_primary: "memory".to_string(),
			cache_cleanup_interval_seconds: 60,
			quote_ttl_seconds: 300,
			master_pincode_file: "data/pincodes.json".to_string(),
			utsf_directory: "data/carriers".to_string(),
			fallback_vendor_ids: Vec::new(),
			api: None,
		}
	}

	/// Sets the engine ID.
	pub fn engine_id(mut self, id: String) -> Self {
		self.engine_id = id;
		self
	}

	/// Sets the monitoring timeout in minutes.
	pub fn monitoring_timeout_minutes(mut self, timeout: u64) -> Self {
		self.monitoring_timeout_minutes = timeout;
		self
	}

	/// Sets the per-request carrier fan-out batch size.
	pub fn fanout_batch_size(mut self, size: usize) -> Self {
		self.fanout_batch_size = size;
		self
	}

	/// Sets the primary cache implementation.
	pub fn cache_primary(mut self, primary: String) -> Self {
		self.cache_primary = primary;
		self
	}

	/// Sets the cache cleanup interval in seconds.
	pub fn cache_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.cache_cleanup_interval_seconds = interval;
		self
	}

	/// Sets the quote result TTL in seconds.
	pub fn quote_ttl_seconds(mut self, ttl: u64) -> Self {
		self.quote_ttl_seconds = ttl;
		self
	}

	/// Sets the master pincode file path.
	pub fn master_pincode_file(mut self, path: String) -> Self {
		self.master_pincode_file = path;
		self
	}

	/// Sets the UTSF carrier directory path.
	pub fn utsf_directory(mut self, path: String) -> Self {
		self.utsf_directory = path;
		self
	}

	/// Sets the fallback vendor IDs.
	pub fn fallback_vendor_ids(mut self, ids: Vec<String>) -> Self {
		self.fallback_vendor_ids = ids;
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let mut cache_implementations = HashMap::new();
		cache_implementations.insert(self.cache_primary.clone(), toml::Value::Table(Default::default()));

		Config {
			engine: EngineConfig {
				id: self.engine_id,
				monitoring_timeout_minutes: self.monitoring_timeout_minutes,
				fanout_batch_size: self.fanout_batch_size,
			},
			cache: CacheConfig {
				primary: self.cache_primary,
				implementations: cache_implementations,
				cleanup_interval_seconds: self.cache_cleanup_interval_seconds,
				quote_ttl_seconds: self.quote_ttl_seconds,
			},
			zones: ZonesConfig {
				master_pincode_file: self.master_pincode_file,
			},
			carriers: CarriersConfig {
				utsf_directory: self.utsf_directory,
				db_sources: HashMap::new(),
				fallback_vendor_ids: self.fallback_vendor_ids,
			},
			distance_service: DistanceServiceConfig {
				enabled: false,
				base_url: None,
				api_key_env: None,
				timeout_seconds: 5,
			},
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builds_sensible_defaults() {
		let config = ConfigBuilder::new().build();
		assert_eq!(config.engine.id, "test-engine");
		assert_eq!(config.cache.primary, "memory");
		assert!(config.cache.implementations.contains_key("memory"));
	}

	#[test]
	fn fluent_overrides_apply() {
		let config = ConfigBuilder::new()
			.engine_id("custom".to_string())
			.fanout_batch_size(4)
			.build();
		assert_eq!(config.engine.id, "custom");
		assert_eq!(config.engine.fanout_batch_size, 4);
	}
}
