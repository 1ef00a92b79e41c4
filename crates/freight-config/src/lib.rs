//! Configuration module for the freight quoting engine.
//!
//! This module provides structures and utilities for managing engine configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

pub mod builders;
pub mod loader;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the freight quoting engine.
///
/// This structure contains all configuration sections required for the engine
/// to operate: engine identity, geographic indexes, carrier sources, result
/// cache, the optional distance service, and the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to the engine instance.
	pub engine: EngineConfig,
	/// Configuration for the result cache.
	pub cache: CacheConfig,
	/// Configuration for the zone and centroid indexes.
	pub zones: ZonesConfig,
	/// Configuration for carrier sources (UTSF files and the database fallback).
	pub carriers: CarriersConfig,
	/// Configuration for the distance service used by the nearest-pincode finder.
	pub distance_service: DistanceServiceConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the engine instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
	/// Unique identifier for this engine instance.
	pub id: String,
	/// Timeout duration in minutes for a single quote request.
	/// Defaults to 1 minute if not specified.
	#[serde(default = "default_monitoring_timeout_minutes")]
	pub monitoring_timeout_minutes: u64,
	/// Maximum number of carriers quoted concurrently per request.
	#[serde(default = "default_fanout_batch_size")]
	pub fanout_batch_size: usize,
}

/// Returns the default monitoring timeout in minutes.
fn default_monitoring_timeout_minutes() -> u64 {
	1
}

/// Returns the default bounded fan-out batch size for per-carrier pricing.
fn default_fanout_batch_size() -> usize {
	8
}

/// Configuration for the result cache backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
	/// Which implementation to use as primary (e.g. "memory", "file").
	pub primary: String,
	/// Map of cache implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for sweeping TTL-expired cache entries.
	pub cleanup_interval_seconds: u64,
	/// Time-to-live in seconds for a cached quote result.
	#[serde(default = "default_quote_ttl_seconds")]
	pub quote_ttl_seconds: u64,
}

/// Returns the default quote cache TTL in seconds.
fn default_quote_ttl_seconds() -> u64 {
	300
}

/// Configuration for the zone and centroid indexes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZonesConfig {
	/// Path to the master pincode file (pincode, zone, latitude, longitude records).
	pub master_pincode_file: String,
}

/// Configuration for carrier sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CarriersConfig {
	/// Directory containing `*.utsf.json` carrier files.
	pub utsf_directory: String,
	/// Map of database-backed carrier source names to their configurations.
	pub db_sources: HashMap<String, toml::Value>,
	/// Carrier IDs that are always eligible regardless of UTSF/DB approval status,
	/// used as a last-resort fallback when no carrier otherwise services a route.
	#[serde(default)]
	pub fallback_vendor_ids: Vec<String>,
}

/// Configuration for the distance service used by the nearest-pincode finder.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DistanceServiceConfig {
	/// Whether an external distance service is configured.
	#[serde(default)]
	pub enabled: bool,
	/// Base URL of the distance service, if enabled.
	pub base_url: Option<String>,
	/// Name of the environment variable holding the distance service's API key.
	/// Resolved at startup rather than stored directly in the config file.
	pub api_key_env: Option<String>,
	/// Request timeout in seconds.
	#[serde(default = "default_distance_timeout_seconds")]
	pub timeout_seconds: u64,
}

fn default_distance_timeout_seconds() -> u64 {
	5
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Rate limiting configuration.
	pub rate_limiting: Option<RateLimitConfig>,
	/// CORS configuration.
	pub cors: Option<CorsConfig>,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
	/// Maximum requests per minute per IP.
	pub requests_per_minute: u32,
	/// Burst allowance for requests.
	pub burst_size: u32,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
	/// Allowed headers for CORS.
	pub allowed_headers: Vec<String>,
	/// Allowed methods for CORS.
	pub allowed_methods: Vec<String>,
}

/// Returns the default API host.
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	3000
}

/// Returns the default API timeout in seconds.
fn default_api_timeout() -> u64 {
	30
}

/// Returns the default maximum request size in bytes.
fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Limit input size to prevent ReDoS attacks
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			}
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file at the specified path.
	///
	/// This method reads the file content, resolves environment variables,
	/// and parses it as TOML configuration. The configuration is validated
	/// before being returned.
	///
	/// Environment variables can be referenced using:
	/// - `${VAR_NAME}` - Required environment variable
	/// - `${VAR_NAME:-default}` - With default value if not set
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		let resolved = resolve_env_vars(&content)?;
		resolved.parse()
	}

	/// Loads configuration from a file with async environment variable resolution.
	///
	/// This method is async-ready for future extensions that might need
	/// async secret resolution (e.g., from Vault, AWS KMS, etc).
	pub async fn from_file_async(path: &str) -> Result<Self, ConfigError> {
		Self::from_file(path)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		// Validate engine config
		if self.engine.id.is_empty() {
			return Err(ConfigError::Validation("Engine ID cannot be empty".into()));
		}
		if self.engine.fanout_batch_size == 0 {
			return Err(ConfigError::Validation(
				"Engine fanout_batch_size must be greater than 0".into(),
			));
		}

		// Validate zones config
		if self.zones.master_pincode_file.is_empty() {
			return Err(ConfigError::Validation(
				"Zones master_pincode_file cannot be empty".into(),
			));
		}

		// Validate cache config
		if self.cache.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one cache implementation must be configured".into(),
			));
		}
		if self.cache.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Cache primary implementation cannot be empty".into(),
			));
		}
		if !self.cache.implementations.contains_key(&self.cache.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary cache '{}' not found in implementations",
				self.cache.primary
			)));
		}
		if self.cache.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Cache cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.cache.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Cache cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}
		if self.cache.quote_ttl_seconds == 0 {
			return Err(ConfigError::Validation(
				"Cache quote_ttl_seconds must be greater than 0".into(),
			));
		}

		// Validate carriers config
		if self.carriers.utsf_directory.is_empty() {
			return Err(ConfigError::Validation(
				"Carriers utsf_directory cannot be empty".into(),
			));
		}

		// Validate distance service config
		if self.distance_service.enabled && self.distance_service.base_url.is_none() {
			return Err(ConfigError::Validation(
				"distance_service.base_url is required when distance_service.enabled is true".into(),
			));
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// This allows configuration to be parsed from TOML strings using the standard
/// string parsing interface. Environment variables are resolved and the
/// configuration is automatically validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TEST_HOST", "localhost");
		std::env::set_var("TEST_PORT", "5432");

		let input = "host = \"${TEST_HOST}:${TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("TEST_HOST");
		std::env::remove_var("TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("MISSING_VAR"));
	}

	fn sample_config_str() -> &'static str {
		r#"
[engine]
id = "test-engine"
monitoring_timeout_minutes = 1
fanout_batch_size = 8

[cache]
primary = "memory"
cleanup_interval_seconds = 60
quote_ttl_seconds = 300
[cache.implementations.memory]

[zones]
master_pincode_file = "data/pincodes.json"

[carriers]
utsf_directory = "data/carriers"
fallback_vendor_ids = ["wheelseye", "local-ftl"]
[carriers.db_sources.primary]

[distance_service]
enabled = false
"#
	}

	#[test]
	fn test_config_parses_and_validates() {
		let config: Config = sample_config_str().parse().unwrap();
		assert_eq!(config.engine.id, "test-engine");
		assert_eq!(config.cache.quote_ttl_seconds, 300);
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("TEST_ENGINE_ID", "engine-from-env");

		let config_str = sample_config_str().replace("test-engine", "${TEST_ENGINE_ID}");
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.engine.id, "engine-from-env");

		std::env::remove_var("TEST_ENGINE_ID");
	}

	#[test]
	fn test_rejects_empty_engine_id() {
		let config_str = sample_config_str().replace("test-engine", "");
		let result: Result<Config, _> = config_str.parse();
		assert!(result.is_err());
	}

	#[test]
	fn test_rejects_unconfigured_primary_cache() {
		let config_str = sample_config_str().replace(r#"primary = "memory""#, r#"primary = "redis""#);
		let result: Result<Config, _> = config_str.parse();
		assert!(result.is_err());
	}
}
