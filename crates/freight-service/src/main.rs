//! Main entry point for the freight quoting service.
//!
//! This binary loads geographic indexes and carrier catalogs, wires the
//! `QuoteEngine`, and (if configured) serves the HTTP API alongside a
//! background cache-cleanup task.

use clap::Parser;
use freight_cache::{StorageFactory, StorageInterface, StorageService};
use freight_carriers::{CacheBackedCarrierSource, DbCarrierSource, UTSFRegistry};
use freight_config::{CacheConfig, Config};
use freight_engine::{HaversineDistanceService, HttpDistanceService, NullDistanceService, QuoteEngine};
use freight_zones::{CentroidIndex, ZoneIndex};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod server;

/// Command-line arguments for the freight quoting service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Everything the running service needs: the quote engine plus the pieces
/// the HTTP layer reaches into directly for the admin endpoints.
pub struct AppEngine {
	pub quotes: QuoteEngine,
	pub utsf: Arc<UTSFRegistry>,
	pub zones: Arc<ZoneIndex>,
	pub centroids: Arc<CentroidIndex>,
	pub db: Arc<dyn DbCarrierSource>,
	pub cache: Arc<StorageService>,
}

/// Main entry point for the freight quoting service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the `QuoteEngine` with its geographic indexes and carrier sources
/// 5. Runs the cache cleanup loop and (if enabled) the API server until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started freight quoting service");

	// Load configuration
	let config = Config::from_file(args.config.to_str().unwrap())?;
	tracing::info!("Loaded configuration [{}]", config.engine.id);

	// Build the quote engine and everything it's wired from
	let engine = Arc::new(build_engine(&config).await?);
	tracing::info!("Loaded quote engine");

	let cleanup_task = spawn_cleanup_task(Arc::clone(&engine.cache), config.cache.cleanup_interval_seconds);

	let api_enabled = config.api.as_ref().is_some_and(|api| api.enabled);

	if api_enabled {
		let api_config = config.api.as_ref().unwrap().clone();
		let api_engine = Arc::clone(&engine);

		let api_task = server::start_server(api_config, api_engine);

		tracing::info!("Starting API server");

		tokio::select! {
			result = api_task => {
				tracing::info!("API server finished");
				result?;
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Received shutdown signal");
			}
		}
	} else {
		tracing::info!("API server disabled; running until interrupted");
		tokio::signal::ctrl_c().await?;
	}

	cleanup_task.abort();
	tracing::info!("Stopped freight quoting service");
	Ok(())
}

/// Builds every dependency the engine needs, picking concrete storage
/// backends by name from `config` exactly as the teacher's `build_solver`
/// wires a named implementation per pluggable component.
async fn build_engine(config: &Config) -> Result<AppEngine, Box<dyn std::error::Error>> {
	let zones = Arc::new(ZoneIndex::load(&config.zones.master_pincode_file)?);
	let centroids = Arc::new(CentroidIndex::load(&config.zones.master_pincode_file)?);

	let utsf = Arc::new(UTSFRegistry::load_dir(&config.carriers.utsf_directory, Arc::clone(&zones)).await?);

	let db_store = build_carrier_store(&config.carriers.db_sources)?;
	let db: Arc<dyn DbCarrierSource> = Arc::new(CacheBackedCarrierSource::new(db_store));

	let cache = Arc::new(StorageService::new(build_cache_backend(&config.cache)?));

	let distance = build_distance_service(config, Arc::clone(&centroids));

	let quotes = QuoteEngine::new(
		Arc::clone(&utsf),
		Arc::clone(&db),
		Arc::clone(&zones),
		Arc::clone(&centroids),
		distance,
		Arc::clone(&cache),
		std::time::Duration::from_secs(config.cache.quote_ttl_seconds),
		config.engine.fanout_batch_size,
	);

	Ok(AppEngine { quotes, utsf, zones, centroids, db, cache })
}

fn registered_storage_factories() -> HashMap<&'static str, StorageFactory> {
	freight_cache::get_all_implementations().into_iter().collect()
}

/// Picks the registered storage factory matching `cache.primary` and
/// constructs it from its own entry in `cache.implementations`.
fn build_cache_backend(cache: &CacheConfig) -> Result<Box<dyn StorageInterface>, Box<dyn std::error::Error>> {
	let registered = registered_storage_factories();
	let factory = registered.get(cache.primary.as_str()).ok_or_else(|| -> Box<dyn std::error::Error> {
		format!("unknown cache implementation '{}'; available: {:?}", cache.primary, registered.keys()).into()
	})?;
	let empty = toml::Value::Table(Default::default());
	let entry = cache.implementations.get(&cache.primary).unwrap_or(&empty);
	Ok(factory(entry)?)
}

/// The carrier document store is configured the same way as the result
/// cache — a map of named backend configs — but without a distinguished
/// "primary" field, since a route only ever needs the one configured entry.
fn build_carrier_store(db_sources: &HashMap<String, toml::Value>) -> Result<StorageService, Box<dyn std::error::Error>> {
	let registered = registered_storage_factories();
	let (name, entry) = match db_sources.iter().next() {
		Some((name, entry)) => (name.as_str(), entry.clone()),
		None => ("memory", toml::Value::Table(Default::default())),
	};
	let factory = registered.get(name).ok_or_else(|| -> Box<dyn std::error::Error> {
		format!("unknown carrier db_sources implementation '{name}'; available: {:?}", registered.keys()).into()
	})?;
	Ok(StorageService::new(factory(&entry)?))
}

/// Chooses the distance service implementation: the configured HTTP API when
/// enabled and an API key is resolvable, a haversine-estimate fallback when
/// centroid data is loaded, or a service that always reports "not found".
fn build_distance_service(config: &Config, centroids: Arc<CentroidIndex>) -> Arc<dyn freight_engine::DistanceService> {
	if config.distance_service.enabled {
		let api_key = config
			.distance_service
			.api_key_env
			.as_ref()
			.and_then(|var| std::env::var(var).ok())
			.unwrap_or_default();
		let base_url = config.distance_service.base_url.clone().unwrap_or_default();
		if !api_key.is_empty() && !base_url.is_empty() {
			return Arc::new(HttpDistanceService::new(
				base_url,
				api_key,
				std::time::Duration::from_secs(config.distance_service.timeout_seconds),
			));
		}
		tracing::warn!("distance service enabled but base_url/API key unresolved; falling back to haversine estimates");
	}

	if !centroids.is_empty() {
		Arc::new(HaversineDistanceService::new(centroids))
	} else {
		Arc::new(NullDistanceService)
	}
}

/// Sweeps TTL-expired result-cache entries on a fixed interval, mirroring the
/// teacher's background storage-cleanup task spawned alongside the solver loop.
fn spawn_cleanup_task(cache: Arc<StorageService>, interval_seconds: u64) -> tokio::task::JoinHandle<()> {
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_seconds.max(1)));
		loop {
			interval.tick().await;
			match cache.cleanup_expired().await {
				Ok(removed) if removed > 0 => tracing::debug!(removed, "swept expired cache entries"),
				Ok(_) => {}
				Err(err) => tracing::warn!(error = %err, "cache cleanup sweep failed"),
			}
		}
	})
}
