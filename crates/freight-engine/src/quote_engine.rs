//! `QuoteEngine`: the top-level per-request orchestration described in the
//! core pricing flow — validate, check cache, resolve distance and zones,
//! fetch carriers, fan out to `FreightCalculator` in bounded batches, merge,
//! run `SmartShield`, and write back to cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use freight_cache::StorageService;
use freight_carriers::{resolve, DbCarrierSource, UTSFRegistry};
use freight_pricing::RouteContext;
use freight_types::api::{CalculateRequest, CalculateResponse};
use freight_types::carrier::Carrier;
use freight_types::domain::{Pincode, Zone};
use freight_types::quote::{Quote, QuoteSource};
use freight_types::shipment::VolumetricWeights;
use freight_zones::{CentroidIndex, ZoneIndex};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::cache_key;
use crate::distance::DistanceService;
use crate::error::EngineError;
use crate::smart_shield;
use crate::validate;

const CACHE_NAMESPACE: &str = "calc";

/// Everything `QuoteEngine` needs to serve a request, wired once at startup.
pub struct QuoteEngine {
	utsf: Arc<UTSFRegistry>,
	db: Arc<dyn DbCarrierSource>,
	zones: Arc<ZoneIndex>,
	// Retained so callers building a `NearestPincodeFinder` against the same
	// engine don't need to thread the centroid index separately.
	centroids: Arc<CentroidIndex>,
	distance: Arc<dyn DistanceService>,
	cache: Arc<StorageService>,
	cache_ttl: Duration,
	fanout_batch_size: usize,
	fanout_semaphore: Arc<Semaphore>,
}

impl QuoteEngine {
	pub fn new(
		utsf: Arc<UTSFRegistry>,
		db: Arc<dyn DbCarrierSource>,
		zones: Arc<ZoneIndex>,
		centroids: Arc<CentroidIndex>,
		distance: Arc<dyn DistanceService>,
		cache: Arc<StorageService>,
		cache_ttl: Duration,
		fanout_batch_size: usize,
	) -> Self {
		Self {
			utsf,
			db,
			zones,
			centroids,
			distance,
			cache,
			cache_ttl,
			fanout_batch_size: fanout_batch_size.max(1),
			fanout_semaphore: Arc::new(Semaphore::new(fanout_batch_size.max(1))),
		}
	}

	pub fn centroids(&self) -> &Arc<CentroidIndex> {
		&self.centroids
	}

	pub fn utsf(&self) -> &Arc<UTSFRegistry> {
		&self.utsf
	}

	pub fn db(&self) -> &Arc<dyn DbCarrierSource> {
		&self.db
	}

	pub fn zones(&self) -> &Arc<ZoneIndex> {
		&self.zones
	}

	/// Runs the full 13-step pricing flow for one `POST /calculate` request.
	///
	/// Per-carrier failures never escape this function: they are logged and
	/// the offending carrier is dropped from its result list. Only failures
	/// that prevent the request from being processed at all (bad input,
	/// unknown zone, distance-service failure) surface as `Err`.
	pub async fn calculate(&self, request: CalculateRequest) -> Result<CalculateResponse, EngineError> {
		validate::validate(&request)?;

		let key = cache_key::build(&request);
		if let Some(mut cached) = self.read_cache(&key).await {
			cached.from_cache = true;
			return Ok(cached);
		}

		let origin = Pincode::new(request.shipment.origin_pincode.clone());
		let destination = Pincode::new(request.shipment.destination_pincode.clone());

		let distance = self.distance.compute_route_distance(&origin, &destination).await?;

		let origin_zone = self
			.zones
			.zone_of(&origin)
			.cloned()
			.ok_or_else(|| EngineError::OriginZoneUnknown(origin.as_str().to_string()))?;
		let destination_zone = self
			.zones
			.zone_of(&destination)
			.cloned()
			.ok_or_else(|| EngineError::DestinationZoneUnknown(destination.as_str().to_string()))?;

		let (utsf_carriers, db_carriers) = self.fetch_carriers(&request.owner_customer_id, &origin, &destination).await?;
		let utsf_ids: HashSet<String> = utsf_carriers.iter().map(|c| c.id.clone()).collect();

		let resolved = resolve(&request.owner_customer_id, utsf_carriers, db_carriers);
		let carriers_considered = resolved.tied_up.len() + resolved.public.len();

		let volumetric_weights = VolumetricWeights::compute(&request.shipment);
		let actual_weight_kg = request.shipment.total_actual_weight_kg();

		// Tied-up carriers are always drawn from the UTSF catalog (the resolver
		// never assigns a DB carrier to the tied-up lane), so their source is
		// always UTSF. Public carriers are a mix; membership in `utsf_ids`
		// tells us which.
		let mut tied_up_result = self
			.price_carriers(
				resolved.tied_up,
				&origin,
				&destination,
				&origin_zone,
				&destination_zone,
				actual_weight_kg,
				&volumetric_weights,
				request.invoice_value,
				request.carrier_ids.as_deref(),
				|_| QuoteSource::Utsf,
			)
			.await;
		let mut public_result = self
			.price_carriers(
				resolved.public,
				&origin,
				&destination,
				&origin_zone,
				&destination_zone,
				actual_weight_kg,
				&volumetric_weights,
				request.invoice_value,
				request.carrier_ids.as_deref(),
				|carrier| if utsf_ids.contains(&carrier.id) { QuoteSource::Utsf } else { QuoteSource::Database },
			)
			.await;

		let carriers_priced = tied_up_result.len() + public_result.len();

		let smart_shield = smart_shield::evaluate_batch(&mut tied_up_result, &mut public_result);

		let response = CalculateResponse {
			tied_up_result,
			company_result: public_result,
			distance_km: Some(distance.distance_km),
			distance_text: Some(distance.distance_text),
			estimated_days: distance.estimated_days,
			smart_shield,
			debug: smart_shield::debug_info(carriers_considered, carriers_priced),
			from_cache: false,
		};

		self.write_cache(&key, &response).await;

		Ok(response)
	}

	async fn read_cache(&self, key: &str) -> Option<CalculateResponse> {
		match self.cache.retrieve::<CalculateResponse>(CACHE_NAMESPACE, key).await {
			Ok(entry) => Some(entry),
			Err(freight_cache::StorageError::NotFound) => None,
			Err(err) => {
				warn!(error = %err, "result cache read failed, proceeding as if absent");
				None
			}
		}
	}

	async fn write_cache(&self, key: &str, response: &CalculateResponse) {
		if response.tied_up_result.is_empty() && response.company_result.is_empty() {
			return;
		}
		if let Err(err) = self.cache.store_with_ttl(CACHE_NAMESPACE, key, response, None, Some(self.cache_ttl)).await {
			warn!(error = %err, "result cache write failed");
		}
	}

	async fn fetch_carriers(
		&self,
		owner_customer_id: &str,
		origin: &Pincode,
		destination: &Pincode,
	) -> Result<(Vec<Carrier>, Vec<Carrier>), EngineError> {
		let utsf_tied_up = self.utsf.by_customer_id(owner_customer_id);
		let utsf_public: Vec<Carrier> =
			self.utsf.all().into_iter().filter(|c| c.owner_customer_id.is_none()).collect();
		let mut utsf_carriers = utsf_tied_up;
		utsf_carriers.extend(utsf_public);

		let (db_tied_up, db_public) = tokio::join!(
			self.db.tied_up_carriers_for_route(owner_customer_id, origin, destination),
			self.db.public_carriers_for_route(origin, destination),
		);

		let mut db_carriers = db_tied_up?;
		db_carriers.extend(db_public?);

		Ok((utsf_carriers, db_carriers))
	}

	/// Fans out `FreightCalculator::calculate` over `carriers` in fixed-size
	/// concurrent batches, yielding to the scheduler between batches. Each
	/// carrier's pricing failure is logged and dropped; it never aborts the
	/// batch or the request. A carrier is only priced if it services both the
	/// origin and the destination pincode; this applies uniformly to UTSF and
	/// database-sourced carriers alike.
	#[allow(clippy::too_many_arguments)]
	async fn price_carriers(
		&self,
		carriers: Vec<Carrier>,
		origin: &Pincode,
		destination: &Pincode,
		origin_zone: &Zone,
		destination_zone: &Zone,
		actual_weight_kg: f64,
		volumetric_weights: &VolumetricWeights,
		invoice_value: f64,
		carrier_id_filter: Option<&[String]>,
		source_for: impl Fn(&Carrier) -> QuoteSource,
	) -> Vec<Quote> {
		let origin_numeric: Option<u32> = origin.as_str().parse().ok();
		let destination_numeric: Option<u32> = destination.as_str().parse().ok();

		let mut quotes = Vec::with_capacity(carriers.len());
		for batch in carriers.chunks(self.fanout_batch_size) {
			let mut handles = Vec::with_capacity(batch.len());
			for carrier in batch {
				if let Some(allowed) = carrier_id_filter {
					if !allowed.iter().any(|id| id == &carrier.id) {
						continue;
					}
				}
				if !carrier.is_eligible() {
					continue;
				}
				match (origin_numeric, destination_numeric) {
					(Some(o), Some(d)) if carrier.services(o) && carrier.services(d) => {}
					_ => continue,
				}

				let permit = match self.fanout_semaphore.clone().acquire_owned().await {
					Ok(permit) => permit,
					Err(_) => continue,
				};

				let carrier = carrier.clone();
				let effective_origin_zone = effective_zone(&carrier, origin_numeric, origin_zone);
				let effective_destination_zone = effective_zone(&carrier, destination_numeric, destination_zone);
				let oda_entry = destination_numeric.and_then(|p| carrier.oda_entry_for(p)).cloned();
				let volumetric_weights = *volumetric_weights;
				let source = source_for(&carrier);

				handles.push(tokio::spawn(async move {
					let _permit = permit;
					let route = RouteContext {
						origin_zone: &effective_origin_zone,
						destination_zone: &effective_destination_zone,
						actual_weight_kg,
						volumetric_weights: &volumetric_weights,
						invoice_value,
						oda_entry: oda_entry.as_ref(),
					};
					let result = freight_pricing::calculate(&carrier, source, &route);
					(carrier.id.clone(), result)
				}));
			}

			for handle in handles {
				match handle.await {
					Ok((_, Ok(quote))) => quotes.push(quote),
					Ok((carrier_id, Err(err))) => {
						warn!(carrier_id = %carrier_id, error = %err, "dropping carrier: pricing failed");
					}
					Err(join_err) => {
						warn!(error = %join_err, "dropping carrier: pricing task panicked");
					}
				}
			}

			tokio::task::yield_now().await;
		}

		info!(count = quotes.len(), "priced carrier batch");
		quotes
	}
}

fn effective_zone(carrier: &Carrier, pincode: Option<u32>, fallback: &Zone) -> Zone {
	pincode
		.and_then(|p| carrier.zone_override_for(p))
		.cloned()
		.unwrap_or_else(|| fallback.clone())
}
