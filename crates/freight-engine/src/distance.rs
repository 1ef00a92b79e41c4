//! Route distance lookups used by `QuoteEngine` (estimated transit time and
//! display text) and `NearestPincodeFinder` (candidate ranking).
//!
//! The source system calls out to an external road-routing API and signals
//! the caller with exceptions for the "no route"/"unknown pincode" cases.
//! Those are modelled here as a discriminated error enum instead, so the
//! engine's decision table stays explicit rather than relying on `catch`.

use async_trait::async_trait;
use freight_types::domain::Pincode;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DistanceError {
	#[error("no road route between the given pincodes")]
	NoRoadRoute,
	#[error("pincode not found: {0}")]
	PincodeNotFound(String),
	#[error("distance service request timed out")]
	ApiTimeout,
	#[error("distance service API key missing")]
	ApiKeyMissing,
	#[error("distance service returned an error: {0}")]
	GoogleApiError(String),
}

/// A resolved route distance.
#[derive(Debug, Clone)]
pub struct RouteDistance {
	pub distance_km: f64,
	pub distance_text: String,
	pub estimated_days: Option<u32>,
}

/// Port for the external road-routing service. Abstracted as a trait so engine
/// tests can substitute a fixed/fake distance without a network dependency.
#[async_trait]
pub trait DistanceService: Send + Sync {
	async fn compute_route_distance(
		&self,
		origin: &Pincode,
		destination: &Pincode,
	) -> Result<RouteDistance, DistanceError>;
}

/// Calls a configured HTTP road-routing API (e.g. a Google Distance Matrix-style
/// endpoint). Used when `DistanceServiceConfig::enabled` is true.
pub struct HttpDistanceService {
	client: reqwest::Client,
	base_url: String,
	api_key: String,
}

impl HttpDistanceService {
	pub fn new(base_url: String, api_key: String, timeout: std::time::Duration) -> Self {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.unwrap_or_default();
		Self { client, base_url, api_key }
	}
}

#[derive(serde::Deserialize)]
struct DistanceApiResponse {
	distance_km: Option<f64>,
	distance_text: Option<String>,
	estimated_days: Option<u32>,
	status: Option<String>,
}

#[async_trait]
impl DistanceService for HttpDistanceService {
	async fn compute_route_distance(
		&self,
		origin: &Pincode,
		destination: &Pincode,
	) -> Result<RouteDistance, DistanceError> {
		if self.api_key.is_empty() {
			return Err(DistanceError::ApiKeyMissing);
		}

		let response = self
			.client
			.get(&self.base_url)
			.query(&[
				("origin", origin.as_str()),
				("destination", destination.as_str()),
				("key", self.api_key.as_str()),
			])
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					DistanceError::ApiTimeout
				} else {
					DistanceError::GoogleApiError(e.to_string())
				}
			})?;

		let body: DistanceApiResponse = response
			.json()
			.await
			.map_err(|e| DistanceError::GoogleApiError(e.to_string()))?;

		match body.status.as_deref() {
			Some("ZERO_RESULTS") => return Err(DistanceError::NoRoadRoute),
			Some("NOT_FOUND") => {
				return Err(DistanceError::PincodeNotFound(format!("{origin}/{destination}")))
			}
			_ => {}
		}

		let distance_km = body.distance_km.ok_or(DistanceError::NoRoadRoute)?;
		Ok(RouteDistance {
			distance_km,
			distance_text: body.distance_text.unwrap_or_else(|| format!("{distance_km:.0} km")),
			estimated_days: body.estimated_days,
		})
	}
}

/// Estimates distance from the centroid index's haversine distance when no
/// external routing service is configured. Not a road distance, but keeps the
/// engine functional in local/offline deployments.
pub struct HaversineDistanceService {
	centroids: Arc<freight_zones::CentroidIndex>,
}

impl HaversineDistanceService {
	pub fn new(centroids: Arc<freight_zones::CentroidIndex>) -> Self {
		Self { centroids }
	}
}

#[async_trait]
impl DistanceService for HaversineDistanceService {
	async fn compute_route_distance(
		&self,
		origin: &Pincode,
		destination: &Pincode,
	) -> Result<RouteDistance, DistanceError> {
		let distance_km = self.centroids.haversine_km(origin, destination).ok_or_else(|| {
			warn!(origin = %origin, destination = %destination, "no centroid coordinates for distance estimate");
			DistanceError::PincodeNotFound(format!("{origin}/{destination}"))
		})?;

		// Rough heuristic: one transit day per 400km of road distance, minimum 1.
		let estimated_days = Some(((distance_km / 400.0).ceil() as u32).max(1));

		Ok(RouteDistance {
			distance_km,
			distance_text: format!("{distance_km:.0} km (estimated)"),
			estimated_days,
		})
	}
}

/// Never resolves a distance; used when the zone lookup for the route has no
/// centroid data and no HTTP distance service is configured.
pub struct NullDistanceService;

#[async_trait]
impl DistanceService for NullDistanceService {
	async fn compute_route_distance(
		&self,
		_origin: &Pincode,
		_destination: &Pincode,
	) -> Result<RouteDistance, DistanceError> {
		Err(DistanceError::PincodeNotFound("distance service not configured".into()))
	}
}

/// Resolves a centroid-based haversine distance directly against a `ZoneIndex`'s
/// sibling `CentroidIndex`, used by `NearestPincodeFinder` for candidate ranking
/// rather than going through a `DistanceService`.
pub fn rank_by_distance(
	centroids: &freight_zones::CentroidIndex,
	destination: &Pincode,
	candidates: Vec<Pincode>,
) -> Vec<(Pincode, Option<f64>)> {
	if centroids.coords_of(destination).is_some() {
		let mut ranked: Vec<(Pincode, f64)> = candidates
			.into_iter()
			.filter_map(|p| centroids.haversine_km(destination, &p).map(|d| (p, d)))
			.collect();
		ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
		ranked.into_iter().map(|(p, d)| (p, Some(d))).collect()
	} else {
		let dest_num: i64 = destination.as_str().parse().unwrap_or(0);
		let mut ranked: Vec<(Pincode, i64)> = candidates
			.into_iter()
			.filter_map(|p| p.as_str().parse::<i64>().ok().map(|n| (p, (n - dest_num).abs())))
			.collect();
		ranked.sort_by_key(|(_, diff)| *diff);
		ranked.into_iter().map(|(p, _)| (p, None)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use freight_types::domain::PincodeRecord;

	fn sample_centroids() -> freight_zones::CentroidIndex {
		freight_zones::CentroidIndex::from_records(vec![
			PincodeRecord { pincode: Pincode::new("110001"), zone: freight_types::domain::Zone::new("N1"), latitude: 28.6139, longitude: 77.2090, city: None, state: None },
			PincodeRecord { pincode: Pincode::new("400001"), zone: freight_types::domain::Zone::new("W1"), latitude: 19.0760, longitude: 72.8777, city: None, state: None },
		])
	}

	#[tokio::test]
	async fn haversine_service_estimates_a_plausible_distance() {
		let centroids = Arc::new(sample_centroids());
		let service = HaversineDistanceService::new(centroids);
		let result = service
			.compute_route_distance(&Pincode::new("110001"), &Pincode::new("400001"))
			.await
			.unwrap();
		assert!((1000.0..1300.0).contains(&result.distance_km));
		assert!(result.estimated_days.unwrap() >= 1);
	}

	#[tokio::test]
	async fn haversine_service_errors_on_unknown_pincode() {
		let centroids = Arc::new(sample_centroids());
		let service = HaversineDistanceService::new(centroids);
		let result = service.compute_route_distance(&Pincode::new("110001"), &Pincode::new("999999")).await;
		assert!(matches!(result, Err(DistanceError::PincodeNotFound(_))));
	}

	#[test]
	fn rank_by_distance_falls_back_to_numeric_difference_without_centroids() {
		let centroids = freight_zones::CentroidIndex::from_records(vec![]);
		let ranked = rank_by_distance(
			&centroids,
			&Pincode::new("110010"),
			vec![Pincode::new("110050"), Pincode::new("110011")],
		);
		assert_eq!(ranked[0].0, Pincode::new("110011"));
		assert!(ranked[0].1.is_none());
	}
}
