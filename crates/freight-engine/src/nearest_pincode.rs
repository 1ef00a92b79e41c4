//! `NearestPincodeFinder`: suggests a serviceable alternative when the
//! requested destination pincode has no carrier coverage.

use std::sync::Arc;

use freight_carriers::{DbCarrierSource, UTSFRegistry};
use freight_types::carrier::Carrier;
use freight_types::domain::{Pincode, Zone};
use freight_types::shipment::VolumetricWeights;
use freight_zones::{CentroidIndex, ZoneIndex};

use freight_pricing::RouteContext;
use freight_types::quote::QuoteSource;

use crate::distance::rank_by_distance;

const MAX_HAVERSINE_KM: f64 = 200.0;
const MAX_CANDIDATES: usize = 50;
const VERIFY_TEST_WEIGHT_KG: f64 = 100.0;

/// Outcome of a nearest-pincode search.
#[derive(Debug, Clone)]
pub struct NearestPincodeResult {
	pub nearest_pincode: Option<String>,
	pub distance_km: Option<f64>,
	pub served_by: Vec<String>,
}

/// Finds a serviceable pincode close to `destination`, verified by actually
/// pricing it with `test_weight = 100kg` against every owner-relevant carrier.
pub async fn find(
	utsf: &UTSFRegistry,
	db: &Arc<dyn DbCarrierSource>,
	zones: &ZoneIndex,
	centroids: &CentroidIndex,
	origin: &Pincode,
	destination: &Pincode,
	owner_customer_id: Option<&str>,
) -> NearestPincodeResult {
	let candidates = build_candidate_set(utsf, db, origin, destination, owner_customer_id).await;
	if candidates.is_empty() {
		return NearestPincodeResult { nearest_pincode: None, distance_km: None, served_by: vec![] };
	}

	let ranked = rank_candidates(centroids, destination, candidates);

	let Some(origin_zone) = zones.zone_of(origin).cloned() else {
		return NearestPincodeResult { nearest_pincode: None, distance_km: None, served_by: vec![] };
	};

	for (candidate, distance_km) in ranked {
		let Some(dest_zone) = zones.zone_of(&candidate).cloned() else { continue };
		let served_by = verify_candidate(utsf, db, &origin_zone, &dest_zone, &candidate, owner_customer_id).await;
		if !served_by.is_empty() {
			return NearestPincodeResult {
				nearest_pincode: Some(candidate.as_str().to_string()),
				distance_km,
				served_by,
			};
		}
	}

	NearestPincodeResult { nearest_pincode: None, distance_km: None, served_by: vec![] }
}

async fn build_candidate_set(
	utsf: &UTSFRegistry,
	db: &Arc<dyn DbCarrierSource>,
	origin: &Pincode,
	destination: &Pincode,
	owner_customer_id: Option<&str>,
) -> Vec<Pincode> {
	let mut candidates = std::collections::HashSet::new();

	let utsf_carriers = match owner_customer_id {
		Some(owner) => {
			let owned = utsf.by_customer_id(owner);
			if owned.is_empty() {
				utsf.all()
			} else {
				owned
			}
		}
		None => utsf.all(),
	};
	for carrier in &utsf_carriers {
		collect_served_pincodes(carrier, &mut candidates);
	}

	if let Some(owner) = owner_customer_id {
		if let Ok(db_carriers) = db.tied_up_carriers_for_route(owner, origin, destination).await {
			for carrier in &db_carriers {
				if carrier.is_eligible() {
					collect_served_pincodes(carrier, &mut candidates);
				}
			}
		}
	}

	candidates.remove(destination);
	candidates.into_iter().collect()
}

/// A carrier's served ranges can legitimately span an entire zone (tens of
/// thousands of pincodes); capping the per-range expansion keeps candidate
/// collection bounded without requiring a serviceable-pincode index.
const MAX_EXPANDED_PER_RANGE: u32 = 5_000;

fn collect_served_pincodes(carrier: &Carrier, out: &mut std::collections::HashSet<Pincode>) {
	for range in &carrier.serviceability.served {
		let end = range.end.min(range.start.saturating_add(MAX_EXPANDED_PER_RANGE));
		for pin in range.start..=end {
			if carrier.services(pin) {
				out.insert(Pincode::new(pin.to_string()));
			}
		}
	}
}

fn rank_candidates(centroids: &CentroidIndex, destination: &Pincode, candidates: Vec<Pincode>) -> Vec<(Pincode, Option<f64>)> {
	if centroids.coords_of(destination).is_some() {
		rank_by_distance(centroids, destination, candidates)
			.into_iter()
			.filter(|(_, distance)| distance.map(|d| d <= MAX_HAVERSINE_KM).unwrap_or(false))
			.take(MAX_CANDIDATES)
			.collect()
	} else {
		rank_by_distance(centroids, destination, candidates).into_iter().take(MAX_CANDIDATES).collect()
	}
}

async fn verify_candidate(
	utsf: &UTSFRegistry,
	db: &Arc<dyn DbCarrierSource>,
	origin_zone: &Zone,
	dest_zone: &Zone,
	candidate: &Pincode,
	owner_customer_id: Option<&str>,
) -> Vec<String> {
	let mut served_by = Vec::new();
	let weights = VolumetricWeights {
		at_4500: VERIFY_TEST_WEIGHT_KG,
		at_5000: VERIFY_TEST_WEIGHT_KG,
		at_5500: VERIFY_TEST_WEIGHT_KG,
		at_6000: VERIFY_TEST_WEIGHT_KG,
	};

	let mut candidate_carriers: Vec<(Carrier, QuoteSource)> =
		utsf.all().into_iter().map(|c| (c, QuoteSource::Utsf)).collect();

	if let Some(owner) = owner_customer_id {
		if let Ok(db_carriers) = db.tied_up_carriers_for_route(owner, candidate, candidate).await {
			candidate_carriers.extend(db_carriers.into_iter().map(|c| (c, QuoteSource::Database)));
		}
	}

	let candidate_numeric: u32 = match candidate.as_str().parse() {
		Ok(n) => n,
		Err(_) => return served_by,
	};

	for (carrier, source) in &candidate_carriers {
		if !carrier.is_eligible() || !carrier.services(candidate_numeric) {
			continue;
		}
		let oda_entry = carrier.oda_entry_for(candidate_numeric);
		let route = RouteContext {
			origin_zone,
			destination_zone: dest_zone,
			actual_weight_kg: VERIFY_TEST_WEIGHT_KG,
			volumetric_weights: &weights,
			invoice_value: 1.0,
			oda_entry,
		};
		if let Ok(quote) = freight_pricing::calculate(carrier, *source, &route) {
			if quote.total_charges > 0.0 {
				served_by.push(carrier.id.clone());
			}
		}
	}

	served_by
}

#[cfg(test)]
mod tests {
	use super::*;

	struct NoDbCarriers;

	#[async_trait::async_trait]
	impl DbCarrierSource for NoDbCarriers {
		async fn public_carriers_for_route(
			&self,
			_origin: &Pincode,
			_destination: &Pincode,
		) -> Result<Vec<Carrier>, freight_carriers::CarrierError> {
			Ok(vec![])
		}
		async fn tied_up_carriers_for_route(
			&self,
			_owner: &str,
			_origin: &Pincode,
			_destination: &Pincode,
		) -> Result<Vec<Carrier>, freight_carriers::CarrierError> {
			Ok(vec![])
		}
	}

	fn sample_zones() -> ZoneIndex {
		ZoneIndex::from_records(vec![
			freight_types::domain::PincodeRecord { pincode: Pincode::new("110001"), zone: Zone::new("N1"), latitude: 28.6, longitude: 77.2, city: None, state: None },
			freight_types::domain::PincodeRecord { pincode: Pincode::new("110002"), zone: Zone::new("N1"), latitude: 28.61, longitude: 77.21, city: None, state: None },
			freight_types::domain::PincodeRecord { pincode: Pincode::new("110099"), zone: Zone::new("N1"), latitude: 28.62, longitude: 77.22, city: None, state: None },
		])
	}

	fn sample_centroids() -> CentroidIndex {
		CentroidIndex::from_records(vec![
			freight_types::domain::PincodeRecord { pincode: Pincode::new("110001"), zone: Zone::new("N1"), latitude: 28.6, longitude: 77.2, city: None, state: None },
			freight_types::domain::PincodeRecord { pincode: Pincode::new("110002"), zone: Zone::new("N1"), latitude: 28.61, longitude: 77.21, city: None, state: None },
			freight_types::domain::PincodeRecord { pincode: Pincode::new("110099"), zone: Zone::new("N1"), latitude: 28.62, longitude: 77.22, city: None, state: None },
		])
	}

	#[tokio::test]
	async fn finds_nearest_serviceable_pincode_when_destination_has_no_coverage() {
		let zones = sample_zones();
		let centroids = sample_centroids();
		let dir = tempfile::tempdir().unwrap();
		let utsf = UTSFRegistry::load_dir(dir.path(), Arc::new(zones.clone())).await.unwrap();
		utsf.add(build_utsf_file("c1", 110001, 110002)).await.unwrap();

		let db: Arc<dyn DbCarrierSource> = Arc::new(NoDbCarriers);

		let result = find(
			&utsf,
			&db,
			&zones,
			&centroids,
			&Pincode::new("110001"),
			&Pincode::new("110099"),
			None,
		)
		.await;

		assert_eq!(result.nearest_pincode, Some("110002".to_string()));
		assert!(result.served_by.contains(&"c1".to_string()));
	}

	fn build_utsf_file(id: &str, start: u32, end: u32) -> freight_carriers::utsf::UtsfFile {
		let raw = format!(
			r#"{{
				"meta": {{"id": "{id}", "companyName": "Acme", "approvalStatus": "approved", "isVerified": true}},
				"pricing": {{"priceRate": {{}}, "zoneRates": {{"N1": {{"N1": 20}}}}}},
				"serviceability": {{
					"N1": {{"mode": "ONLY_SERVED", "servedRanges": [[{start}, {end}]]}}
				}},
				"oda": {{}}
			}}"#
		);
		freight_carriers::utsf::parse_utsf_str(&raw).unwrap()
	}
}
