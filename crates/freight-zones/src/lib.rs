//! Zone and centroid lookup indexes for the freight quoting engine.
//!
//! `ZoneIndex` and `CentroidIndex` are read-mostly singletons loaded once at
//! startup from the master pincode catalog and held immutable thereafter.
//! Both are safe to share across request handlers via an `Arc`.

use freight_types::{haversine_km, Pincode, PincodeMetadata, PincodeRecord, Zone};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading the master pincode catalog.
#[derive(Debug, Error)]
pub enum ZoneError {
	#[error("failed to read master pincode file {path}: {source}")]
	Io { path: String, #[source] source: std::io::Error },
	#[error("failed to parse master pincode file {path}: {source}")]
	Parse { path: String, #[source] source: serde_json::Error },
}

/// `pincode -> zone` (and city/state) lookup loaded from the master catalog.
///
/// Immutable after construction; zone codes are normalised to uppercase on load.
#[derive(Debug, Clone)]
pub struct ZoneIndex {
	records: HashMap<Pincode, PincodeRecord>,
}

impl ZoneIndex {
	/// Loads a `ZoneIndex` from a JSON array of `{pincode, zone, state, city}` records.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ZoneError> {
		let path_ref = path.as_ref();
		let raw = std::fs::read_to_string(path_ref).map_err(|source| ZoneError::Io {
			path: path_ref.display().to_string(),
			source,
		})?;
		Self::from_json_str(&raw, path_ref)
	}

	fn from_json_str(raw: &str, path_ref: &Path) -> Result<Self, ZoneError> {
		let entries: Vec<PincodeRecord> =
			serde_json::from_str(raw).map_err(|source| ZoneError::Parse {
				path: path_ref.display().to_string(),
				source,
			})?;
		Ok(Self::from_records(entries))
	}

	/// Builds a `ZoneIndex` directly from already-parsed records, normalising zone casing.
	pub fn from_records(entries: Vec<PincodeRecord>) -> Self {
		let records = entries
			.into_iter()
			.map(|mut rec| {
				rec.zone = Zone::new(rec.zone.as_str());
				(rec.pincode.clone(), rec)
			})
			.collect();
		Self { records }
	}

	/// `zoneOf(pincode) -> zone|nil`, O(1).
	pub fn zone_of(&self, pincode: &Pincode) -> Option<&Zone> {
		self.records.get(pincode).map(|r| &r.zone)
	}

	/// City/state metadata for a pincode, if known.
	pub fn metadata_of(&self, pincode: &Pincode) -> Option<PincodeMetadata> {
		self.records.get(pincode).map(|r| PincodeMetadata {
			city: r.city.clone(),
			state: r.state.clone(),
		})
	}

	pub fn contains(&self, pincode: &Pincode) -> bool {
		self.records.contains_key(pincode)
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// All records, used by `UTSFRegistry` when expanding a zone to its full pincode set.
	pub fn all(&self) -> impl Iterator<Item = &PincodeRecord> {
		self.records.values()
	}

	/// All pincodes belonging to a given zone.
	pub fn pincodes_in_zone(&self, zone: &Zone) -> Vec<Pincode> {
		self.records
			.values()
			.filter(|r| &r.zone == zone)
			.map(|r| r.pincode.clone())
			.collect()
	}
}

/// `pincode -> (lat, lng)` lookup, used exclusively by distance fallback and
/// `NearestPincodeFinder`.
#[derive(Debug, Clone)]
pub struct CentroidIndex {
	coords: HashMap<Pincode, (f64, f64)>,
}

impl CentroidIndex {
	/// Loads a `CentroidIndex` from the same master pincode catalog `ZoneIndex` uses.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ZoneError> {
		let path_ref = path.as_ref();
		let raw = std::fs::read_to_string(path_ref).map_err(|source| ZoneError::Io {
			path: path_ref.display().to_string(),
			source,
		})?;
		let entries: Vec<PincodeRecord> =
			serde_json::from_str(&raw).map_err(|source| ZoneError::Parse {
				path: path_ref.display().to_string(),
				source,
			})?;
		Ok(Self::from_records(entries))
	}

	pub fn from_records(entries: Vec<PincodeRecord>) -> Self {
		let coords = entries
			.into_iter()
			.map(|rec| (rec.pincode, (rec.latitude, rec.longitude)))
			.collect();
		Self { coords }
	}

	/// `coordsOf(pincode) -> (lat,lng)|nil`.
	pub fn coords_of(&self, pincode: &Pincode) -> Option<(f64, f64)> {
		self.coords.get(pincode).copied()
	}

	/// Great-circle distance between two pincodes, if both have known coordinates.
	pub fn haversine_km(&self, a: &Pincode, b: &Pincode) -> Option<f64> {
		let (lat1, lon1) = self.coords_of(a)?;
		let (lat2, lon2) = self.coords_of(b)?;
		Some(haversine_km(lat1, lon1, lat2, lon2))
	}

	pub fn len(&self) -> usize {
		self.coords.len()
	}

	pub fn is_empty(&self) -> bool {
		self.coords.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_records() -> Vec<PincodeRecord> {
		vec![
			PincodeRecord {
				pincode: Pincode::new("110001"),
				zone: Zone::new("n1"),
				latitude: 28.6139,
				longitude: 77.2090,
				city: Some("Delhi".into()),
				state: Some("Delhi".into()),
			},
			PincodeRecord {
				pincode: Pincode::new("400001"),
				zone: Zone::new("W1"),
				latitude: 19.0760,
				longitude: 72.8777,
				city: Some("Mumbai".into()),
				state: Some("Maharashtra".into()),
			},
		]
	}

	#[test]
	fn zone_of_normalizes_and_finds() {
		let index = ZoneIndex::from_records(sample_records());
		assert_eq!(index.zone_of(&Pincode::new("110001")).unwrap().as_str(), "N1");
		assert!(index.zone_of(&Pincode::new("999999")).is_none());
	}

	#[test]
	fn metadata_of_returns_city_state() {
		let index = ZoneIndex::from_records(sample_records());
		let meta = index.metadata_of(&Pincode::new("400001")).unwrap();
		assert_eq!(meta.city.as_deref(), Some("Mumbai"));
	}

	#[test]
	fn pincodes_in_zone_filters_correctly() {
		let index = ZoneIndex::from_records(sample_records());
		let pins = index.pincodes_in_zone(&Zone::new("n1"));
		assert_eq!(pins, vec![Pincode::new("110001")]);
	}

	#[test]
	fn centroid_haversine_roundtrips_known_distance() {
		let index = CentroidIndex::from_records(sample_records());
		let d = index
			.haversine_km(&Pincode::new("110001"), &Pincode::new("400001"))
			.unwrap();
		assert!((1100.0..1200.0).contains(&d));
	}

	#[test]
	fn centroid_missing_pincode_returns_none() {
		let index = CentroidIndex::from_records(sample_records());
		assert!(index.haversine_km(&Pincode::new("110001"), &Pincode::new("000000")).is_none());
	}

	#[test]
	fn load_from_file_parses_json_array() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("pincodes.json");
		let json = serde_json::to_string(&sample_records()).unwrap();
		std::fs::write(&path, json).unwrap();

		let zones = ZoneIndex::load(&path).unwrap();
		assert_eq!(zones.len(), 2);
		let centroids = CentroidIndex::load(&path).unwrap();
		assert_eq!(centroids.len(), 2);
	}
}
