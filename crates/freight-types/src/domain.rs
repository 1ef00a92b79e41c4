//! Pincode and zone primitives shared across the quoting pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A six-digit Indian postal code, stored as a string to preserve leading zeros
/// and to avoid implying arithmetic where none is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pincode(pub String);

impl Pincode {
	/// Builds a pincode from any string-like value, trimming whitespace.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into().trim().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Pincode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for Pincode {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for Pincode {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

/// An inclusive numeric pincode range, e.g. `[110001, 110096]`.
///
/// Carriers and zone files encode ranges either as a two-element array or as an
/// object with `s`/`e` (or `start`/`end`) fields; `UTSFRegistry` normalizes both
/// into this type at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PincodeRange {
	pub start: u32,
	pub end: u32,
}

impl PincodeRange {
	pub fn new(start: u32, end: u32) -> Self {
		// Tolerate swapped bounds in source data rather than rejecting the carrier outright.
		if start <= end {
			Self { start, end }
		} else {
			Self { start: end, end: start }
		}
	}

	pub fn contains(&self, pincode: u32) -> bool {
		pincode >= self.start && pincode <= self.end
	}
}

/// A named geographic zone (e.g. a state-like grouping used for zone-rate lookups).
///
/// Zone names are case-insensitive in source files; `ZoneIndex` normalizes them to
/// uppercase on load so that equality and hashing behave consistently everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(pub String);

impl Zone {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into().trim().to_uppercase())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Zone {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for Zone {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

/// A single entry in the master pincode file: pincode, owning zone, and coordinates
/// used by `CentroidIndex` for nearest-pincode lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PincodeRecord {
	pub pincode: Pincode,
	pub zone: Zone,
	pub latitude: f64,
	pub longitude: f64,
	#[serde(default)]
	pub city: Option<String>,
	#[serde(default)]
	pub state: Option<String>,
}

/// City/state metadata for a pincode, returned by `ZoneIndex::metadata_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PincodeMetadata {
	pub city: Option<String>,
	pub state: Option<String>,
}

/// Great-circle distance between two coordinates in kilometers, using the haversine
/// formula. Shared by `CentroidIndex` ranking and any distance-service fallback.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
	const EARTH_RADIUS_KM: f64 = 6371.0;
	let (lat1_r, lat2_r) = (lat1.to_radians(), lat2.to_radians());
	let dlat = (lat2 - lat1).to_radians();
	let dlon = (lon2 - lon1).to_radians();
	let a = (dlat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (dlon / 2.0).sin().powi(2);
	let c = 2.0 * a.sqrt().asin();
	EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pincode_range_normalizes_swapped_bounds() {
		let range = PincodeRange::new(500, 100);
		assert_eq!(range.start, 100);
		assert_eq!(range.end, 500);
		assert!(range.contains(300));
		assert!(!range.contains(50));
	}

	#[test]
	fn zone_normalizes_to_uppercase() {
		let zone = Zone::new(" west ");
		assert_eq!(zone.as_str(), "WEST");
	}

	#[test]
	fn haversine_zero_distance_for_identical_points() {
		let d = haversine_km(28.6139, 77.2090, 28.6139, 77.2090);
		assert!(d.abs() < 1e-6);
	}

	#[test]
	fn haversine_known_city_pair_is_reasonable() {
		// Delhi to Mumbai is roughly 1150km as the crow flies.
		let d = haversine_km(28.6139, 77.2090, 19.0760, 72.8777);
		assert!((1100.0..1200.0).contains(&d), "unexpected distance: {d}");
	}
}
