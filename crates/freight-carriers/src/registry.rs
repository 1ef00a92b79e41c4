//! `UTSFRegistry`: the authoritative in-memory carrier catalog, built from
//! `*.utsf.json` files under a configured directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use freight_types::carrier::{
	Carrier, OdaEntry, Serviceability, ZoneOverride, ZoneServiceMode,
};
use freight_types::domain::{Pincode, PincodeRange, Zone};
use freight_zones::ZoneIndex;
use tracing::{info, warn};

use crate::error::CarrierError;
use crate::utsf::{build_pricing, parse_utsf_str, UtsfFile};

fn singles_to_ranges(singles: &[u32]) -> Vec<PincodeRange> {
	singles.iter().map(|&p| PincodeRange::new(p, p)).collect()
}

/// Builds a quotable `Carrier` from a parsed UTSF file, running the four-pass
/// index build against a `ZoneIndex` snapshot.
pub fn build_carrier(file: UtsfFile, zones: &ZoneIndex) -> Carrier {
	let mut exceptions: Vec<PincodeRange> = Vec::new();
	let mut served: Vec<PincodeRange> = Vec::new();
	let mut oda: Vec<OdaEntry> = Vec::new();

	for (zone_name, svc) in &file.serviceability {
		let zone = Zone::new(zone_name.as_str());

		// Pass 1 - exceptions: applied regardless of mode.
		let mut zone_exceptions: Vec<PincodeRange> =
			svc.except_ranges.iter().map(|r| r.0).collect();
		zone_exceptions.extend(singles_to_ranges(&svc.except_singles));
		zone_exceptions.extend(singles_to_ranges(&svc.soft_exclusions));

		// Pass 2 - served set, before exception subtraction.
		let explicit_served: Vec<PincodeRange> = {
			let mut ranges: Vec<PincodeRange> = svc.served_ranges.iter().map(|r| r.0).collect();
			ranges.extend(singles_to_ranges(&svc.served_singles));
			ranges
		};

		let strict = file.meta.integrity_mode.unwrap_or_default() == freight_types::carrier::IntegrityMode::Strict;

		let zone_served = match svc.mode {
			Some(ZoneServiceMode::FullZone) | Some(ZoneServiceMode::FullMinusExceptions) | None => {
				if !explicit_served.is_empty() || strict {
					explicit_served
				} else {
					zones
						.pincodes_in_zone(&zone)
						.into_iter()
						.filter_map(|p| p.as_str().parse::<u32>().ok())
						.map(|p| PincodeRange::new(p, p))
						.collect()
				}
			}
			Some(ZoneServiceMode::OnlyServed) => explicit_served,
			Some(ZoneServiceMode::NotServed) => Vec::new(),
		};

		// Subtraction of the exception set happens at query time via
		// `Carrier::services`/`Carrier::is_excepted`, so both sets are simply
		// accumulated here rather than materialising the difference.
		served.extend(zone_served);
		exceptions.extend(zone_exceptions);
	}

	for (zone_name, entry) in &file.oda {
		let mode = entry.mode.unwrap_or(freight_types::carrier::OdaMode::Legacy);
		let mut ranges: Vec<PincodeRange> = entry.oda_ranges.iter().map(|r| r.0).collect();
		ranges.extend(singles_to_ranges(&entry.oda_singles));
		for range in ranges {
			oda.push(OdaEntry {
				range,
				mode,
				fixed: entry.fixed,
				variable: entry.variable,
				threshold_weight_kg: entry.threshold_weight_kg,
			});
		}
		let _ = zone_name;
	}

	let zone_overrides = file
		.zone_overrides
		.iter()
		.filter_map(|(pincode, zone)| {
			pincode.parse::<u32>().ok().map(|p| ZoneOverride { range: PincodeRange::new(p, p), zone: Zone::new(zone.as_str()) })
		})
		.collect();

	Carrier {
		id: file.meta.id.clone(),
		name: file.meta.company_name.clone(),
		owner_customer_id: file.meta.customer_id.clone(),
		approval_status: file.meta.approval_status,
		is_verified: file.meta.is_verified,
		integrity_mode: file.meta.integrity_mode.unwrap_or_default(),
		serviceability: Serviceability { exceptions, served, oda },
		zone_overrides,
		pricing: build_pricing(&file.pricing),
	}
}

/// Authoritative in-memory carrier catalog. Reads are lock-free against a
/// snapshot; writes (`add`/`remove`/`reload`) build a new snapshot and swap it in.
pub struct UTSFRegistry {
	directory: PathBuf,
	zones: Arc<ZoneIndex>,
	carriers: ArcSwap<HashMap<String, Carrier>>,
}

impl UTSFRegistry {
	/// Loads every `*.utsf.json` file in `directory`.
	pub async fn load_dir(directory: impl AsRef<Path>, zones: Arc<ZoneIndex>) -> Result<Self, CarrierError> {
		let directory = directory.as_ref().to_path_buf();
		let carriers = Self::scan_directory(&directory, &zones).await?;
		Ok(Self { directory, zones, carriers: ArcSwap::new(Arc::new(carriers)) })
	}

	async fn scan_directory(
		directory: &Path,
		zones: &ZoneIndex,
	) -> Result<HashMap<String, Carrier>, CarrierError> {
		let mut carriers = HashMap::new();
		let mut entries = tokio::fs::read_dir(directory).await.map_err(|source| CarrierError::Io {
			path: directory.display().to_string(),
			source,
		})?;

		while let Some(entry) = entries.next_entry().await.map_err(|source| CarrierError::Io {
			path: directory.display().to_string(),
			source,
		})? {
			let path = entry.path();
			let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
			if !name.ends_with(".utsf.json") {
				continue;
			}
			match Self::load_file(&path, zones).await {
				Ok(carrier) => {
					carriers.insert(carrier.id.clone(), carrier);
				}
				Err(err) => warn!(file = %name, error = %err, "skipping unreadable UTSF file"),
			}
		}

		info!(count = carriers.len(), directory = %directory.display(), "loaded UTSF carrier catalog");
		Ok(carriers)
	}

	async fn load_file(path: &Path, zones: &ZoneIndex) -> Result<Carrier, CarrierError> {
		let raw = tokio::fs::read_to_string(path).await.map_err(|source| CarrierError::Io {
			path: path.display().to_string(),
			source,
		})?;
		let file: UtsfFile = parse_utsf_str(&raw).map_err(|source| CarrierError::Parse {
			path: path.display().to_string(),
			source,
		})?;
		Ok(build_carrier(file, zones))
	}

	/// All carriers currently loaded, regardless of approval/verification status.
	pub fn all(&self) -> Vec<Carrier> {
		self.carriers.load().values().cloned().collect()
	}

	pub fn by_id(&self, id: &str) -> Option<Carrier> {
		self.carriers.load().get(id).cloned()
	}

	pub fn by_customer_id(&self, owner_id: &str) -> Vec<Carrier> {
		self.carriers
			.load()
			.values()
			.filter(|c| c.owner_customer_id.as_deref() == Some(owner_id))
			.cloned()
			.collect()
	}

	/// All carriers whose served set (minus exceptions) covers `pincode`.
	pub fn for_pincode(&self, pincode: &Pincode) -> Vec<Carrier> {
		let numeric: u32 = match pincode.as_str().parse() {
			Ok(n) => n,
			Err(_) => return Vec::new(),
		};
		self.carriers.load().values().filter(|c| c.services(numeric)).cloned().collect()
	}

	/// O(1)-ish check (bounded by a carrier's served-range count) of whether
	/// `pincode` is serviceable by a specific carrier.
	pub fn is_serviceable(&self, carrier_id: &str, pincode: &Pincode) -> bool {
		let numeric: u32 = match pincode.as_str().parse() {
			Ok(n) => n,
			Err(_) => return false,
		};
		self.carriers.load().get(carrier_id).is_some_and(|c| c.services(numeric))
	}

	/// Upserts a carrier in memory and on disk.
	pub async fn add(&self, file: UtsfFile) -> Result<Carrier, CarrierError> {
		let carrier = build_carrier(file.clone(), &self.zones);
		let path = self.directory.join(format!("{}.utsf.json", carrier.id));
		let raw = serde_json::to_string_pretty(&file).map_err(|e| CarrierError::Store(e.to_string()))?;
		tokio::fs::write(&path, raw).await.map_err(|source| CarrierError::Io {
			path: path.display().to_string(),
			source,
		})?;

		let mut next = (**self.carriers.load()).clone();
		next.insert(carrier.id.clone(), carrier.clone());
		self.carriers.store(Arc::new(next));
		Ok(carrier)
	}

	pub fn remove(&self, id: &str) -> Option<Carrier> {
		let mut next = (**self.carriers.load()).clone();
		let removed = next.remove(id);
		if removed.is_some() {
			self.carriers.store(Arc::new(next));
		}
		removed
	}

	/// Rescans the entire directory and swaps in a fresh snapshot.
	pub async fn reload(&self) -> Result<(), CarrierError> {
		let carriers = Self::scan_directory(&self.directory, &self.zones).await?;
		self.carriers.store(Arc::new(carriers));
		Ok(())
	}

	/// Reloads a single carrier's file by id.
	pub async fn reload_one(&self, id: &str) -> Result<Carrier, CarrierError> {
		let path = self.directory.join(format!("{id}.utsf.json"));
		let carrier = Self::load_file(&path, &self.zones).await?;
		let mut next = (**self.carriers.load()).clone();
		next.insert(carrier.id.clone(), carrier.clone());
		self.carriers.store(Arc::new(next));
		Ok(carrier)
	}
}

// `UtsfFile` needs to be serializable/clonable for `add()` to round-trip to disk.
impl Clone for UtsfFile {
	fn clone(&self) -> Self {
		UtsfFile {
			meta: self.meta.clone(),
			zone_overrides: self.zone_overrides.clone(),
			pricing: self.pricing.clone(),
			serviceability: self.serviceability.clone(),
			oda: self.oda.clone(),
		}
	}
}

impl serde::Serialize for UtsfFile {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		use serde::ser::SerializeStruct;
		let mut state = serializer.serialize_struct("UtsfFile", 5)?;
		state.serialize_field("meta", &self.meta)?;
		state.serialize_field("zoneOverrides", &self.zone_overrides)?;
		state.serialize_field("pricing", &self.pricing)?;
		state.serialize_field("serviceability", &self.serviceability)?;
		state.serialize_field("oda", &self.oda)?;
		state.end()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use freight_types::domain::PincodeRecord;

	fn sample_zones() -> ZoneIndex {
		ZoneIndex::from_records(vec![
			PincodeRecord {
				pincode: Pincode::new("110001"),
				zone: Zone::new("n1"),
				latitude: 28.6,
				longitude: 77.2,
				city: None,
				state: None,
			},
			PincodeRecord {
				pincode: Pincode::new("110002"),
				zone: Zone::new("n1"),
				latitude: 28.6,
				longitude: 77.2,
				city: None,
				state: None,
			},
		])
	}

	fn sample_file() -> &'static str {
		r#"{
			"meta": {"id": "c1", "companyName": "Acme Logistics", "approvalStatus": "approved", "isVerified": true},
			"pricing": {"priceRate": {}, "zoneRates": {"N1": {"S1": 20}}},
			"serviceability": {
				"N1": {"mode": "ONLY_SERVED", "servedSingles": [110001, 110002], "exceptSingles": [110002]}
			},
			"oda": {}
		}"#
	}

	#[test]
	fn build_carrier_applies_exception_subtraction_at_query_time() {
		let zones = sample_zones();
		let file = parse_utsf_str(sample_file()).unwrap();
		let carrier = build_carrier(file, &zones);
		assert!(carrier.services(110001));
		assert!(!carrier.services(110002), "110002 is explicitly excepted");
	}

	#[test]
	fn build_carrier_expands_full_zone_when_no_served_list() {
		let zones = sample_zones();
		let json = r#"{
			"meta": {"id": "c2", "companyName": "Beta Freight", "approvalStatus": "approved", "isVerified": true},
			"pricing": {"priceRate": {}, "zoneRates": {}},
			"serviceability": {"N1": {"mode": "FULL_ZONE"}},
			"oda": {}
		}"#;
		let file = parse_utsf_str(json).unwrap();
		let carrier = build_carrier(file, &zones);
		assert!(carrier.services(110001));
		assert!(carrier.services(110002));
	}

	#[test]
	fn strict_integrity_mode_disables_full_zone_expansion() {
		let zones = sample_zones();
		let json = r#"{
			"meta": {"id": "c3", "companyName": "Gamma Shipping", "approvalStatus": "approved", "isVerified": true, "integrityMode": "STRICT"},
			"pricing": {"priceRate": {}, "zoneRates": {}},
			"serviceability": {"N1": {"mode": "FULL_ZONE", "servedSingles": [110001]}},
			"oda": {}
		}"#;
		let file = parse_utsf_str(json).unwrap();
		let carrier = build_carrier(file, &zones);
		assert!(carrier.services(110001), "explicitly listed pincode must remain serviceable");
		assert!(!carrier.services(110002), "strict mode must not expand to the rest of the zone");
	}

	#[tokio::test]
	async fn load_dir_reads_utsf_files_from_disk() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("c1.utsf.json"), sample_file()).unwrap();
		let zones = Arc::new(sample_zones());
		let registry = UTSFRegistry::load_dir(dir.path(), zones).await.unwrap();
		assert_eq!(registry.all().len(), 1);
		assert!(registry.by_id("c1").is_some());
	}
}
