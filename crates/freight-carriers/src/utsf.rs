//! Parsing for `*.utsf.json` carrier catalog files.
//!
//! Field names in the wild mix camelCase and snake_case for the range/singles
//! arrays; every such field accepts both via `#[serde(alias = ...)]`.

use freight_types::carrier::{
	ApprovalStatus, CarrierPricing, IntegrityMode, OdaMode, PriceRateConfig, ZoneServiceMode,
};
use freight_types::domain::PincodeRange;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A pincode range as written in a UTSF file: either a two-element array `[s, e]`
/// or an object with `s`/`e` (or `start`/`end`) fields.
#[derive(Debug, Clone, Copy)]
pub struct RawRange(pub PincodeRange);

impl Serialize for RawRange {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		[self.0.start, self.0.end].serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for RawRange {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Shape {
			Pair([u32; 2]),
			Object {
				#[serde(alias = "start", alias = "s")]
				start: u32,
				#[serde(alias = "end", alias = "e")]
				end: u32,
			},
		}

		let shape = Shape::deserialize(deserializer)?;
		Ok(match shape {
			Shape::Pair([s, e]) => RawRange(PincodeRange::new(s, e)),
			Shape::Object { start, end } => RawRange(PincodeRange::new(start, end)),
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtsfMeta {
	pub id: String,
	pub company_name: String,
	#[serde(default, alias = "customer_id")]
	pub customer_id: Option<String>,
	#[serde(default)]
	pub rating: f64,
	#[serde(default)]
	pub is_verified: bool,
	pub approval_status: ApprovalStatus,
	#[serde(default, alias = "integrity_mode")]
	pub integrity_mode: Option<IntegrityMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtsfZoneServiceability {
	#[serde(default)]
	pub mode: Option<ZoneServiceMode>,
	#[serde(default, alias = "except_ranges")]
	pub except_ranges: Vec<RawRange>,
	#[serde(default, alias = "except_singles")]
	pub except_singles: Vec<u32>,
	#[serde(default, alias = "served_ranges")]
	pub served_ranges: Vec<RawRange>,
	#[serde(default, alias = "served_singles")]
	pub served_singles: Vec<u32>,
	#[serde(default, alias = "soft_exclusions")]
	pub soft_exclusions: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtsfOda {
	#[serde(default, alias = "oda_ranges")]
	pub oda_ranges: Vec<RawRange>,
	#[serde(default, alias = "oda_singles")]
	pub oda_singles: Vec<u32>,
	#[serde(default)]
	pub mode: Option<OdaMode>,
	#[serde(default)]
	pub fixed: f64,
	#[serde(default)]
	pub variable: f64,
	#[serde(default, alias = "threshold_weight_kg")]
	pub threshold_weight_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtsfPricing {
	#[serde(default)]
	pub price_rate: PriceRateConfig,
	#[serde(default)]
	pub zone_rates: HashMap<String, HashMap<String, f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtsfFile {
	pub meta: UtsfMeta,
	#[serde(default)]
	pub zone_overrides: HashMap<String, String>,
	pub pricing: UtsfPricing,
	#[serde(default)]
	pub serviceability: HashMap<String, UtsfZoneServiceability>,
	#[serde(default)]
	pub oda: HashMap<String, UtsfOda>,
}

/// Parses a UTSF file's raw JSON text without yet building the quotable
/// `freight_types::Carrier` index (see [`crate::registry::build_carrier`]).
pub fn parse_utsf_str(raw: &str) -> Result<UtsfFile, serde_json::Error> {
	serde_json::from_str(raw)
}

/// Carrier pricing as read verbatim out of a UTSF file (no compound-charge
/// structure beyond what §3 defines is present at the top level; ROV/insurance/
/// FM/appointment/handling/invoice/surcharges are read from sibling keys of
/// `pricing` on richer files). For the common case this produces a
/// `CarrierPricing` with only the rate table and base knobs populated; callers
/// that need the full compound-charge set parse those sections directly off the
/// deserialized `serde_json::Value` before calling this, see
/// [`crate::registry::UTSFRegistry::load_dir`].
pub fn build_pricing(pricing: &UtsfPricing) -> CarrierPricing {
	CarrierPricing {
		zone_rates: pricing.zone_rates.clone(),
		price_rate: pricing.price_rate.clone(),
		..Default::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_array_and_object_ranges() {
		let json = r#"{"a": [100, 200], "b": {"s": 10, "e": 20}, "c": {"start": 5, "end": 1}}"#;
		#[derive(Deserialize)]
		struct Wrapper {
			a: RawRange,
			b: RawRange,
			c: RawRange,
		}
		let w: Wrapper = serde_json::from_str(json).unwrap();
		assert_eq!(w.a.0, PincodeRange::new(100, 200));
		assert_eq!(w.b.0, PincodeRange::new(10, 20));
		assert_eq!(w.c.0, PincodeRange::new(1, 5));
	}

	#[test]
	fn accepts_snake_case_and_camel_case_keys() {
		let json = r#"{
			"mode": "ONLY_SERVED",
			"except_ranges": [[1,2]],
			"servedSingles": [500001]
		}"#;
		let parsed: UtsfZoneServiceability = serde_json::from_str(json).unwrap();
		assert_eq!(parsed.except_ranges.len(), 1);
		assert_eq!(parsed.served_singles, vec![500001]);
	}
}
