//! Carrier pricing contracts and serviceability data.
//!
//! A [`Carrier`] bundles three independent concerns: whether it is allowed to quote
//! at all (`approval_status`, `is_verified`), where it can deliver
//! (`serviceability`, `zone_overrides`), and how it prices a shipment it can
//! deliver (`pricing`). `FreightCalculator` only ever reads `pricing`; the rest is
//! `CarrierResolver`'s concern.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{PincodeRange, Zone};

/// Whether a carrier has been approved to appear in quote results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
	Pending,
	Approved,
	Rejected,
	Draft,
}

impl ApprovalStatus {
	pub fn is_approved(&self) -> bool {
		matches!(self, ApprovalStatus::Approved)
	}

	/// `DBCarrierSource` restricts its query to `approved` or `missing` (absent)
	/// status; this covers the `approved` half of that test.
	pub fn is_approved_or_pending(&self) -> bool {
		matches!(self, ApprovalStatus::Approved | ApprovalStatus::Pending)
	}
}

/// Whether serviceability lookups trust zone-wide expansion (`None`) or only the
/// explicitly served set (`Strict`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntegrityMode {
	Strict,
	None,
}

impl Default for IntegrityMode {
	fn default() -> Self {
		IntegrityMode::None
	}
}

/// Per-zone serviceability mode for a carrier, before exceptions are subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneServiceMode {
	FullZone,
	FullMinusExceptions,
	OnlyServed,
	NotServed,
}

/// Out-of-delivery-area handling mode for a pincode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OdaMode {
	/// Flat plus per-kg surcharge applied on top of the otherwise-normal quote.
	Legacy,
	/// Above a weight threshold the whole shipment is charged per-kg; below it, flat.
	Switch,
	/// Surcharge is excess-weight-based, applied only above a free-weight threshold.
	Excess,
}

/// A single ODA pincode entry: the range it applies to, and the charging mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdaEntry {
	pub range: PincodeRange,
	pub mode: OdaMode,
	#[serde(default)]
	pub fixed: f64,
	#[serde(default)]
	pub variable: f64,
	#[serde(default)]
	pub threshold_weight_kg: f64,
}

/// Raw per-zone serviceability declaration as read from a UTSF file, before
/// `UTSFRegistry` expands it against the master pincode catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneServiceability {
	#[serde(default)]
	pub mode: Option<ZoneServiceMode>,
	#[serde(default)]
	pub except_ranges: Vec<PincodeRange>,
	#[serde(default)]
	pub except_singles: Vec<u32>,
	#[serde(default)]
	pub served_ranges: Vec<PincodeRange>,
	#[serde(default)]
	pub served_singles: Vec<u32>,
	#[serde(default)]
	pub soft_exclusions: Vec<u32>,
}

/// Expanded, O(1)-queryable serviceability data for one carrier: the global
/// exception set, the served set, and the ODA index, built once at load time
/// by `UTSFRegistry`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Serviceability {
	#[serde(default)]
	pub exceptions: Vec<PincodeRange>,
	#[serde(default)]
	pub served: Vec<PincodeRange>,
	#[serde(default)]
	pub oda: Vec<OdaEntry>,
}

/// An explicit zone reassignment for a pincode range, overriding whatever zone the
/// master pincode file would otherwise resolve it to for this carrier's rate lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneOverride {
	pub range: PincodeRange,
	pub zone: Zone,
}

/// Base shipment-wide pricing knobs, mirroring a UTSF file's `priceRate` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRateConfig {
	#[serde(default)]
	pub min_weight_kg: f64,
	/// Volumetric divisor; aliased as `kFactor` in source files. Defaults to 5000.
	#[serde(default = "default_divisor")]
	pub divisor: u32,
	/// Minimum base freight (aliased `minBaseFreight`).
	#[serde(default)]
	pub min_charges: f64,
	#[serde(default)]
	pub min_total_charges: Option<f64>,
	#[serde(default)]
	pub min_charges_apply_to_total: bool,
	#[serde(default)]
	pub docket_charges: f64,
	/// Fuel surcharge percentage of `baseFreight`.
	#[serde(default)]
	pub fuel_pct: f64,
	/// Rupee cap on the fuel surcharge; `None` means uncapped.
	#[serde(default)]
	pub fuel_max: Option<f64>,
	#[serde(default)]
	pub green_tax: f64,
	#[serde(default)]
	pub dacc_charges: f64,
	#[serde(default)]
	pub miscellaneous_charges: f64,
}

fn default_divisor() -> u32 {
	5000
}

impl Default for PriceRateConfig {
	fn default() -> Self {
		Self {
			min_weight_kg: 0.0,
			divisor: default_divisor(),
			min_charges: 0.0,
			min_total_charges: None,
			min_charges_apply_to_total: false,
			docket_charges: 0.0,
			fuel_pct: 0.0,
			fuel_max: None,
			green_tax: 0.0,
			dacc_charges: 0.0,
			miscellaneous_charges: 0.0,
		}
	}
}

/// A charge that compounds on top of `baseFreight`: `max((variable/100)*baseFreight, fixed)`.
/// Used for ROV, insurance, FM, and appointment charges.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CompoundCharge {
	#[serde(default)]
	pub fixed: f64,
	#[serde(default)]
	pub variable: f64,
}

/// Handling charge: a fixed component plus a percentage applied to weight above a
/// threshold.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HandlingCharges {
	#[serde(default)]
	pub fixed: f64,
	#[serde(default)]
	pub variable: f64,
	#[serde(default)]
	pub threshold_weight_kg: f64,
}

/// Surcharge applied on a shipment's declared invoice value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InvoiceValueCharges {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default)]
	pub percentage: f64,
	#[serde(default)]
	pub minimum_amount: f64,
}

/// How a [`Surcharge`]'s amount is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurchargeFormula {
	PctOfBase,
	PctOfSubtotal,
	Flat,
	PerKg,
	MaxFlatPkg,
}

/// A single named, orderable surcharge in a carrier's pricing contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Surcharge {
	pub id: String,
	pub label: String,
	pub formula: SurchargeFormula,
	pub value: f64,
	#[serde(default)]
	pub value2: Option<f64>,
	#[serde(default)]
	pub order: i32,
	#[serde(default = "default_true")]
	pub enabled: bool,
}

fn default_true() -> bool {
	true
}

/// Complete pricing contract for a carrier: how to turn a shipment and a
/// resolved origin/destination zone pair into an itemised quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarrierPricing {
	/// `zoneRates[originZone][destZone] = unitPricePerKg`; missing pair = not priced.
	#[serde(default)]
	pub zone_rates: HashMap<String, HashMap<String, f64>>,
	#[serde(default)]
	pub price_rate: PriceRateConfig,
	#[serde(default)]
	pub rov_charges: CompoundCharge,
	#[serde(default)]
	pub insurance_charges: CompoundCharge,
	#[serde(default)]
	pub fm_charges: CompoundCharge,
	#[serde(default)]
	pub appointment_charges: CompoundCharge,
	#[serde(default)]
	pub handling_charges: HandlingCharges,
	#[serde(default)]
	pub invoice_value_charges: InvoiceValueCharges,
	#[serde(default)]
	pub surcharges: Vec<Surcharge>,
}

impl CarrierPricing {
	/// Looks up the per-kg unit price for an origin/destination zone pair.
	/// Case-insensitive; tries both directions before giving up. `None` means
	/// this carrier does not price the route at all and must be skipped.
	pub fn rate_for(&self, origin: &Zone, destination: &Zone) -> Option<f64> {
		self.lookup_direction(origin, destination)
			.or_else(|| self.lookup_direction(destination, origin))
	}

	fn lookup_direction(&self, from: &Zone, to: &Zone) -> Option<f64> {
		self.zone_rates
			.iter()
			.find(|(k, _)| k.eq_ignore_ascii_case(from.as_str()))
			.and_then(|(_, dest_map)| {
				dest_map
					.iter()
					.find(|(k, _)| k.eq_ignore_ascii_case(to.as_str()))
					.map(|(_, rate)| *rate)
			})
	}
}

/// A carrier as loaded from a UTSF file or the document-store fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carrier {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub owner_customer_id: Option<String>,
	pub approval_status: ApprovalStatus,
	#[serde(default)]
	pub is_verified: bool,
	#[serde(default)]
	pub integrity_mode: IntegrityMode,
	#[serde(default)]
	pub serviceability: Serviceability,
	#[serde(default)]
	pub zone_overrides: Vec<ZoneOverride>,
	pub pricing: CarrierPricing,
}

impl Carrier {
	/// Whether this carrier is eligible to appear in quote results at all,
	/// independent of whether it services a particular pincode.
	pub fn is_eligible(&self) -> bool {
		self.approval_status.is_approved() && self.is_verified
	}

	/// Resolves any zone override that applies to `pincode`, if one is configured.
	pub fn zone_override_for(&self, pincode: u32) -> Option<&Zone> {
		self.zone_overrides
			.iter()
			.find(|o| o.range.contains(pincode))
			.map(|o| &o.zone)
	}

	/// Whether `pincode` is explicitly excluded regardless of the served ranges.
	pub fn is_excepted(&self, pincode: u32) -> bool {
		self.serviceability.exceptions.iter().any(|r| r.contains(pincode))
	}

	/// Whether `pincode` falls within a served range and is not excepted.
	///
	/// `integrity_mode == Strict` disables `FULL_ZONE`/`FULL_MINUS_EXCEPTIONS`
	/// expansion to a zone's master pincode list at index-build time, so
	/// `served` here already contains only the explicitly listed pincodes for
	/// a strict carrier; this check itself is mode-agnostic.
	pub fn services(&self, pincode: u32) -> bool {
		!self.is_excepted(pincode) && self.serviceability.served.iter().any(|r| r.contains(pincode))
	}

	/// Returns the ODA entry covering `pincode`, if the pincode is out-of-delivery-area.
	pub fn oda_entry_for(&self, pincode: u32) -> Option<&OdaEntry> {
		self.serviceability.oda.iter().find(|e| e.range.contains(pincode))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_pricing() -> CarrierPricing {
		let mut dest_map = HashMap::new();
		dest_map.insert("S1".to_string(), 20.0);
		let mut zone_rates = HashMap::new();
		zone_rates.insert("N1".to_string(), dest_map);

		CarrierPricing { zone_rates, ..Default::default() }
	}

	fn sample_carrier() -> Carrier {
		Carrier {
			id: "c1".into(),
			name: "Test Carrier".into(),
			owner_customer_id: None,
			approval_status: ApprovalStatus::Approved,
			is_verified: true,
			integrity_mode: IntegrityMode::Strict,
			serviceability: Serviceability {
				exceptions: vec![PincodeRange::new(110010, 110010)],
				served: vec![PincodeRange::new(110000, 110099)],
				oda: vec![],
			},
			zone_overrides: vec![],
			pricing: sample_pricing(),
		}
	}

	#[test]
	fn eligible_requires_approved_and_verified() {
		let mut carrier = sample_carrier();
		assert!(carrier.is_eligible());
		carrier.is_verified = false;
		assert!(!carrier.is_eligible());
	}

	#[test]
	fn serviceability_respects_exceptions() {
		let carrier = sample_carrier();
		assert!(carrier.services(110050));
		assert!(!carrier.services(110010));
		assert!(!carrier.services(999999));
	}

	#[test]
	fn rate_lookup_is_case_insensitive_and_bidirectional() {
		let carrier = sample_carrier();
		assert_eq!(carrier.pricing.rate_for(&Zone::new("n1"), &Zone::new("s1")), Some(20.0));
		// Reverse direction also resolves.
		assert_eq!(carrier.pricing.rate_for(&Zone::new("S1"), &Zone::new("N1")), Some(20.0));
		assert_eq!(carrier.pricing.rate_for(&Zone::new("X9"), &Zone::new("Y9")), None);
	}
}
