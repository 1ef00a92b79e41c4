//! Quote, charge breakdown, and Smart Shield flag types.

use serde::{Deserialize, Serialize};

/// A single named line item in a quote's charge breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeLine {
	pub name: String,
	pub amount: f64,
}

/// The exact constants `FreightCalculator` used to derive a quote, echoed back so a
/// caller (or a later audit) can see how the total was produced without
/// re-deriving it from the carrier's raw pricing contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaParams {
	pub origin_zone: String,
	pub destination_zone: String,
	pub actual_weight_kg: f64,
	pub volumetric_weight_kg: f64,
	pub chargeable_weight_kg: f64,
	pub k_factor: u32,
	pub fuel_pct: f64,
	pub docket_charge: f64,
	pub rov_pct: f64,
	pub rov_fixed: f64,
	pub min_charges: f64,
	pub oda_mode: Option<String>,
	pub unit_price: f64,
	pub base_freight: f64,
	pub effective_base_freight: f64,
}

/// Where a quote's carrier data came from; used by `SmartShield`'s
/// `NO_VENDOR_ID` check and by provenance-sensitive callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
	Utsf,
	Database,
}

/// Severity of a raised [`ShieldFlag`]. `Error` flags mark a quote as untrustworthy;
/// `Warning` and `Info` are surfaced but never remove the quote from results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Error,
	Warning,
	Info,
}

/// A single anomaly raised against a quote by `SmartShield`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldFlag {
	pub code: ShieldFlagCode,
	pub severity: Severity,
	pub message: String,
	#[serde(default)]
	pub field: Option<String>,
	#[serde(default)]
	pub value: Option<f64>,
}

/// The catalogue of anomaly codes `SmartShield` can raise against a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShieldFlagCode {
	NanTotal,
	NegativeTotal,
	NegativeBase,
	WeightMismatch,
	ExtremeVolumetric,
	NearZeroWeight,
	MinChargesApplied,
	HighUnitPrice,
	ZeroUnitPrice,
	SuspiciouslyCheap,
	SuspiciouslyExpensive,
	HighFuelRatio,
	HighOdaRatio,
	HighHandlingRatio,
	HighRovRatio,
	HighInsuranceRatio,
	HighMiscRatio,
	PhantomCharges,
	TotalMismatch,
	NoVendorId,
	OutlierCheap,
	OutlierExpensive,
}

/// A complete, itemised quote from one carrier for one shipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
	pub carrier_id: String,
	pub carrier_name: String,
	pub source: QuoteSource,
	pub charges: Vec<ChargeLine>,
	pub total_charges: f64,
	pub total_charges_without_invoice_addon: f64,
	pub formula_params: FormulaParams,
	#[serde(default)]
	pub flags: Vec<ShieldFlag>,
	#[serde(default)]
	pub health_score: f64,
}

impl Quote {
	/// Whether any raised flag is `Error` severity.
	pub fn has_critical_flags(&self) -> bool {
		self.flags.iter().any(|f| f.severity == Severity::Error)
	}

	/// Sum of `charges`, independent of the carried `total_charges`. `SmartShield`
	/// uses the mismatch between this and `total_charges` to raise `TOTAL_MISMATCH`.
	pub fn charges_sum(&self) -> f64 {
		self.charges.iter().map(|c| c.amount).sum()
	}

	/// Counts of raised flags by severity, used for both per-quote and overall scoring.
	pub fn flag_counts(&self) -> (usize, usize) {
		let errors = self.flags.iter().filter(|f| f.severity == Severity::Error).count();
		let warnings = self.flags.iter().filter(|f| f.severity == Severity::Warning).count();
		(errors, warnings)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_quote(total: f64, charges: Vec<f64>) -> Quote {
		Quote {
			carrier_id: "c1".into(),
			carrier_name: "Test".into(),
			source: QuoteSource::Utsf,
			charges: charges
				.into_iter()
				.enumerate()
				.map(|(i, amount)| ChargeLine { name: format!("c{i}"), amount })
				.collect(),
			total_charges: total,
			total_charges_without_invoice_addon: total,
			formula_params: FormulaParams {
				origin_zone: "NORTH".into(),
				destination_zone: "SOUTH".into(),
				actual_weight_kg: 1.0,
				volumetric_weight_kg: 1.0,
				chargeable_weight_kg: 1.0,
				k_factor: 5000,
				fuel_pct: 0.0,
				docket_charge: 0.0,
				rov_pct: 0.0,
				rov_fixed: 0.0,
				min_charges: 0.0,
				oda_mode: None,
				unit_price: 20.0,
				base_freight: 20.0,
				effective_base_freight: 20.0,
			},
			flags: vec![],
			health_score: 1.0,
		}
	}

	#[test]
	fn charges_sum_matches_manual_total() {
		let quote = sample_quote(150.0, vec![100.0, 50.0]);
		assert_eq!(quote.charges_sum(), 150.0);
	}

	#[test]
	fn critical_flag_detection() {
		let mut quote = sample_quote(100.0, vec![100.0]);
		assert!(!quote.has_critical_flags());
		quote.flags.push(ShieldFlag {
			code: ShieldFlagCode::NegativeTotal,
			severity: Severity::Error,
			message: "total below zero".into(),
			field: Some("total_charges".into()),
			value: Some(-1.0),
		});
		assert!(quote.has_critical_flags());
	}

	#[test]
	fn flag_counts_separate_errors_and_warnings() {
		let mut quote = sample_quote(100.0, vec![100.0]);
		quote.flags.push(ShieldFlag {
			code: ShieldFlagCode::NoVendorId,
			severity: Severity::Error,
			message: "missing vendor id".into(),
			field: None,
			value: None,
		});
		quote.flags.push(ShieldFlag {
			code: ShieldFlagCode::HighUnitPrice,
			severity: Severity::Warning,
			message: "unit price above threshold".into(),
			field: None,
			value: Some(600.0),
		});
		assert_eq!(quote.flag_counts(), (1, 1));
	}
}
