//! `SmartShield`: anomaly detection over a batch of quotes from `QuoteEngine`.
//!
//! Every check here is advisory. `SmartShield` never removes a quote from the
//! response — it only annotates it with flags and a health score, and
//! computes a cohort-level summary an operator can act on. Flags of `Error`
//! severity mark a quote untrustworthy but the caller still decides whether
//! to show it.

use freight_types::api::{CalculateDebugInfo, SmartShieldSummary};
use freight_types::quote::{Quote, Severity, ShieldFlag, ShieldFlagCode};
use std::collections::HashMap;

const SUSPICIOUSLY_CHEAP_THRESHOLD: f64 = 50.0;
const SUSPICIOUSLY_EXPENSIVE_THRESHOLD: f64 = 5_000_000.0;
const HIGH_UNIT_PRICE_THRESHOLD: f64 = 500.0;
const EXTREME_VOLUMETRIC_RATIO: f64 = 100.0;
const NEAR_ZERO_WEIGHT: f64 = 0.01;
const OUTLIER_CHEAP_RATIO: f64 = 0.20;
const OUTLIER_EXPENSIVE_RATIO: f64 = 5.0;
const MIN_COHORT_SIZE: usize = 3;

fn flag(code: ShieldFlagCode, severity: Severity, message: impl Into<String>, field: Option<&str>, value: Option<f64>) -> ShieldFlag {
	ShieldFlag { code, severity, message: message.into(), field: field.map(str::to_string), value }
}

/// Runs every per-quote check against a single quote, mutating its `flags`
/// and `health_score` in place.
pub fn evaluate_quote(quote: &mut Quote) {
	let mut flags = Vec::new();
	let params = &quote.formula_params;
	let total = quote.total_charges;
	let base = params.base_freight;

	if total.is_nan() {
		flags.push(flag(ShieldFlagCode::NanTotal, Severity::Error, "total charges is NaN", Some("total_charges"), None));
	} else if total < 0.0 {
		flags.push(flag(ShieldFlagCode::NegativeTotal, Severity::Error, "total charges is negative", Some("total_charges"), Some(total)));
	}
	if base < 0.0 {
		flags.push(flag(ShieldFlagCode::NegativeBase, Severity::Error, "base freight is negative", Some("base_freight"), Some(base)));
	}

	let expected_chargeable = params.actual_weight_kg.max(params.volumetric_weight_kg);
	let diff = (params.chargeable_weight_kg - expected_chargeable).abs();
	if diff > 0.5 && expected_chargeable > 0.0 && diff / expected_chargeable > 0.01 {
		flags.push(flag(
			ShieldFlagCode::WeightMismatch,
			Severity::Warning,
			"chargeable weight does not match max(actual, volumetric)",
			Some("chargeable_weight_kg"),
			Some(params.chargeable_weight_kg),
		));
	}

	if params.actual_weight_kg > 0.0 && params.volumetric_weight_kg / params.actual_weight_kg > EXTREME_VOLUMETRIC_RATIO {
		flags.push(flag(ShieldFlagCode::ExtremeVolumetric, Severity::Warning, "volumetric weight is over 100x actual weight", Some("volumetric_weight_kg"), Some(params.volumetric_weight_kg)));
	}

	if params.chargeable_weight_kg < NEAR_ZERO_WEIGHT {
		flags.push(flag(ShieldFlagCode::NearZeroWeight, Severity::Warning, "chargeable weight is near zero", Some("chargeable_weight_kg"), Some(params.chargeable_weight_kg)));
	}

	if params.effective_base_freight > base {
		flags.push(flag(ShieldFlagCode::MinChargesApplied, Severity::Info, "minimum charges floor was applied", Some("effective_base_freight"), Some(params.effective_base_freight)));
	}

	if params.unit_price > HIGH_UNIT_PRICE_THRESHOLD {
		flags.push(flag(ShieldFlagCode::HighUnitPrice, Severity::Warning, "unit price exceeds 500/kg", Some("unit_price"), Some(params.unit_price)));
	}
	if params.unit_price == 0.0 && total != 0.0 {
		flags.push(flag(ShieldFlagCode::ZeroUnitPrice, Severity::Warning, "unit price is zero but total charges is nonzero", Some("unit_price"), Some(0.0)));
	}

	if total < SUSPICIOUSLY_CHEAP_THRESHOLD {
		flags.push(flag(ShieldFlagCode::SuspiciouslyCheap, Severity::Warning, "total charges is suspiciously low", Some("total_charges"), Some(total)));
	}
	if total > SUSPICIOUSLY_EXPENSIVE_THRESHOLD {
		flags.push(flag(ShieldFlagCode::SuspiciouslyExpensive, Severity::Warning, "total charges is suspiciously high", Some("total_charges"), Some(total)));
	}

	if base > 0.0 {
		check_ratio(&mut flags, quote, "fuel", base, 0.50, ShieldFlagCode::HighFuelRatio);
		check_ratio(&mut flags, quote, "oda", base, 1.00, ShieldFlagCode::HighOdaRatio);
		check_ratio(&mut flags, quote, "handling", base, 0.40, ShieldFlagCode::HighHandlingRatio);
		check_ratio(&mut flags, quote, "rov", base, 0.30, ShieldFlagCode::HighRovRatio);
		check_ratio(&mut flags, quote, "insurance", base, 0.20, ShieldFlagCode::HighInsuranceRatio);
		check_ratio(&mut flags, quote, "miscellaneous", base, 0.30, ShieldFlagCode::HighMiscRatio);
	}

	let all_fixed_are_zero = quote.charges.iter().all(|c| c.name == "base_freight" || c.amount == 0.0);
	if base == 0.0 && total > 0.0 && all_fixed_are_zero {
		flags.push(flag(ShieldFlagCode::PhantomCharges, Severity::Error, "total charges is nonzero with no base freight and no fixed charges", Some("total_charges"), Some(total)));
	}

	let reported_vs_parts = (total - quote.charges_sum()).abs();
	if reported_vs_parts > (2.0_f64).max(0.01 * total) {
		flags.push(flag(ShieldFlagCode::TotalMismatch, Severity::Warning, "total charges does not match the sum of charge lines", Some("total_charges"), Some(reported_vs_parts)));
	}

	if quote.carrier_id.trim().is_empty() {
		flags.push(flag(ShieldFlagCode::NoVendorId, Severity::Error, "quote has no carrier id", Some("carrier_id"), None));
	}

	let (errors, warnings) = count_severities(&flags);
	quote.health_score = (1.0 - 0.3 * errors as f64 - 0.1 * warnings as f64).max(0.0);
	quote.flags = flags;
}

fn check_ratio(flags: &mut Vec<ShieldFlag>, quote: &Quote, charge_name: &str, base: f64, threshold_ratio: f64, code: ShieldFlagCode) {
	let Some(charge) = quote.charges.iter().find(|c| c.name == charge_name) else { return };
	let ratio = charge.amount / base;
	if ratio > threshold_ratio {
		flags.push(flag(
			code,
			Severity::Warning,
			format!("{charge_name} charge exceeds {:.0}% of base freight", threshold_ratio * 100.0),
			Some(charge_name),
			Some(ratio),
		));
	}
}

fn count_severities(flags: &[ShieldFlag]) -> (usize, usize) {
	let errors = flags.iter().filter(|f| f.severity == Severity::Error).count();
	let warnings = flags.iter().filter(|f| f.severity == Severity::Warning).count();
	(errors, warnings)
}

/// Runs per-quote checks over every quote in both result sets, then the
/// cohort median-outlier check across their combined valid totals, and
/// produces the aggregate summary attached to a `CalculateResponse`.
pub fn evaluate_batch(tied_up: &mut [Quote], public: &mut [Quote]) -> SmartShieldSummary {
	for quote in tied_up.iter_mut().chain(public.iter_mut()) {
		evaluate_quote(quote);
	}

	let cohort_flags = evaluate_cohort(tied_up, public);

	let mut quote_flags: HashMap<String, Vec<ShieldFlag>> = HashMap::new();
	for quote in tied_up.iter().chain(public.iter()) {
		if !quote.flags.is_empty() {
			quote_flags.insert(quote.carrier_id.clone(), quote.flags.clone());
		}
	}

	let total_errors: usize = tied_up.iter().chain(public.iter()).map(|q| q.flag_counts().0).sum::<usize>()
		+ cohort_flags.iter().filter(|f| f.severity == Severity::Error).count();
	let total_warnings: usize = tied_up.iter().chain(public.iter()).map(|q| q.flag_counts().1).sum::<usize>()
		+ cohort_flags.iter().filter(|f| f.severity == Severity::Warning).count();

	let overall_score = (1.0 - 0.15 * total_errors as f64 - 0.05 * total_warnings as f64).max(0.0);
	let summary = if total_errors > 0 {
		format!("{total_errors} error-level anomalies found across {} quotes", tied_up.len() + public.len())
	} else if total_warnings > 0 {
		format!("{total_warnings} warning-level anomalies found across {} quotes", tied_up.len() + public.len())
	} else {
		"no anomalies detected".to_string()
	};

	SmartShieldSummary { overall_score, summary, cohort_flags, quote_flags }
}

fn evaluate_cohort(tied_up: &[Quote], public: &[Quote]) -> Vec<ShieldFlag> {
	let mut totals: Vec<f64> = tied_up
		.iter()
		.chain(public.iter())
		.map(|q| q.total_charges)
		.filter(|t| t.is_finite() && *t >= 0.0)
		.collect();

	if totals.len() < MIN_COHORT_SIZE {
		return Vec::new();
	}

	totals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
	let median = median_of(&totals);
	if median <= 0.0 {
		return Vec::new();
	}

	let mut cohort_flags = Vec::new();
	for quote in tied_up.iter().chain(public.iter()) {
		if !quote.total_charges.is_finite() || quote.total_charges < 0.0 {
			continue;
		}
		if quote.total_charges < OUTLIER_CHEAP_RATIO * median {
			cohort_flags.push(flag(
				ShieldFlagCode::OutlierCheap,
				Severity::Warning,
				format!("{} total charges is under 20% of the cohort median ({median:.2})", quote.carrier_id),
				Some("total_charges"),
				Some(quote.total_charges),
			));
		} else if quote.total_charges > OUTLIER_EXPENSIVE_RATIO * median {
			cohort_flags.push(flag(
				ShieldFlagCode::OutlierExpensive,
				Severity::Warning,
				format!("{} total charges is over 5x the cohort median ({median:.2})", quote.carrier_id),
				Some("total_charges"),
				Some(quote.total_charges),
			));
		}
	}
	cohort_flags
}

fn median_of(sorted: &[f64]) -> f64 {
	let mid = sorted.len() / 2;
	if sorted.len() % 2 == 0 {
		(sorted[mid - 1] + sorted[mid]) / 2.0
	} else {
		sorted[mid]
	}
}

/// Builds the `debug` block attached to a `CalculateResponse`.
pub fn debug_info(carriers_considered: usize, carriers_priced: usize) -> CalculateDebugInfo {
	CalculateDebugInfo {
		carriers_considered,
		carriers_priced,
		carriers_dropped: carriers_considered.saturating_sub(carriers_priced),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use freight_types::quote::{ChargeLine, FormulaParams, QuoteSource};

	fn base_params() -> FormulaParams {
		FormulaParams {
			origin_zone: "N1".into(),
			destination_zone: "S1".into(),
			actual_weight_kg: 2.0,
			volumetric_weight_kg: 2.0,
			chargeable_weight_kg: 2.0,
			k_factor: 5000,
			fuel_pct: 0.0,
			docket_charge: 0.0,
			rov_pct: 0.0,
			rov_fixed: 0.0,
			min_charges: 0.0,
			oda_mode: None,
			unit_price: 20.0,
			base_freight: 40.0,
			effective_base_freight: 40.0,
		}
	}

	fn base_quote(total: f64) -> Quote {
		Quote {
			carrier_id: "c1".into(),
			carrier_name: "Acme".into(),
			source: QuoteSource::Utsf,
			charges: vec![ChargeLine { name: "base_freight".into(), amount: 40.0 }],
			total_charges: total,
			total_charges_without_invoice_addon: total,
			formula_params: base_params(),
			flags: vec![],
			health_score: 1.0,
		}
	}

	#[test]
	fn negative_total_is_flagged_as_error_and_tanks_health() {
		let mut quote = base_quote(-5.0);
		quote.charges = vec![ChargeLine { name: "base_freight".into(), amount: -5.0 }];
		evaluate_quote(&mut quote);
		assert!(quote.flags.iter().any(|f| f.code == ShieldFlagCode::NegativeTotal));
		assert!(quote.health_score < 1.0);
	}

	#[test]
	fn clean_quote_raises_no_flags() {
		let mut quote = base_quote(40.0);
		evaluate_quote(&mut quote);
		assert!(quote.flags.is_empty());
		assert_eq!(quote.health_score, 1.0);
	}

	#[test]
	fn suspiciously_cheap_total_is_flagged() {
		let mut quote = base_quote(10.0);
		quote.charges = vec![ChargeLine { name: "base_freight".into(), amount: 10.0 }];
		evaluate_quote(&mut quote);
		assert!(quote.flags.iter().any(|f| f.code == ShieldFlagCode::SuspiciouslyCheap));
	}

	#[test]
	fn cohort_outlier_detection_needs_at_least_three_quotes() {
		let mut tied_up = vec![base_quote(100.0), base_quote(110.0)];
		let mut public = vec![];
		let summary = evaluate_batch(&mut tied_up, &mut public);
		assert!(summary.cohort_flags.is_empty());
	}

	#[test]
	fn cohort_outlier_detection_flags_extreme_totals() {
		let mut tied_up = vec![base_quote(100.0), base_quote(110.0), base_quote(105.0)];
		let mut public = vec![base_quote(1.0), base_quote(10_000.0)];
		let summary = evaluate_batch(&mut tied_up, &mut public);
		let codes: Vec<_> = summary.cohort_flags.iter().map(|f| f.code).collect();
		assert!(codes.contains(&ShieldFlagCode::OutlierCheap));
		assert!(codes.contains(&ShieldFlagCode::OutlierExpensive));
	}
}
