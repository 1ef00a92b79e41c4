//! `FreightCalculator`: the pure per-carrier pricing function.
//!
//! Given a carrier's pricing contract, a resolved origin/destination zone pair,
//! and a shipment's pre-computed volumetric weights, this module derives an
//! itemised [`Quote`]. It has no I/O and no knowledge of serviceability,
//! caching, or anomaly detection — those are `CarrierResolver`, `ResultCache`,
//! and `SmartShield`'s concerns respectively.

use freight_types::carrier::{Carrier, OdaEntry, OdaMode, Surcharge, SurchargeFormula};
use freight_types::domain::Zone;
use freight_types::quote::{ChargeLine, FormulaParams, Quote, QuoteSource};
use freight_types::shipment::VolumetricWeights;
use freight_types::utils::round_half_up;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalcError {
	/// No rate on file for either direction of the zone pair; the carrier must
	/// be dropped from results rather than surfaced as a user-facing error.
	#[error("no rate configured for {origin} -> {destination}")]
	NoRateForRoute { origin: String, destination: String },
}

/// Everything `FreightCalculator` needs about the route beyond the carrier's
/// own pricing contract.
pub struct RouteContext<'a> {
	pub origin_zone: &'a Zone,
	pub destination_zone: &'a Zone,
	pub actual_weight_kg: f64,
	pub volumetric_weights: &'a VolumetricWeights,
	pub invoice_value: f64,
	pub oda_entry: Option<&'a OdaEntry>,
}

/// Computes a full itemised quote for one carrier against one route. Pure and
/// deterministic: the same inputs always produce the same output.
pub fn calculate(carrier: &Carrier, source: QuoteSource, route: &RouteContext<'_>) -> Result<Quote, CalcError> {
	let pricing = &carrier.pricing;
	let unit_price = pricing.rate_for(route.origin_zone, route.destination_zone).ok_or_else(|| {
		CalcError::NoRateForRoute {
			origin: route.origin_zone.to_string(),
			destination: route.destination_zone.to_string(),
		}
	})?;

	let divisor = pricing.price_rate.divisor;
	let volumetric_weight_kg = route.volumetric_weights.for_divisor_value(divisor);
	let chargeable_weight_kg = route.actual_weight_kg.max(volumetric_weight_kg);

	let effective_weight = if pricing.price_rate.min_weight_kg > chargeable_weight_kg {
		pricing.price_rate.min_weight_kg
	} else {
		chargeable_weight_kg
	};
	let base_freight = unit_price * effective_weight;
	let effective_base_freight = if pricing.price_rate.min_charges_apply_to_total {
		base_freight
	} else {
		base_freight.max(pricing.price_rate.min_charges)
	};

	let mut charges = Vec::new();
	charges.push(ChargeLine { name: "base_freight".into(), amount: round_half_up(effective_base_freight) });

	if pricing.price_rate.docket_charges != 0.0 {
		charges.push(ChargeLine { name: "docket".into(), amount: round_half_up(pricing.price_rate.docket_charges) });
	}

	let fuel = (pricing.price_rate.fuel_pct / 100.0 * base_freight).min(pricing.price_rate.fuel_max.unwrap_or(f64::INFINITY));
	if fuel != 0.0 {
		charges.push(ChargeLine { name: "fuel".into(), amount: round_half_up(fuel) });
	}

	push_compound(&mut charges, "rov", pricing.rov_charges.fixed, pricing.rov_charges.variable, base_freight);
	push_compound(&mut charges, "insurance", pricing.insurance_charges.fixed, pricing.insurance_charges.variable, base_freight);
	push_compound(&mut charges, "fm", pricing.fm_charges.fixed, pricing.fm_charges.variable, base_freight);
	push_compound(&mut charges, "appointment", pricing.appointment_charges.fixed, pricing.appointment_charges.variable, base_freight);

	let handling = pricing.handling_charges.fixed
		+ (chargeable_weight_kg - pricing.handling_charges.threshold_weight_kg).max(0.0)
			* (pricing.handling_charges.variable / 100.0);
	if handling != 0.0 {
		charges.push(ChargeLine { name: "handling".into(), amount: round_half_up(handling) });
	}

	if pricing.price_rate.green_tax != 0.0 {
		charges.push(ChargeLine { name: "green_tax".into(), amount: round_half_up(pricing.price_rate.green_tax) });
	}
	if pricing.price_rate.dacc_charges != 0.0 {
		charges.push(ChargeLine { name: "dacc".into(), amount: round_half_up(pricing.price_rate.dacc_charges) });
	}
	if pricing.price_rate.miscellaneous_charges != 0.0 {
		charges.push(ChargeLine {
			name: "miscellaneous".into(),
			amount: round_half_up(pricing.price_rate.miscellaneous_charges),
		});
	}

	let oda_mode = route.oda_entry.map(|entry| {
		let oda_amount = oda_amount(entry, chargeable_weight_kg);
		if oda_amount != 0.0 {
			charges.push(ChargeLine { name: "oda".into(), amount: round_half_up(oda_amount) });
		}
		oda_mode_label(entry.mode)
	});

	let invoice_charge = if pricing.invoice_value_charges.enabled && route.invoice_value > 0.0 {
		round_half_up(
			(route.invoice_value * pricing.invoice_value_charges.percentage / 100.0)
				.max(pricing.invoice_value_charges.minimum_amount),
		)
	} else {
		0.0
	};
	if invoice_charge != 0.0 {
		charges.push(ChargeLine { name: "invoice_surcharge".into(), amount: invoice_charge });
	}

	// Custom surcharges apply last, in ascending `order`, after all standard
	// charges (the "subtotal" a PCT_OF_SUBTOTAL surcharge sees).
	let subtotal: f64 = charges.iter().map(|c| c.amount).sum();
	let mut ordered_surcharges: Vec<&Surcharge> = pricing.surcharges.iter().filter(|s| s.enabled).collect();
	ordered_surcharges.sort_by_key(|s| s.order);
	for surcharge in ordered_surcharges {
		let amount = surcharge_amount(surcharge, base_freight, subtotal, chargeable_weight_kg);
		charges.push(ChargeLine { name: surcharge.label.clone(), amount: round_half_up(amount) });
	}

	let mut total_charges: f64 = charges.iter().map(|c| c.amount).sum();
	if let Some(min_total) = pricing.price_rate.min_total_charges {
		if min_total > total_charges {
			total_charges = min_total;
		}
	}
	let total_charges_without_invoice_addon = round_half_up(total_charges - invoice_charge);

	Ok(Quote {
		carrier_id: carrier.id.clone(),
		carrier_name: carrier.name.clone(),
		source,
		charges,
		total_charges: round_half_up(total_charges),
		total_charges_without_invoice_addon,
		formula_params: FormulaParams {
			origin_zone: route.origin_zone.to_string(),
			destination_zone: route.destination_zone.to_string(),
			actual_weight_kg: route.actual_weight_kg,
			volumetric_weight_kg,
			chargeable_weight_kg,
			k_factor: divisor,
			fuel_pct: pricing.price_rate.fuel_pct,
			docket_charge: pricing.price_rate.docket_charges,
			rov_pct: pricing.rov_charges.variable,
			rov_fixed: pricing.rov_charges.fixed,
			min_charges: pricing.price_rate.min_charges,
			oda_mode,
			unit_price,
			base_freight,
			effective_base_freight,
		},
		flags: Vec::new(),
		health_score: 1.0,
	})
}

fn push_compound(charges: &mut Vec<ChargeLine>, name: &str, fixed: f64, variable: f64, base_freight: f64) {
	let amount = (variable / 100.0 * base_freight).max(fixed);
	if amount != 0.0 {
		charges.push(ChargeLine { name: name.to_string(), amount: round_half_up(amount) });
	}
}

fn oda_amount(entry: &OdaEntry, chargeable_weight_kg: f64) -> f64 {
	match entry.mode {
		OdaMode::Legacy => entry.fixed + chargeable_weight_kg * entry.variable / 100.0,
		OdaMode::Switch => {
			if chargeable_weight_kg > entry.threshold_weight_kg {
				entry.variable * chargeable_weight_kg
			} else {
				entry.fixed
			}
		}
		OdaMode::Excess => entry.fixed + (chargeable_weight_kg - entry.threshold_weight_kg).max(0.0) * entry.variable,
	}
}

fn oda_mode_label(mode: OdaMode) -> String {
	match mode {
		OdaMode::Legacy => "legacy",
		OdaMode::Switch => "switch",
		OdaMode::Excess => "excess",
	}
	.to_string()
}

fn surcharge_amount(surcharge: &Surcharge, base_freight: f64, subtotal: f64, chargeable_weight_kg: f64) -> f64 {
	match surcharge.formula {
		SurchargeFormula::PctOfBase => base_freight * surcharge.value / 100.0,
		SurchargeFormula::PctOfSubtotal => subtotal * surcharge.value / 100.0,
		SurchargeFormula::Flat => surcharge.value,
		SurchargeFormula::PerKg => surcharge.value * chargeable_weight_kg,
		SurchargeFormula::MaxFlatPkg => surcharge.value.max(surcharge.value2.unwrap_or(0.0) * chargeable_weight_kg),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use freight_types::carrier::{
		ApprovalStatus, CarrierPricing, CompoundCharge, HandlingCharges, IntegrityMode, InvoiceValueCharges,
		PriceRateConfig, Serviceability,
	};
	use std::collections::HashMap;

	fn sample_carrier() -> Carrier {
		let mut dest_map = HashMap::new();
		dest_map.insert("S1".to_string(), 20.0);
		let mut zone_rates = HashMap::new();
		zone_rates.insert("N1".to_string(), dest_map);

		Carrier {
			id: "c1".into(),
			name: "Acme".into(),
			owner_customer_id: None,
			approval_status: ApprovalStatus::Approved,
			is_verified: true,
			integrity_mode: IntegrityMode::None,
			serviceability: Serviceability::default(),
			zone_overrides: vec![],
			pricing: CarrierPricing {
				zone_rates,
				price_rate: PriceRateConfig { divisor: 5000, ..Default::default() },
				rov_charges: CompoundCharge { fixed: 10.0, variable: 0.0 },
				insurance_charges: CompoundCharge::default(),
				fm_charges: CompoundCharge::default(),
				appointment_charges: CompoundCharge::default(),
				handling_charges: HandlingCharges::default(),
				invoice_value_charges: InvoiceValueCharges::default(),
				surcharges: vec![],
			},
		}
	}

	fn sample_volumetric() -> VolumetricWeights {
		VolumetricWeights { at_4500: 1.0, at_5000: 1.0, at_5500: 1.0, at_6000: 1.0 }
	}

	#[test]
	fn missing_rate_is_skipped() {
		let carrier = sample_carrier();
		let weights = sample_volumetric();
		let route = RouteContext {
			origin_zone: &Zone::new("X9"),
			destination_zone: &Zone::new("Y9"),
			actual_weight_kg: 2.0,
			volumetric_weights: &weights,
			invoice_value: 1.0,
			oda_entry: None,
		};
		assert!(calculate(&carrier, QuoteSource::Utsf, &route).is_err());
	}

	#[test]
	fn basic_quote_sums_base_and_rov() {
		let carrier = sample_carrier();
		let weights = sample_volumetric();
		let route = RouteContext {
			origin_zone: &Zone::new("N1"),
			destination_zone: &Zone::new("S1"),
			actual_weight_kg: 2.0,
			volumetric_weights: &weights,
			invoice_value: 1.0,
			oda_entry: None,
		};
		let quote = calculate(&carrier, QuoteSource::Utsf, &route).unwrap();
		// base_freight = 20/kg * 2kg = 40; rov = max(0, 10) = 10.
		assert_eq!(quote.formula_params.base_freight, 40.0);
		assert_eq!(quote.total_charges, 50.0);
	}

	#[test]
	fn min_total_charges_floors_the_total() {
		let mut carrier = sample_carrier();
		carrier.pricing.price_rate.min_total_charges = Some(1000.0);
		let weights = sample_volumetric();
		let route = RouteContext {
			origin_zone: &Zone::new("N1"),
			destination_zone: &Zone::new("S1"),
			actual_weight_kg: 2.0,
			volumetric_weights: &weights,
			invoice_value: 1.0,
			oda_entry: None,
		};
		let quote = calculate(&carrier, QuoteSource::Utsf, &route).unwrap();
		assert_eq!(quote.total_charges, 1000.0);
	}

	#[test]
	fn surcharges_apply_in_ascending_order_against_running_subtotal() {
		let mut carrier = sample_carrier();
		carrier.pricing.surcharges = vec![
			Surcharge { id: "s2".into(), label: "second".into(), formula: SurchargeFormula::Flat, value: 5.0, value2: None, order: 2, enabled: true },
			Surcharge { id: "s1".into(), label: "first".into(), formula: SurchargeFormula::PctOfSubtotal, value: 10.0, value2: None, order: 1, enabled: true },
		];
		let weights = sample_volumetric();
		let route = RouteContext {
			origin_zone: &Zone::new("N1"),
			destination_zone: &Zone::new("S1"),
			actual_weight_kg: 2.0,
			volumetric_weights: &weights,
			invoice_value: 1.0,
			oda_entry: None,
		};
		let quote = calculate(&carrier, QuoteSource::Utsf, &route).unwrap();
		// base=40 + rov=10 -> subtotal=50; first surcharge = 10% of 50 = 5; second is flat 5.
		let names: Vec<&str> = quote.charges.iter().map(|c| c.name.as_str()).collect();
		assert_eq!(names, vec!["base_freight", "rov", "first", "second"]);
		assert_eq!(quote.total_charges, 60.0);
	}
}
