//! Shipment and box dimension types.

use serde::{Deserialize, Serialize};

/// Dimensions and weight of a single box, in centimeters and kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxDimensions {
	pub length_cm: f64,
	pub width_cm: f64,
	pub height_cm: f64,
	pub weight_kg: f64,
	#[serde(default = "default_count")]
	pub count: u32,
}

fn default_count() -> u32 {
	1
}

impl BoxDimensions {
	/// Volume of a single box in cubic centimeters.
	pub fn volume_cm3(&self) -> f64 {
		self.length_cm * self.width_cm * self.height_cm
	}

	/// Volumetric weight contribution of this box line under a given divisor,
	/// e.g. 5000. `count` is folded in before rounding, so the line rounds up
	/// once rather than once per physical box.
	pub fn volumetric_weight_kg(&self, divisor: f64) -> f64 {
		(self.volume_cm3() * self.count as f64 / divisor).ceil()
	}
}

/// A shipment to be quoted: declared origin/destination pincodes, declared value,
/// and one or more boxes.
///
/// Callers may submit either the current `boxes` array or the legacy single-box
/// shape (`length_cm`/`width_cm`/`height_cm`/`weight_kg` at the top level); both
/// normalize to the same `boxes` vector via [`Shipment::boxes`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
	pub origin_pincode: String,
	pub destination_pincode: String,
	#[serde(default)]
	pub declared_value: f64,
	#[serde(default)]
	pub boxes: Vec<BoxDimensions>,
	// Legacy single-box fields, accepted when `boxes` is empty.
	#[serde(default)]
	pub length_cm: Option<f64>,
	#[serde(default)]
	pub width_cm: Option<f64>,
	#[serde(default)]
	pub height_cm: Option<f64>,
	#[serde(default)]
	pub weight_kg: Option<f64>,
}

impl Shipment {
	/// The effective box list: `boxes` if non-empty, otherwise a single box built
	/// from the legacy top-level dimension fields.
	pub fn effective_boxes(&self) -> Vec<BoxDimensions> {
		if !self.boxes.is_empty() {
			return self.boxes.clone();
		}
		match (self.length_cm, self.width_cm, self.height_cm, self.weight_kg) {
			(Some(length_cm), Some(width_cm), Some(height_cm), Some(weight_kg)) => {
				vec![BoxDimensions { length_cm, width_cm, height_cm, weight_kg, count: 1 }]
			}
			_ => vec![],
		}
	}

	/// Total declared (actual) weight across every box, accounting for `count`.
	pub fn total_actual_weight_kg(&self) -> f64 {
		self.effective_boxes().iter().map(|b| b.weight_kg * b.count as f64).sum()
	}

	/// Total volumetric weight across every box under the given divisor. Each
	/// box line's `count` is already folded into `volumetric_weight_kg`, so
	/// this is a plain sum across lines.
	pub fn total_volumetric_weight_kg(&self, divisor: f64) -> f64 {
		self.effective_boxes().iter().map(|b| b.volumetric_weight_kg(divisor)).sum()
	}
}

/// Pre-computed volumetric weights for a shipment under each divisor a carrier
/// might use, so `QuoteEngine` only computes them once per request rather than
/// once per carrier.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumetricWeights {
	pub at_4500: f64,
	pub at_5000: f64,
	pub at_5500: f64,
	pub at_6000: f64,
}

/// The set of volumetric divisors carriers are known to price against.
pub const VOLUMETRIC_DIVISORS: [u32; 4] = [4500, 5000, 5500, 6000];

impl VolumetricWeights {
	pub fn compute(shipment: &Shipment) -> Self {
		Self {
			at_4500: shipment.total_volumetric_weight_kg(4500.0),
			at_5000: shipment.total_volumetric_weight_kg(5000.0),
			at_5500: shipment.total_volumetric_weight_kg(5500.0),
			at_6000: shipment.total_volumetric_weight_kg(6000.0),
		}
	}

	/// Returns the pre-computed value for a given divisor, recomputing only if
	/// the divisor is outside the standard set.
	pub fn for_divisor(&self, shipment: &Shipment, divisor: u32) -> f64 {
		match divisor {
			4500 => self.at_4500,
			5000 => self.at_5000,
			5500 => self.at_5500,
			6000 => self.at_6000,
			other => shipment.total_volumetric_weight_kg(other as f64),
		}
	}

	/// Like [`Self::for_divisor`], but for callers (`freight-pricing`) that only
	/// have the pre-computed weights and not the originating shipment. Carriers
	/// using a non-standard divisor fall back to the nearest standard one rather
	/// than being skipped entirely.
	pub fn for_divisor_value(&self, divisor: u32) -> f64 {
		match divisor {
			4500 => self.at_4500,
			5000 => self.at_5000,
			5500 => self.at_5500,
			6000 => self.at_6000,
			other => {
				let nearest = VOLUMETRIC_DIVISORS
					.iter()
					.min_by_key(|d| (**d as i64 - other as i64).abs())
					.copied()
					.unwrap_or(5000);
				self.for_divisor_value(nearest)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn legacy_single_box_normalizes() {
		let shipment = Shipment {
			origin_pincode: "110001".into(),
			destination_pincode: "400001".into(),
			declared_value: 1000.0,
			boxes: vec![],
			length_cm: Some(10.0),
			width_cm: Some(10.0),
			height_cm: Some(10.0),
			weight_kg: Some(2.0),
		};
		let boxes = shipment.effective_boxes();
		assert_eq!(boxes.len(), 1);
		assert_eq!(boxes[0].weight_kg, 2.0);
	}

	#[test]
	fn volumetric_weight_scales_with_divisor() {
		let shipment = Shipment {
			origin_pincode: "110001".into(),
			destination_pincode: "400001".into(),
			declared_value: 0.0,
			boxes: vec![BoxDimensions { length_cm: 50.0, width_cm: 50.0, height_cm: 50.0, weight_kg: 5.0, count: 2 }],
			length_cm: None,
			width_cm: None,
			height_cm: None,
			weight_kg: None,
		};
		let weights = VolumetricWeights::compute(&shipment);
		// volume = 125000 cm3 per box, 2 boxes -> 250000 cm3 total; ceil(250000/4500) = 56.
		assert_eq!(weights.at_4500, 56.0);
		assert!(weights.at_4500 > weights.at_6000);
	}

	#[test]
	fn count_is_folded_in_before_rounding() {
		// 30x30x30 = 27000 cm3 per box, count=2 -> 54000 cm3 total; ceil(54000/5000) = 11,
		// not ceil(27000/5000) * 2 = 12.
		let dims = BoxDimensions { length_cm: 30.0, width_cm: 30.0, height_cm: 30.0, weight_kg: 1.0, count: 2 };
		assert_eq!(dims.volumetric_weight_kg(5000.0), 11.0);
	}

	#[test]
	fn total_actual_weight_accounts_for_count() {
		let shipment = Shipment {
			origin_pincode: "110001".into(),
			destination_pincode: "400001".into(),
			declared_value: 0.0,
			boxes: vec![BoxDimensions { length_cm: 10.0, width_cm: 10.0, height_cm: 10.0, weight_kg: 3.0, count: 4 }],
			length_cm: None,
			width_cm: None,
			height_cm: None,
			weight_kg: None,
		};
		assert_eq!(shipment.total_actual_weight_kg(), 12.0);
	}
}
