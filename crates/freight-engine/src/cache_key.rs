//! Deterministic cache key construction for the `ResultCache`.
//!
//! The key must be stable across requests that are semantically identical
//! but arrived with, say, boxes listed in a different order or a JSON object
//! with keys in a different order. Canonicalizing the shipment's boxes by a
//! fixed sort order before hashing is what makes that hold.

use freight_types::api::CalculateRequest;
use freight_types::shipment::BoxDimensions;
use sha3::{Digest, Sha3_256};
use std::cmp::Ordering;

const CACHE_KEY_PREFIX: &str = "calc";

/// Builds the stable fingerprint string used as the `ResultCache` key for a
/// given calculate request.
pub fn build(request: &CalculateRequest) -> String {
	let mut boxes = request.shipment.effective_boxes();
	boxes.sort_by(compare_boxes);

	let canonical_boxes: Vec<_> = boxes
		.iter()
		.map(|b| {
			serde_json::json!({
				"l": b.length_cm,
				"w": b.width_cm,
				"h": b.height_cm,
				"wt": b.weight_kg,
				"c": b.count,
			})
		})
		.collect();

	let fingerprint_source = serde_json::json!({
		"owner": request.owner_customer_id,
		"origin": request.shipment.origin_pincode,
		"dest": request.shipment.destination_pincode,
		"invoice": request.invoice_value,
		"boxes": canonical_boxes,
		"carrierIds": request.carrier_ids.as_ref().map(|ids| {
			let mut sorted = ids.clone();
			sorted.sort();
			sorted
		}),
	});

	let mut hasher = Sha3_256::new();
	hasher.update(fingerprint_source.to_string().as_bytes());
	let digest = hasher.finalize();

	format!("{CACHE_KEY_PREFIX}:{:x}", digest)
}

fn compare_boxes(a: &BoxDimensions, b: &BoxDimensions) -> Ordering {
	a.length_cm
		.partial_cmp(&b.length_cm)
		.unwrap_or(Ordering::Equal)
		.then(a.width_cm.partial_cmp(&b.width_cm).unwrap_or(Ordering::Equal))
		.then(a.height_cm.partial_cmp(&b.height_cm).unwrap_or(Ordering::Equal))
		.then(a.weight_kg.partial_cmp(&b.weight_kg).unwrap_or(Ordering::Equal))
		.then(a.count.cmp(&b.count))
}

#[cfg(test)]
mod tests {
	use super::*;
	use freight_types::shipment::Shipment;

	fn base_request(boxes: Vec<BoxDimensions>) -> CalculateRequest {
		CalculateRequest {
			owner_customer_id: "cust-1".into(),
			shipment: Shipment {
				origin_pincode: "110001".into(),
				destination_pincode: "400001".into(),
				declared_value: 500.0,
				boxes,
				length_cm: None,
				width_cm: None,
				height_cm: None,
				weight_kg: None,
			},
			invoice_value: 1000.0,
			carrier_ids: None,
		}
	}

	#[test]
	fn box_order_does_not_change_the_key() {
		let box_a = BoxDimensions { length_cm: 10.0, width_cm: 10.0, height_cm: 10.0, weight_kg: 1.0, count: 1 };
		let box_b = BoxDimensions { length_cm: 20.0, width_cm: 20.0, height_cm: 20.0, weight_kg: 2.0, count: 1 };

		let forward = base_request(vec![box_a, box_b]);
		let reversed = base_request(vec![box_b, box_a]);

		assert_eq!(build(&forward), build(&reversed));
	}

	#[test]
	fn different_routes_produce_different_keys() {
		let boxes = vec![BoxDimensions { length_cm: 10.0, width_cm: 10.0, height_cm: 10.0, weight_kg: 1.0, count: 1 }];
		let mut request_a = base_request(boxes.clone());
		let request_b = {
			let mut r = base_request(boxes);
			r.shipment.destination_pincode = "560001".into();
			r
		};
		request_a.shipment.destination_pincode = "400001".into();

		assert_ne!(build(&request_a), build(&request_b));
	}

	#[test]
	fn carrier_id_filter_order_does_not_change_the_key() {
		let boxes = vec![BoxDimensions { length_cm: 10.0, width_cm: 10.0, height_cm: 10.0, weight_kg: 1.0, count: 1 }];
		let mut request_a = base_request(boxes.clone());
		let mut request_b = base_request(boxes);
		request_a.carrier_ids = Some(vec!["a".into(), "b".into()]);
		request_b.carrier_ids = Some(vec!["b".into(), "a".into()]);

		assert_eq!(build(&request_a), build(&request_b));
	}
}
