//! Request-level validation for `POST /calculate`, run before any suspension
//! point so malformed input never reaches the cache or distance service.

use freight_types::api::CalculateRequest;

use crate::error::EngineError;

const MAX_INVOICE_VALUE: f64 = 1e8;
const MIN_INVOICE_VALUE: f64 = 1.0;

pub fn validate(request: &CalculateRequest) -> Result<(), EngineError> {
	if request.owner_customer_id.trim().is_empty() {
		return Err(EngineError::InvalidRequest {
			code: "INVALID_CUSTOMER_ID",
			message: "owner_customer_id must not be empty".into(),
		});
	}

	if request.shipment.origin_pincode.trim().is_empty() || request.shipment.destination_pincode.trim().is_empty() {
		return Err(EngineError::InvalidRequest {
			code: "PINCODE_NOT_FOUND",
			message: "origin and destination pincodes are required".into(),
		});
	}

	let boxes = request.shipment.effective_boxes();
	if boxes.is_empty() {
		return Err(EngineError::InvalidRequest {
			code: "INVALID_BOX_COUNT",
			message: "at least one box is required".into(),
		});
	}

	for b in &boxes {
		if b.count == 0 {
			return Err(EngineError::InvalidRequest {
				code: "INVALID_BOX_COUNT",
				message: "box count must be at least 1".into(),
			});
		}
		if b.length_cm <= 0.0 || b.width_cm <= 0.0 || b.height_cm <= 0.0 {
			return Err(EngineError::InvalidRequest {
				code: "INVALID_DIMENSIONS",
				message: "box dimensions must be positive".into(),
			});
		}
		if b.weight_kg <= 0.0 {
			return Err(EngineError::InvalidRequest {
				code: "INVALID_WEIGHT",
				message: "box weight must be positive".into(),
			});
		}
	}

	if !(MIN_INVOICE_VALUE..=MAX_INVOICE_VALUE).contains(&request.invoice_value) {
		return Err(EngineError::InvalidRequest {
			code: "INVALID_INVOICE_VALUE",
			message: format!("invoice_value must be within [{MIN_INVOICE_VALUE}, {MAX_INVOICE_VALUE}]"),
		});
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use freight_types::shipment::{BoxDimensions, Shipment};

	fn base_request() -> CalculateRequest {
		CalculateRequest {
			owner_customer_id: "cust-1".into(),
			shipment: Shipment {
				origin_pincode: "110001".into(),
				destination_pincode: "400001".into(),
				declared_value: 1000.0,
				boxes: vec![BoxDimensions { length_cm: 10.0, width_cm: 10.0, height_cm: 10.0, weight_kg: 1.0, count: 1 }],
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
	fn valid_request_passes() {
		assert!(validate(&base_request()).is_ok());
	}

	#[test]
	fn zero_weight_box_is_rejected() {
		let mut request = base_request();
		request.shipment.boxes[0].weight_kg = 0.0;
		let err = validate(&request).unwrap_err();
		assert_eq!(err.error_code(), "INVALID_WEIGHT");
	}

	#[test]
	fn negative_dimension_is_rejected() {
		let mut request = base_request();
		request.shipment.boxes[0].length_cm = -1.0;
		let err = validate(&request).unwrap_err();
		assert_eq!(err.error_code(), "INVALID_DIMENSIONS");
	}

	#[test]
	fn empty_owner_id_is_rejected() {
		let mut request = base_request();
		request.owner_customer_id = "  ".into();
		let err = validate(&request).unwrap_err();
		assert_eq!(err.error_code(), "INVALID_CUSTOMER_ID");
	}

	#[test]
	fn invoice_value_out_of_bounds_is_rejected() {
		let mut request = base_request();
		request.invoice_value = 0.0;
		assert!(validate(&request).is_err());
	}
}
