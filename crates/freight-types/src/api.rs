//! HTTP API request/response types and the unified error type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::quote::{Quote, ShieldFlag};
use crate::shipment::Shipment;

/// Request body for `POST /calculate`, mirroring a `calculatePrice` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
	pub owner_customer_id: String,
	pub shipment: Shipment,
	/// Declared invoice value; defaults to 1 and is bounded to `[1, 1e8]` at
	/// validation time.
	#[serde(default = "default_invoice_value")]
	pub invoice_value: f64,
	/// Restrict quoting to these carrier IDs, if provided.
	#[serde(default)]
	pub carrier_ids: Option<Vec<String>>,
}

fn default_invoice_value() -> f64 {
	1.0
}

/// Aggregate anomaly summary attached to a `CalculateResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartShieldSummary {
	pub overall_score: f64,
	pub summary: String,
	pub cohort_flags: Vec<ShieldFlag>,
	pub quote_flags: HashMap<String, Vec<ShieldFlag>>,
}

/// Debug/provenance metadata attached to a `CalculateResponse`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateDebugInfo {
	pub carriers_considered: usize,
	pub carriers_priced: usize,
	pub carriers_dropped: usize,
}

/// Response body for `POST /calculate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateResponse {
	/// Quotes from carriers owned by the requesting customer.
	pub tied_up_result: Vec<Quote>,
	/// Quotes from carriers available to any customer.
	pub company_result: Vec<Quote>,
	pub distance_km: Option<f64>,
	pub distance_text: Option<String>,
	pub estimated_days: Option<u32>,
	pub smart_shield: SmartShieldSummary,
	pub debug: CalculateDebugInfo,
	/// Whether this response was served from the result cache.
	#[serde(default)]
	pub from_cache: bool,
}

/// Query parameters for `GET /nearest-serviceable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestServiceableRequest {
	/// The unserviceable destination pincode a caller wants an alternative for.
	pub pincode: String,
	/// The route's origin pincode; candidates are priced against this origin.
	pub from_pincode: String,
	#[serde(default)]
	pub customer_id: Option<String>,
}

/// Response body for `GET /nearest-serviceable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestServiceableResponse {
	pub nearest_pincode: Option<String>,
	pub distance_km: Option<f64>,
	#[serde(default)]
	pub served_by: Vec<String>,
}

/// API error response body, returned for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
	pub details: Option<serde_json::Value>,
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Unprocessable entity for business logic failures (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Service unavailable with optional retry information (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError {
		error_type: String,
		message: String,
	},
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest { error_type, message, details } => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
				retry_after: None,
			},
			APIError::UnprocessableEntity { error_type, message, details } => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
				retry_after: None,
			},
			APIError::ServiceUnavailable { error_type, message, retry_after } => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: *retry_after,
			},
			APIError::InternalServerError { error_type, message } => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::UnprocessableEntity { message, .. } => write!(f, "Unprocessable Entity: {}", message),
			APIError::ServiceUnavailable { message, .. } => write!(f, "Service Unavailable: {}", message),
			APIError::InternalServerError { message, .. } => write!(f, "Internal Server Error: {}", message),
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = match self.status_code() {
			400 => StatusCode::BAD_REQUEST,
			422 => StatusCode::UNPROCESSABLE_ENTITY,
			503 => StatusCode::SERVICE_UNAVAILABLE,
			500 => StatusCode::INTERNAL_SERVER_ERROR,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};

		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_codes_match_variant() {
		let err = APIError::BadRequest { error_type: "invalid_shipment".into(), message: "bad".into(), details: None };
		assert_eq!(err.status_code(), 400);
		let err = APIError::UnprocessableEntity { error_type: "no_carriers".into(), message: "none".into(), details: None };
		assert_eq!(err.status_code(), 422);
	}
}
