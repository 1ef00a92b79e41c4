//! Unified error type for the quoting orchestration layer.

use thiserror::Error;

/// Errors that can occur while orchestrating a quote request.
///
/// Per-carrier failures never surface here — they are logged and dropped
/// inside `QuoteEngine::calculate`. Only failures that prevent the request
/// from being processed at all reach this type.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("invalid request ({code}): {message}")]
	InvalidRequest { code: &'static str, message: String },
	#[error("origin pincode not found in zone index: {0}")]
	OriginZoneUnknown(String),
	#[error("destination pincode not found in zone index: {0}")]
	DestinationZoneUnknown(String),
	#[error("distance service error: {0}")]
	Distance(#[from] crate::distance::DistanceError),
	#[error("carrier source error: {0}")]
	Carrier(#[from] freight_carriers::CarrierError),
	#[error("cache error: {0}")]
	Cache(String),
}

impl EngineError {
	/// The structured error code a caller-facing 400 response should carry,
	/// matching the taxonomy of user input error codes.
	pub fn error_code(&self) -> &'static str {
		match self {
			EngineError::InvalidRequest { code, .. } => code,
			EngineError::OriginZoneUnknown(_) | EngineError::DestinationZoneUnknown(_) => "PINCODE_NOT_FOUND",
			EngineError::Distance(crate::distance::DistanceError::NoRoadRoute) => "NO_ROAD_ROUTE",
			EngineError::Distance(crate::distance::DistanceError::PincodeNotFound(_)) => "PINCODE_NOT_FOUND",
			EngineError::Distance(crate::distance::DistanceError::ApiTimeout) => "API_TIMEOUT",
			EngineError::Distance(crate::distance::DistanceError::ApiKeyMissing) => "API_KEY_MISSING",
			EngineError::Distance(crate::distance::DistanceError::GoogleApiError(_)) => "GOOGLE_API_ERROR",
			EngineError::Carrier(_) => "CARRIER_SOURCE_ERROR",
			EngineError::Cache(_) => "CACHE_ERROR",
		}
	}

	/// Whether this error belongs to the user-input (400) class rather than
	/// the upstream-service (500) class.
	pub fn is_user_input_error(&self) -> bool {
		matches!(
			self,
			EngineError::InvalidRequest { .. }
				| EngineError::OriginZoneUnknown(_)
				| EngineError::DestinationZoneUnknown(_)
				| EngineError::Distance(crate::distance::DistanceError::NoRoadRoute)
				| EngineError::Distance(crate::distance::DistanceError::PincodeNotFound(_))
		)
	}
}
