//! Quote orchestration: `QuoteEngine`, `SmartShield`, `NearestPincodeFinder`,
//! cache-key canonicalisation, and the distance-service port used by both.

pub mod cache_key;
pub mod distance;
pub mod error;
pub mod nearest_pincode;
pub mod quote_engine;
pub mod smart_shield;
pub mod validate;

pub use distance::{DistanceError, DistanceService, HaversineDistanceService, HttpDistanceService, NullDistanceService, RouteDistance};
pub use error::EngineError;
pub use nearest_pincode::{find as find_nearest_pincode, NearestPincodeResult};
pub use quote_engine::QuoteEngine;
