//! Small helpers shared across the quoting pipeline.

use std::time::{SystemTime, UNIX_EPOCH};

/// Rounds a value half-up (`floor(x + 0.5)`), matching the rounding rule carriers
/// and zone-rate tables are priced against. Rust's default `f64::round` already
/// rounds half away from zero for positive inputs, but pricing values are never
/// negative in practice here, so this is spelled out explicitly to keep the rule
/// visible rather than relying on stdlib rounding semantics.
pub fn round_half_up(value: f64) -> f64 {
	(value + 0.5).floor()
}

/// Rounds to a fixed number of decimal places using the half-up rule.
pub fn round_half_up_to(value: f64, decimals: u32) -> f64 {
	let factor = 10f64.powi(decimals as i32);
	round_half_up(value * factor) / factor
}

/// Current Unix timestamp in seconds, used for cache entry timestamps and TTL checks.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is before the Unix epoch")
		.as_secs()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rounds_half_up() {
		assert_eq!(round_half_up(2.5), 3.0);
		assert_eq!(round_half_up(2.4), 2.0);
		assert_eq!(round_half_up(2.49999), 2.0);
	}

	#[test]
	fn rounds_to_decimals() {
		assert_eq!(round_half_up_to(2.345, 2), 2.35);
	}

	#[test]
	fn timestamp_is_nonzero() {
		assert!(current_timestamp() > 0);
	}
}
