//! Storage-related types for the freight cache.

/// Storage keys for different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Cached quote results, keyed by request fingerprint.
	QuoteResults,
	/// Carrier documents loaded from the database fallback source.
	Carriers,
	/// Master pincode-to-zone/coordinate records.
	Pincodes,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::QuoteResults => "quote_results",
			StorageKey::Carriers => "carriers",
			StorageKey::Pincodes => "pincodes",
		}
	}

	/// Returns every variant, used by file-backed cache implementations to build
	/// per-namespace TTL configuration fields.
	pub fn all() -> [StorageKey; 3] {
		[StorageKey::QuoteResults, StorageKey::Carriers, StorageKey::Pincodes]
	}
}

impl std::str::FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"quote_results" => Ok(StorageKey::QuoteResults),
			"carriers" => Ok(StorageKey::Carriers),
			"pincodes" => Ok(StorageKey::Pincodes),
			_ => Err(()),
		}
	}
}
