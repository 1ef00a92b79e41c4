//! `DBCarrierSource`: the secondary carrier source backed by the document store.
//!
//! Production document-store access (a managed NoSQL collection) is out of
//! scope here; [`CacheBackedCarrierSource`] reuses the generic key-value/query
//! `StorageService` from `freight-cache` as the document store, which gives the
//! same "two parallel projected queries" shape the real store would.

use async_trait::async_trait;
use freight_cache::{QueryFilter, StorageService};
use freight_types::carrier::{ApprovalStatus, Carrier};
use freight_types::domain::Pincode;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::CarrierError;

const PUBLIC_NAMESPACE: &str = "carriers_public";
const TIED_UP_NAMESPACE: &str = "carriers_tied_up";

fn dummy_name_pattern() -> &'static Regex {
	static PATTERN: OnceLock<Regex> = OnceLock::new();
	PATTERN.get_or_init(|| Regex::new(r"(?i)\btest\b|\bdummy\b|\bdemo\b").unwrap())
}

fn is_eligible_for_db_fetch(carrier: &Carrier) -> bool {
	!dummy_name_pattern().is_match(&carrier.name)
		&& carrier.approval_status.is_approved_or_pending()
}

/// Port for the secondary, document-store-backed carrier source. Abstracted as
/// a trait so engine tests can substitute a fixed carrier list.
#[async_trait]
pub trait DbCarrierSource: Send + Sync {
	/// Public carriers (no owning customer) serviceable for the given route.
	async fn public_carriers_for_route(
		&self,
		origin: &Pincode,
		destination: &Pincode,
	) -> Result<Vec<Carrier>, CarrierError>;

	/// Carriers tied to a specific owning customer, serviceable for the route.
	async fn tied_up_carriers_for_route(
		&self,
		owner_customer_id: &str,
		origin: &Pincode,
		destination: &Pincode,
	) -> Result<Vec<Carrier>, CarrierError>;
}

/// `DbCarrierSource` implementation backed by a `freight_cache::StorageService`
/// acting as the document store. Carriers are namespaced `public`/`tied_up` and
/// indexed by `owner_customer_id` so `query` can project by owner before the two
/// pincode-membership checks are applied in-process.
pub struct CacheBackedCarrierSource {
	store: StorageService,
}

impl CacheBackedCarrierSource {
	pub fn new(store: StorageService) -> Self {
		Self { store }
	}

	async fn load_namespace(&self, namespace: &str) -> Result<Vec<Carrier>, CarrierError> {
		let items: Vec<(String, Carrier)> = self
			.store
			.retrieve_all(namespace)
			.await
			.map_err(|e| CarrierError::Store(e.to_string()))?;
		Ok(items.into_iter().map(|(_, carrier)| carrier).collect())
	}

	/// Upserts a carrier document, indexed by `owner_customer_id` for future
	/// owner-scoped queries.
	pub async fn upsert(&self, namespace: &str, carrier: &Carrier) -> Result<(), CarrierError> {
		use freight_cache::StorageIndexes;
		let indexes = StorageIndexes::new().with_field(
			"owner_customer_id",
			carrier.owner_customer_id.clone().unwrap_or_default(),
		);
		self.store
			.store(namespace, &carrier.id, carrier, Some(indexes))
			.await
			.map_err(|e| CarrierError::Store(e.to_string()))
	}
}

#[async_trait]
impl DbCarrierSource for CacheBackedCarrierSource {
	async fn public_carriers_for_route(
		&self,
		origin: &Pincode,
		destination: &Pincode,
	) -> Result<Vec<Carrier>, CarrierError> {
		let carriers = self.load_namespace(PUBLIC_NAMESPACE).await?;
		Ok(project_for_route(carriers, origin, destination))
	}

	async fn tied_up_carriers_for_route(
		&self,
		owner_customer_id: &str,
		origin: &Pincode,
		destination: &Pincode,
	) -> Result<Vec<Carrier>, CarrierError> {
		let filter = QueryFilter::Equals(
			"owner_customer_id".to_string(),
			serde_json::Value::String(owner_customer_id.to_string()),
		);
		let items: Vec<(String, Carrier)> = self
			.store
			.query(TIED_UP_NAMESPACE, filter)
			.await
			.map_err(|e| CarrierError::Store(e.to_string()))?;
		let carriers = items.into_iter().map(|(_, c)| c).collect();
		Ok(project_for_route(carriers, origin, destination))
	}
}

/// Applies the shared "projected to the two pincode entries needed" + eligibility
/// filter both query paths in §4.4 require.
fn project_for_route(carriers: Vec<Carrier>, origin: &Pincode, destination: &Pincode) -> Vec<Carrier> {
	let origin_num: Option<u32> = origin.as_str().parse().ok();
	let dest_num: Option<u32> = destination.as_str().parse().ok();

	carriers
		.into_iter()
		.filter(|c| is_eligible_for_db_fetch(c))
		.filter(|c| match (origin_num, dest_num) {
			(Some(o), Some(d)) => c.services(o) || c.services(d),
			_ => false,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use freight_cache::implementations::memory::MemoryStorage;
	use freight_types::carrier::{CarrierPricing, IntegrityMode, Serviceability};
	use freight_types::domain::PincodeRange;

	fn sample_carrier(id: &str, name: &str, owner: Option<&str>) -> Carrier {
		Carrier {
			id: id.into(),
			name: name.into(),
			owner_customer_id: owner.map(|s| s.to_string()),
			approval_status: ApprovalStatus::Approved,
			is_verified: true,
			integrity_mode: IntegrityMode::None,
			serviceability: Serviceability {
				exceptions: vec![],
				served: vec![PincodeRange::new(110000, 110099)],
				oda: vec![],
			},
			zone_overrides: vec![],
			pricing: CarrierPricing::default(),
		}
	}

	#[tokio::test]
	async fn public_query_excludes_dummy_named_carriers() {
		let store = StorageService::new(Box::new(MemoryStorage::new()));
		let source = CacheBackedCarrierSource::new(store);
		source.upsert(PUBLIC_NAMESPACE, &sample_carrier("p1", "Real Freight Co", None)).await.unwrap();
		source.upsert(PUBLIC_NAMESPACE, &sample_carrier("p2", "Test Dummy Carrier", None)).await.unwrap();

		let results = source
			.public_carriers_for_route(&Pincode::new("110050"), &Pincode::new("400001"))
			.await
			.unwrap();
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].id, "p1");
	}

	#[tokio::test]
	async fn tied_up_query_scopes_by_owner() {
		let store = StorageService::new(Box::new(MemoryStorage::new()));
		let source = CacheBackedCarrierSource::new(store);
		source
			.upsert(TIED_UP_NAMESPACE, &sample_carrier("t1", "Owner A Freight", Some("cust-a")))
			.await
			.unwrap();
		source
			.upsert(TIED_UP_NAMESPACE, &sample_carrier("t2", "Owner B Freight", Some("cust-b")))
			.await
			.unwrap();

		let results = source
			.tied_up_carriers_for_route("cust-a", &Pincode::new("110050"), &Pincode::new("400001"))
			.await
			.unwrap();
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].id, "t1");
	}
}
