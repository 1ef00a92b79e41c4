//! `CarrierResolver`: merges the UTSF catalog with the document-store source
//! using the hot-switch rule from spec §4.5.

use std::collections::HashSet;

use freight_types::carrier::Carrier;

/// Carrier names that always pass through the document store even if a UTSF
/// entry with a matching id/name exists. These are fallback vendors that the
/// UTSF catalog intentionally never lists.
const FALLBACK_VENDOR_WHITELIST: &[&str] = &["wheelseye", "local ftl", "ftl transporter", "local-ftl"];

fn is_fallback_vendor(name: &str) -> bool {
	let lower = name.to_lowercase();
	FALLBACK_VENDOR_WHITELIST.iter().any(|v| lower.contains(v))
}

/// Carriers split by ownership after the hot-switch merge.
pub struct ResolvedCarriers {
	/// UTSF carriers owned by the requesting customer.
	pub tied_up: Vec<Carrier>,
	/// UTSF carriers with no owner, plus any document-store carriers not
	/// overridden by a UTSF entry.
	pub public: Vec<Carrier>,
}

/// Merges a UTSF carrier list with a document-store carrier list for one route.
///
/// A document-store carrier is dropped (overridden) iff its id or
/// lowercase(name) matches a UTSF carrier's id or lowercase(name), unless its
/// name matches the fallback-vendor whitelist, in which case it always passes
/// through regardless of any UTSF match.
pub fn resolve(
	owner_customer_id: &str,
	utsf_carriers: Vec<Carrier>,
	db_carriers: Vec<Carrier>,
) -> ResolvedCarriers {
	let mut utsf_keys: HashSet<String> = HashSet::new();
	for carrier in &utsf_carriers {
		utsf_keys.insert(carrier.id.clone());
		utsf_keys.insert(carrier.name.to_lowercase());
	}

	let surviving_db_carriers = db_carriers.into_iter().filter(|c| {
		let overridden = utsf_keys.contains(&c.id) || utsf_keys.contains(&c.name.to_lowercase());
		!overridden || is_fallback_vendor(&c.name)
	});

	let mut tied_up = Vec::new();
	let mut public = Vec::new();

	for carrier in utsf_carriers {
		if carrier.owner_customer_id.as_deref() == Some(owner_customer_id) {
			tied_up.push(carrier);
		} else {
			public.push(carrier);
		}
	}
	public.extend(surviving_db_carriers);

	ResolvedCarriers { tied_up, public }
}

#[cfg(test)]
mod tests {
	use super::*;
	use freight_types::carrier::{ApprovalStatus, CarrierPricing, IntegrityMode, Serviceability};

	fn carrier(id: &str, name: &str, owner: Option<&str>) -> Carrier {
		Carrier {
			id: id.into(),
			name: name.into(),
			owner_customer_id: owner.map(|s| s.to_string()),
			approval_status: ApprovalStatus::Approved,
			is_verified: true,
			integrity_mode: IntegrityMode::None,
			serviceability: Serviceability::default(),
			zone_overrides: vec![],
			pricing: CarrierPricing::default(),
		}
	}

	#[test]
	fn utsf_overrides_matching_db_carrier() {
		let utsf = vec![carrier("c1", "Acme Logistics", None)];
		let db = vec![carrier("c1", "Acme Logistics", None)];
		let resolved = resolve("cust-a", utsf, db);
		assert_eq!(resolved.public.len(), 1, "the DB duplicate must be dropped");
	}

	#[test]
	fn fallback_vendor_always_passes_through() {
		let utsf = vec![carrier("c1", "Wheelseye", None)];
		let db = vec![carrier("c1", "Wheelseye", None)];
		let resolved = resolve("cust-a", utsf, db);
		assert_eq!(resolved.public.len(), 2, "fallback vendor survives despite the id match");
	}

	#[test]
	fn tied_up_carriers_are_split_by_owner() {
		let utsf = vec![carrier("c1", "Owned", Some("cust-a")), carrier("c2", "Public", None)];
		let resolved = resolve("cust-a", utsf, vec![]);
		assert_eq!(resolved.tied_up.len(), 1);
		assert_eq!(resolved.public.len(), 1);
	}
}
