//! Availability queries against the current snapshot.
//!
//! Filtering, lease exclusion and de-duplication are plain passes over the
//! materialized snapshot. The lease check is a point-in-time read, not a
//! reservation; the compound acquire in [`crate::lease`] settles races.

use std::collections::HashSet;

use devlab_protocol::CapabilityRecord;

use crate::discovery::Snapshot;
use crate::error::{LabError, Result};
use crate::lease::{LeaseKey, LeaseStore};
use crate::token::TokenCodec;

/// Filter criteria for [`available_capabilities`].
///
/// Version bounds compare as plain strings, so `"9" > "10"`. Grid nodes report
/// versions as free-form strings and this ordering is what clients rely on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityQuery {
	/// Required. Matched exactly.
	pub platform_name: Option<String>,
	/// When non-empty, the record's version must be one of these.
	pub platform_versions: Vec<String>,
	/// When non-empty, the record's `deviceName` must be one of these.
	pub device_names: Vec<String>,
	/// Inclusive lower bound.
	pub min_version: Option<String>,
	/// Inclusive upper bound.
	pub max_version: Option<String>,
}

impl CapabilityQuery {
	pub fn for_platform(platform_name: impl Into<String>) -> Self {
		Self {
			platform_name: Some(platform_name.into()),
			..Default::default()
		}
	}

	fn matches(&self, platform_name: &str, record: &CapabilityRecord) -> bool {
		if record.platform_name != platform_name {
			return false;
		}
		if !self.platform_versions.is_empty() && !self.platform_versions.contains(&record.platform_version) {
			return false;
		}
		if !self.device_names.is_empty() && !record.device_name.as_ref().is_some_and(|name| self.device_names.contains(name)) {
			return false;
		}
		if self.min_version.as_deref().is_some_and(|min| record.platform_version.as_str() < min) {
			return false;
		}
		if self.max_version.as_deref().is_some_and(|max| record.platform_version.as_str() > max) {
			return false;
		}
		true
	}
}

/// Returns bookable records matching `query`, each carrying a capability token.
///
/// Records whose endpoint or device is leased are excluded. Of the rest, in
/// snapshot order, a record survives only if neither its device nor its
/// endpoint was already taken by an earlier survivor.
pub fn available_capabilities(snapshot: &Snapshot, query: &CapabilityQuery, leases: &LeaseStore, codec: &TokenCodec) -> Result<Vec<CapabilityRecord>> {
	let platform_name = query
		.platform_name
		.as_deref()
		.filter(|name| !name.is_empty())
		.ok_or_else(|| LabError::InvalidInput("Missing argument platform_name".to_string()))?;

	let mut seen_devices: HashSet<&str> = HashSet::new();
	let mut seen_endpoints: HashSet<&str> = HashSet::new();
	let mut available = Vec::new();

	for record in snapshot.records() {
		if !query.matches(platform_name, record) {
			continue;
		}
		if leases.is_leased(&LeaseKey::endpoint(record.endpoint_url.as_str())) || leases.is_leased(&LeaseKey::device(record.device_id.as_str())) {
			continue;
		}
		if seen_devices.contains(record.device_id.as_str()) || seen_endpoints.contains(record.endpoint_url.as_str()) {
			continue;
		}
		seen_devices.insert(&record.device_id);
		seen_endpoints.insert(&record.endpoint_url);

		available.push(CapabilityRecord {
			capability_token: Some(codec.encode_capability(&record.endpoint_url, &record.device_id)),
			..record.clone()
		});
	}

	Ok(available)
}
