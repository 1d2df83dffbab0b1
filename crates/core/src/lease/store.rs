//! In-memory registry of exclusive, expiring locks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::{Clock, Timestamp, after};

/// A lockable resource. Endpoints and devices live in disjoint namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeaseKey {
	Endpoint(String),
	Device(String),
}

impl LeaseKey {
	pub fn endpoint(url: impl Into<String>) -> Self {
		Self::Endpoint(url.into())
	}

	pub fn device(id: impl Into<String>) -> Self {
		Self::Device(id.into())
	}
}

impl fmt::Display for LeaseKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Endpoint(url) => write!(f, "endpoint:{url}"),
			Self::Device(id) => write!(f, "device:{id}"),
		}
	}
}

/// A held lock. Never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
	pub key: LeaseKey,
	/// The other key acquired in the same booking.
	pub partner: LeaseKey,
	pub acquired_at: Timestamp,
	pub expires_at: Timestamp,
	/// Duration granted at acquire time; refresh extends by the same amount.
	pub ttl: Duration,
}

impl LeaseRecord {
	fn is_live(&self, now: Timestamp) -> bool {
		now <= self.expires_at
	}
}

/// Registry of lease records keyed by resource.
///
/// Every method completes synchronously; the owner serializes access so a
/// compound acquire is never observed half-done.
pub struct LeaseStore {
	clock: Arc<dyn Clock>,
	records: HashMap<LeaseKey, LeaseRecord>,
}

impl fmt::Debug for LeaseStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LeaseStore").field("records", &self.records).finish_non_exhaustive()
	}
}

impl LeaseStore {
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self {
			clock,
			records: HashMap::new(),
		}
	}

	pub fn now(&self) -> Timestamp {
		self.clock.now()
	}

	/// Returns `true` while `key` has a non-expired record.
	pub fn is_leased(&self, key: &LeaseKey) -> bool {
		let now = self.clock.now();
		self.records.get(key).is_some_and(|record| record.is_live(now))
	}

	pub fn get(&self, key: &LeaseKey) -> Option<&LeaseRecord> {
		self.records.get(key)
	}

	/// Locks both keys for `ttl`, or neither.
	///
	/// Returns the shared expiry on success and the first busy key otherwise.
	/// Expired records left behind by a missed sweep do not block.
	pub fn try_acquire_pair(&mut self, first: LeaseKey, second: LeaseKey, ttl: Duration) -> Result<Timestamp, LeaseKey> {
		let now = self.clock.now();
		for key in [&first, &second] {
			if self.records.get(key).is_some_and(|record| record.is_live(now)) {
				return Err(key.clone());
			}
		}

		let expires_at = after(now, ttl);
		for (key, partner) in [(first.clone(), second.clone()), (second, first)] {
			self.records.insert(
				key.clone(),
				LeaseRecord {
					key,
					partner,
					acquired_at: now,
					expires_at,
					ttl,
				},
			);
		}
		Ok(expires_at)
	}

	/// Removes the record for `key`. Returns whether one was present.
	pub fn release(&mut self, key: &LeaseKey) -> bool {
		let removed = self.records.remove(key).is_some();
		if !removed {
			debug!(target = "devlab.lease", %key, "release of un-acquired key");
		}
		removed
	}

	/// Extends a live booking to `now + ttl`, both keys or neither.
	///
	/// Only applies while `endpoint` and `device` still name each other as
	/// partners; a key rebooked with another partner is left alone.
	/// Expired records stay expired.
	pub fn refresh_pair(&mut self, endpoint: &LeaseKey, device: &LeaseKey) -> Option<Timestamp> {
		let now = self.clock.now();
		let paired = |key: &LeaseKey, partner: &LeaseKey| self.records.get(key).is_some_and(|record| &record.partner == partner && record.is_live(now));
		if !paired(endpoint, device) || !paired(device, endpoint) {
			return None;
		}

		let mut expires_at = 0;
		for key in [endpoint, device] {
			if let Some(record) = self.records.get_mut(key) {
				record.expires_at = record.expires_at.max(after(now, record.ttl));
				expires_at = expires_at.max(record.expires_at);
			}
		}
		Some(expires_at)
	}

	/// Drops every record whose expiry has passed and returns how many went.
	pub fn sweep_expired(&mut self) -> usize {
		let now = self.clock.now();
		let before = self.records.len();
		self.records.retain(|key, record| {
			let live = record.is_live(now);
			if !live {
				warn!(target = "devlab.lease", %key, expires_at = record.expires_at, "found expired key");
			}
			live
		});
		let released = before - self.records.len();
		if released > 0 {
			warn!(target = "devlab.lease", total = released, "expired keys are released");
		}
		released
	}

	/// Live `(endpoint_url, device_id)` bookings, one entry per endpoint record.
	pub fn live_bookings(&self) -> Vec<(String, String)> {
		let now = self.clock.now();
		let mut bookings: Vec<(String, String)> = self
			.records
			.values()
			.filter(|record| record.is_live(now))
			.filter_map(|record| match (&record.key, &record.partner) {
				(LeaseKey::Endpoint(endpoint), LeaseKey::Device(device)) => Some((endpoint.clone(), device.clone())),
				_ => None,
			})
			.collect();
		bookings.sort();
		bookings
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}
