//! Token-facing lease operations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use devlab_protocol::SessionList;
use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::store::{LeaseKey, LeaseStore};
use crate::clock::{Clock, Timestamp};
use crate::error::{LabError, Result};
use crate::grid::SessionSource;
use crate::token::TokenCodec;

/// A granted lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
	/// Lock token; the only proof needed to release.
	pub token: String,
	pub endpoint_url: String,
	pub device_id: String,
	pub expires_at: Timestamp,
}

/// Turns capability tokens into leases and lock tokens back into releases.
///
/// The store sits behind a mutex that is only ever held for synchronous
/// sections, never across an await, so every acquire is one atomic
/// check-and-set.
pub struct LeaseManager {
	codec: TokenCodec,
	store: Mutex<LeaseStore>,
	sessions: Arc<dyn SessionSource>,
}

impl LeaseManager {
	pub fn new(codec: TokenCodec, clock: Arc<dyn Clock>, sessions: Arc<dyn SessionSource>) -> Self {
		Self {
			codec,
			store: Mutex::new(LeaseStore::new(clock)),
			sessions,
		}
	}

	pub fn codec(&self) -> &TokenCodec {
		&self.codec
	}

	/// Runs `f` against a consistent view of the store.
	pub fn read<R>(&self, f: impl FnOnce(&LeaseStore) -> R) -> R {
		f(&self.store.lock())
	}

	/// Leases the resource named by `capability_token` for `timeout`.
	///
	/// # Errors
	///
	/// - [`LabError::NotFound`] when the token does not decode
	/// - [`LabError::Conflict`] when the endpoint or the device is already leased
	pub fn acquire(&self, capability_token: &str, timeout: Duration) -> Result<Lease> {
		let claim = self
			.codec
			.decode_capability(capability_token)
			.map_err(|_| LabError::NotFound("capability does not exist".to_string()))?;

		let expires_at = self
			.store
			.lock()
			.try_acquire_pair(LeaseKey::endpoint(claim.endpoint_url.as_str()), LeaseKey::device(claim.device_id.as_str()), timeout)
			.map_err(|busy| LabError::Conflict(format!("cannot lock: {busy}")))?;

		info!(
			target = "devlab.lease",
			endpoint_url = %claim.endpoint_url,
			device_id = %claim.device_id,
			timeout_secs = timeout.as_secs(),
			"lease acquired"
		);
		Ok(Lease {
			token: self.codec.encode_lock(&claim.endpoint_url, &claim.device_id, expires_at),
			endpoint_url: claim.endpoint_url,
			device_id: claim.device_id,
			expires_at,
		})
	}

	/// Releases the lease proven by `lock_token`.
	///
	/// An expired token is treated exactly like one that was never issued.
	/// Inside the validity window both keys are dropped whatever they hold,
	/// so releasing twice is not an error.
	pub fn release(&self, lock_token: &str) -> Result<()> {
		let not_found = || LabError::NotFound("lease does not exist".to_string());
		let claim = self.codec.decode_lock(lock_token).map_err(|_| not_found())?;

		let mut store = self.store.lock();
		if store.now() > claim.expires_at {
			return Err(not_found());
		}
		store.release(&LeaseKey::endpoint(claim.endpoint_url.as_str()));
		store.release(&LeaseKey::device(claim.device_id.as_str()));
		drop(store);

		info!(target = "devlab.lease", endpoint_url = %claim.endpoint_url, device_id = %claim.device_id, "lease released");
		Ok(())
	}

	/// Removes every expired record. Returns how many were dropped.
	pub fn sweep_expired(&self) -> usize {
		self.store.lock().sweep_expired()
	}

	/// Extends leases whose endpoint still runs a session for the leased device.
	///
	/// Endpoints are polled concurrently; one failing endpoint only skips its
	/// own lease. Returns the number of bookings extended.
	pub async fn refresh_leases(&self) -> usize {
		let bookings: BTreeMap<String, String> = self.read(|store| store.live_bookings()).into_iter().collect();
		if bookings.is_empty() {
			return 0;
		}

		let checks = bookings.iter().map(|(endpoint_url, device_id)| async move {
			match self.sessions.fetch_sessions(endpoint_url).await {
				Ok(document) => session_is_active(endpoint_url, device_id, document),
				Err(err) => {
					warn!(target = "devlab.lease", %endpoint_url, error = %err, "fail to fetch sessions");
					false
				}
			}
		});
		let active = join_all(checks).await;

		let mut store = self.store.lock();
		let mut refreshed = 0;
		for ((endpoint_url, device_id), active) in bookings.iter().zip(active) {
			if !active {
				continue;
			}
			// The booking may have been released or rebooked while sessions were polled.
			if let Some(expires_at) = store.refresh_pair(&LeaseKey::endpoint(endpoint_url.as_str()), &LeaseKey::device(device_id.as_str())) {
				debug!(target = "devlab.lease", %endpoint_url, %device_id, expires_at, "lease refreshed");
				refreshed += 1;
			}
		}
		refreshed
	}
}

fn session_is_active(endpoint_url: &str, device_id: &str, document: serde_json::Value) -> bool {
	let sessions: SessionList = match serde_json::from_value(document) {
		Ok(sessions) => sessions,
		Err(err) => {
			warn!(target = "devlab.lease", endpoint_url, error = %err, "malformed session list");
			return false;
		}
	};
	sessions.value.iter().any(|session| session.udid().is_none_or(|udid| udid == device_id))
}

#[cfg(test)]
mod tests;
