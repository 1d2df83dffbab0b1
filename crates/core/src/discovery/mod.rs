//! Periodic discovery of bookable devices across all configured hubs.
//!
//! Each [`Directory::refresh`] lists the hubs, fetches every distinct hub
//! concurrently, flattens the answers into [`CapabilityRecord`]s and swaps
//! the result in as a new [`Snapshot`]. Readers always hold a complete,
//! immutable snapshot; a hub that fails contributes nothing to that cycle
//! and is retried on the next one.

mod unpack;

use std::collections::HashSet;
use std::sync::Arc;

use devlab_protocol::CapabilityRecord;
use futures_util::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

pub use self::unpack::unpack_topology;
use crate::clock::{Clock, Timestamp};
use crate::grid::{TopologySource, normalize_base_url};
use crate::hubs::HubSource;

/// Immutable, ordered set of capability records published as one unit.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
	records: Vec<CapabilityRecord>,
	published_at: Timestamp,
}

impl Snapshot {
	/// Builds a snapshot, dropping repeated `(endpoint_url, device_id)` pairs.
	/// The first occurrence wins.
	pub fn new(records: Vec<CapabilityRecord>, published_at: Timestamp) -> Self {
		let mut seen = HashSet::new();
		let records = records
			.into_iter()
			.filter(|record| seen.insert((record.endpoint_url.clone(), record.device_id.clone())))
			.collect();
		Self { records, published_at }
	}

	pub fn records(&self) -> &[CapabilityRecord] {
		&self.records
	}

	pub fn published_at(&self) -> Timestamp {
		self.published_at
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

/// Owner of the current snapshot and the pipeline that replaces it.
pub struct Directory {
	hubs: Arc<dyn HubSource>,
	topology: Arc<dyn TopologySource>,
	clock: Arc<dyn Clock>,
	current: RwLock<Arc<Snapshot>>,
}

impl Directory {
	pub fn new(hubs: Arc<dyn HubSource>, topology: Arc<dyn TopologySource>, clock: Arc<dyn Clock>) -> Self {
		Self {
			hubs,
			topology,
			clock,
			current: RwLock::new(Arc::new(Snapshot::default())),
		}
	}

	/// The most recently published snapshot.
	pub fn snapshot(&self) -> Arc<Snapshot> {
		Arc::clone(&self.current.read())
	}

	/// Replaces the current snapshot. Last write wins.
	pub fn publish(&self, records: Vec<CapabilityRecord>) -> Arc<Snapshot> {
		let snapshot = Arc::new(Snapshot::new(records, self.clock.now()));
		*self.current.write() = Arc::clone(&snapshot);
		snapshot
	}

	/// Runs one discovery cycle and publishes its result.
	///
	/// Never fails: per-hub errors are logged and skipped. When the hub list
	/// itself cannot be read the previous snapshot stays in place.
	pub async fn refresh(&self) -> Arc<Snapshot> {
		let hub_urls = match self.hubs.list_hub_urls().await {
			Ok(urls) => urls,
			Err(err) => {
				warn!(target = "devlab.discovery", error = %err, "failed to list hubs; keeping previous snapshot");
				return self.snapshot();
			}
		};

		let hub_urls = distinct_hubs(hub_urls);
		let fetches = hub_urls.iter().map(|hub_url| self.collect_hub(hub_url));
		let records: Vec<CapabilityRecord> = join_all(fetches).await.into_iter().flatten().collect();

		let snapshot = self.publish(records);
		info!(
			target = "devlab.discovery",
			hubs = hub_urls.len(),
			records = snapshot.len(),
			"snapshot published"
		);
		snapshot
	}

	async fn collect_hub(&self, hub_url: &str) -> Vec<CapabilityRecord> {
		let document = match self.topology.fetch_topology(hub_url).await {
			Ok(document) => document,
			Err(err) => {
				warn!(target = "devlab.discovery", hub_url, error = %err, "fail to fetch nodes");
				return Vec::new();
			}
		};

		match unpack_topology(hub_url, &document) {
			Ok(records) => {
				debug!(target = "devlab.discovery", hub_url, records = records.len(), "success to update hub");
				records
			}
			Err(err) => {
				warn!(target = "devlab.discovery", hub_url, error = %err, "fail to update hub");
				Vec::new()
			}
		}
	}
}

/// Normalizes hub URLs and removes repeats, keeping first-seen order.
fn distinct_hubs(urls: Vec<String>) -> Vec<String> {
	let mut seen = HashSet::new();
	urls.into_iter()
		.filter_map(|raw| match normalize_base_url(&raw) {
			Ok(url) => Some(url),
			Err(err) => {
				warn!(target = "devlab.discovery", hub_url = %raw, error = %err, "ignoring invalid hub URL");
				None
			}
		})
		.filter(|url| seen.insert(url.clone()))
		.collect()
}

#[cfg(test)]
mod tests;
