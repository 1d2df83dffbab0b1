//! The [`DeviceLab`] service object: one directory, one lease manager.

use std::sync::Arc;

use devlab_protocol::CapabilityRecord;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::discovery::{Directory, Snapshot};
use crate::error::Result;
use crate::grid::{HttpGridClient, SessionSource, TopologySource};
use crate::hubs::{ChainedHubs, FileHubs, HubSource, StaticHubs};
use crate::lease::{Lease, LeaseManager};
use crate::query::{CapabilityQuery, available_capabilities};
use crate::tasks::TaskRegistry;
use crate::token::TokenCodec;

/// Capability directory and lease manager behind one handle.
///
/// Constructed once at process start. Nothing runs in the background until
/// [`DeviceLab::start_background_tasks`] is called.
pub struct DeviceLab {
	config: ServiceConfig,
	directory: Directory,
	leases: LeaseManager,
}

impl DeviceLab {
	/// Wires the service from explicit collaborators.
	pub fn new(
		config: ServiceConfig,
		hubs: Arc<dyn HubSource>,
		topology: Arc<dyn TopologySource>,
		sessions: Arc<dyn SessionSource>,
		clock: Arc<dyn Clock>,
	) -> Self {
		let codec = TokenCodec::new(config.secret.as_bytes());
		Self {
			directory: Directory::new(hubs, topology, Arc::clone(&clock)),
			leases: LeaseManager::new(codec, clock, sessions),
			config,
		}
	}

	/// Wires the service against real hubs over HTTP.
	pub fn from_config(config: ServiceConfig) -> Result<Self> {
		config.validate()?;
		let client = Arc::new(HttpGridClient::new(config.hub_fetch_timeout)?);
		let hubs = hub_source(&config);
		Ok(Self::new(config, hubs, Arc::clone(&client) as Arc<dyn TopologySource>, client, Arc::new(SystemClock)))
	}

	pub fn config(&self) -> &ServiceConfig {
		&self.config
	}

	pub fn snapshot(&self) -> Arc<Snapshot> {
		self.directory.snapshot()
	}

	/// Bookable records matching `query`, each with a capability token.
	///
	/// With `debug` set and the service in debug mode, returns the raw
	/// snapshot instead: no filtering and no tokens.
	pub fn capabilities(&self, query: &CapabilityQuery, debug: bool) -> Result<Vec<CapabilityRecord>> {
		let snapshot = self.directory.snapshot();
		if debug && self.config.debug {
			debug!(target = "devlab.discovery", records = snapshot.len(), "returning raw snapshot");
			return Ok(snapshot.records().to_vec());
		}
		self.leases
			.read(|store| available_capabilities(&snapshot, query, store, self.leases.codec()))
	}

	/// Leases the resource behind `capability_token` for `timeout_secs`.
	///
	/// The timeout must satisfy `0 < timeout_secs < max_lease_timeout`.
	pub fn acquire(&self, capability_token: &str, timeout_secs: i64) -> Result<Lease> {
		let timeout = self.config.lease_timeout(timeout_secs)?;
		self.leases.acquire(capability_token, timeout)
	}

	pub fn release(&self, lock_token: &str) -> Result<()> {
		self.leases.release(lock_token)
	}

	/// Runs one discovery cycle now.
	pub async fn refresh_directory(&self) -> Arc<Snapshot> {
		self.directory.refresh().await
	}

	/// Runs one lease refresh cycle now.
	pub async fn refresh_leases(&self) -> usize {
		self.leases.refresh_leases().await
	}

	pub fn sweep_expired(&self) -> usize {
		self.leases.sweep_expired()
	}

	/// Registers discovery, lease refresh and expiry sweep on `registry`.
	pub fn start_background_tasks(self: &Arc<Self>, registry: &TaskRegistry) {
		let lab = Arc::clone(self);
		registry.spawn_interval("discovery", self.config.discovery_period, move || {
			let lab = Arc::clone(&lab);
			async move {
				lab.refresh_directory().await;
			}
		});

		let lab = Arc::clone(self);
		registry.spawn_interval("lease-refresh", self.config.lease_refresh_period, move || {
			let lab = Arc::clone(&lab);
			async move {
				lab.refresh_leases().await;
			}
		});

		let lab = Arc::clone(self);
		registry.spawn_interval("lease-sweep", self.config.lease_sweep_period, move || {
			let lab = Arc::clone(&lab);
			async move {
				lab.sweep_expired();
			}
		});

		info!(
			target = "devlab.tasks",
			discovery_secs = self.config.discovery_period.as_secs(),
			lease_refresh_secs = self.config.lease_refresh_period.as_secs(),
			lease_sweep_secs = self.config.lease_sweep_period.as_secs(),
			"background tasks started"
		);
	}
}

/// Static hubs from configuration, followed by the hub list file if any.
fn hub_source(config: &ServiceConfig) -> Arc<dyn HubSource> {
	let statics: Arc<dyn HubSource> = Arc::new(StaticHubs::new(config.hubs.iter().cloned()));
	match &config.hub_list_file {
		Some(path) => Arc::new(ChainedHubs::new(vec![statics, Arc::new(FileHubs::new(path.clone()))])),
		None => {
			if config.hubs.is_empty() {
				warn!(target = "devlab.discovery", "no hubs configured; the directory will stay empty");
			}
			statics
		}
	}
}
