//! Service configuration.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::{LabError, Result};

pub const DEFAULT_API_BASE_URL: &str = "/device_lab/api/v1/";
pub const DEFAULT_DISCOVERY_PERIOD: Duration = Duration::from_secs(10);
pub const DEFAULT_LEASE_REFRESH_PERIOD: Duration = Duration::from_secs(30);
pub const DEFAULT_LEASE_SWEEP_PERIOD: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_LEASE_TIMEOUT: Duration = Duration::from_secs(7200);
pub const DEFAULT_HUB_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

const GENERATED_SECRET_LEN: usize = 20;

/// Everything [`crate::DeviceLab`] needs besides its collaborators.
#[derive(Clone)]
pub struct ServiceConfig {
	/// Signing secret for capability and lock tokens.
	pub secret: String,
	/// True when `secret` was generated at startup rather than configured.
	pub secret_generated: bool,
	pub api_base_url: String,
	pub discovery_period: Duration,
	pub lease_refresh_period: Duration,
	pub lease_sweep_period: Duration,
	/// Exclusive upper bound on a requested lease timeout.
	pub max_lease_timeout: Duration,
	pub hub_fetch_timeout: Duration,
	pub hubs: Vec<String>,
	pub hub_list_file: Option<PathBuf>,
	/// Enables the raw-snapshot `debug` query flag.
	pub debug: bool,
}

impl std::fmt::Debug for ServiceConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServiceConfig")
			.field("secret", &"<redacted>")
			.field("secret_generated", &self.secret_generated)
			.field("api_base_url", &self.api_base_url)
			.field("discovery_period", &self.discovery_period)
			.field("lease_refresh_period", &self.lease_refresh_period)
			.field("lease_sweep_period", &self.lease_sweep_period)
			.field("max_lease_timeout", &self.max_lease_timeout)
			.field("hub_fetch_timeout", &self.hub_fetch_timeout)
			.field("hubs", &self.hubs)
			.field("hub_list_file", &self.hub_list_file)
			.field("debug", &self.debug)
			.finish()
	}
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			secret: generate_secret(),
			secret_generated: true,
			api_base_url: DEFAULT_API_BASE_URL.to_string(),
			discovery_period: DEFAULT_DISCOVERY_PERIOD,
			lease_refresh_period: DEFAULT_LEASE_REFRESH_PERIOD,
			lease_sweep_period: DEFAULT_LEASE_SWEEP_PERIOD,
			max_lease_timeout: DEFAULT_MAX_LEASE_TIMEOUT,
			hub_fetch_timeout: DEFAULT_HUB_FETCH_TIMEOUT,
			hubs: Vec::new(),
			hub_list_file: None,
			debug: false,
		}
	}
}

impl ServiceConfig {
	/// Uses `secret` when present and non-empty, otherwise a generated one.
	pub fn with_secret(mut self, secret: Option<String>) -> Self {
		if let Some(secret) = secret.filter(|s| !s.is_empty()) {
			self.secret = secret;
			self.secret_generated = false;
		}
		self
	}

	/// Validates a requested lease timeout in whole seconds.
	///
	/// Accepts `0 < timeout < max_lease_timeout`.
	pub fn lease_timeout(&self, secs: i64) -> Result<Duration> {
		let max = self.max_lease_timeout.as_secs();
		match u64::try_from(secs) {
			Ok(secs) if secs > 0 && secs < max => Ok(Duration::from_secs(secs)),
			_ => Err(LabError::InvalidInput(format!("timeout should be > 0 and < {max}"))),
		}
	}

	/// Checks the periods and bounds are usable.
	pub fn validate(&self) -> Result<()> {
		for (name, period) in [
			("discovery period", self.discovery_period),
			("lease refresh period", self.lease_refresh_period),
			("lease sweep period", self.lease_sweep_period),
			("hub fetch timeout", self.hub_fetch_timeout),
		] {
			if period.is_zero() {
				return Err(LabError::InvalidInput(format!("{name} must be positive")));
			}
		}
		if self.max_lease_timeout.as_secs() < 2 {
			return Err(LabError::InvalidInput("max lease timeout must be at least 2 seconds".to_string()));
		}
		if !self.api_base_url.starts_with('/') || !self.api_base_url.ends_with('/') {
			return Err(LabError::InvalidInput(format!("API base URL must start and end with '/': {}", self.api_base_url)));
		}
		Ok(())
	}
}

/// A random alphanumeric signing secret.
pub fn generate_secret() -> String {
	rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(GENERATED_SECRET_LEN)
		.map(char::from)
		.collect()
}
