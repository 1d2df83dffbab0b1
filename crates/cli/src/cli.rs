use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use devlab::ServiceConfig;
use devlab::config::{DEFAULT_API_BASE_URL, generate_secret};

#[derive(Parser, Debug)]
#[command(name = "devlab")]
#[command(about = "Device lab - discover remote test devices and lease them out")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Address to bind the HTTP server to
	#[arg(long, env = "HOST", default_value = "0.0.0.0")]
	pub host: String,

	/// Port to listen on
	#[arg(short, long, env = "PORT", default_value_t = 8888)]
	pub port: u16,

	/// Path prefix of every API route; must start and end with '/'
	#[arg(long, env = "API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
	pub api_base_url: String,

	/// Token signing secret (generated when unset; tokens then die with the process)
	#[arg(long, env = "LOCK_SECRET", hide_env_values = true)]
	pub lock_secret: Option<String>,

	/// Seconds between discovery cycles
	#[arg(long, env = "DISCOVERY_PERIOD", default_value_t = 10)]
	pub discovery_period: u64,

	/// Seconds between lease refresh cycles
	#[arg(long, env = "LEASE_REFRESH_PERIOD", default_value_t = 30)]
	pub lease_refresh_period: u64,

	/// Seconds between expired lease sweeps
	#[arg(long, env = "LEASE_SWEEP_PERIOD", default_value_t = 1)]
	pub lease_sweep_period: u64,

	/// Exclusive upper bound on requested lease timeouts, in seconds
	#[arg(long, env = "MAX_LEASE_TIMEOUT", default_value_t = 7200)]
	pub max_lease_timeout: u64,

	/// Per-request timeout for hub and endpoint fetches, in seconds
	#[arg(long, env = "HUB_FETCH_TIMEOUT", default_value_t = 5)]
	pub hub_fetch_timeout: u64,

	/// Hub base URL; repeat or comma-separate for several
	#[arg(long = "hub", env = "HUBS", value_delimiter = ',')]
	pub hubs: Vec<String>,

	/// File listing hub URLs, re-read every discovery cycle
	#[arg(long, env = "HUB_LIST_FILE", value_name = "FILE")]
	pub hub_list_file: Option<PathBuf>,

	/// Enable debug mode (honours the `debug` query flag)
	#[arg(long)]
	pub debug: bool,

	/// Run mode; `DEBUG` is the same as --debug
	#[arg(long, env = "MODE", hide = true)]
	pub mode: Option<String>,
}

impl Cli {
	pub fn debug_mode(&self) -> bool {
		self.debug || self.mode.as_deref().is_some_and(|mode| mode.eq_ignore_ascii_case("debug"))
	}

	pub fn bind_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	pub fn service_config(&self) -> ServiceConfig {
		ServiceConfig {
			secret: generate_secret(),
			secret_generated: true,
			api_base_url: self.api_base_url.clone(),
			discovery_period: Duration::from_secs(self.discovery_period),
			lease_refresh_period: Duration::from_secs(self.lease_refresh_period),
			lease_sweep_period: Duration::from_secs(self.lease_sweep_period),
			max_lease_timeout: Duration::from_secs(self.max_lease_timeout),
			hub_fetch_timeout: Duration::from_secs(self.hub_fetch_timeout),
			hubs: self.hubs.iter().map(|hub| hub.trim().to_string()).filter(|hub| !hub.is_empty()).collect(),
			hub_list_file: self.hub_list_file.clone(),
			debug: self.debug_mode(),
		}
		.with_secret(self.lock_secret.clone())
	}
}
