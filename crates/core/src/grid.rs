//! HTTP adapters for Selenium Grid hubs and Appium endpoints.
//!
//! Both adapters return the raw JSON document; interpretation happens in
//! [`crate::discovery`] and [`crate::lease`], where failures are contained.

use std::time::Duration;

use async_trait::async_trait;
use devlab_protocol::{APPIUM_SESSIONS_PATH, GRID_NODES_PATH};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{LabError, Result};

/// Fetches the node topology of one hub.
#[async_trait]
pub trait TopologySource: Send + Sync {
	async fn fetch_topology(&self, hub_url: &str) -> Result<Value>;
}

/// Fetches the live session list of one device endpoint.
#[async_trait]
pub trait SessionSource: Send + Sync {
	async fn fetch_sessions(&self, endpoint_url: &str) -> Result<Value>;
}

/// Reduces a URL to its origin (`scheme://host[:port]`).
///
/// Hubs and nodes are identified by origin so that `http://h:4444/` and
/// `http://h:4444/wd/hub` collapse to one identity.
pub fn normalize_base_url(raw: &str) -> Result<String> {
	let url = Url::parse(raw.trim())?;
	let origin = url.origin();
	if !origin.is_tuple() {
		return Err(LabError::InvalidInput(format!("URL has no host: {raw}")));
	}
	Ok(origin.ascii_serialization())
}

/// reqwest-backed client for hubs and endpoints.
#[derive(Debug, Clone)]
pub struct HttpGridClient {
	http: reqwest::Client,
}

impl HttpGridClient {
	/// Builds a client whose requests give up after `timeout`.
	pub fn new(timeout: Duration) -> Result<Self> {
		let http = reqwest::Client::builder().timeout(timeout).build()?;
		Ok(Self { http })
	}

	async fn get_json(&self, source: &str, url: Url) -> Result<Value> {
		debug!(target = "devlab.grid", %url, "fetching");
		let response = self.http.get(url).send().await.map_err(|e| LabError::upstream(source, e))?;

		let status = response.status();
		if !status.is_success() {
			return Err(LabError::upstream(source, format!("unexpected status {status}")));
		}

		let body = response.text().await.map_err(|e| LabError::upstream(source, e))?;
		serde_json::from_str(&body).map_err(|e| LabError::upstream(source, format!("malformed response: {e}")))
	}
}

#[async_trait]
impl TopologySource for HttpGridClient {
	async fn fetch_topology(&self, hub_url: &str) -> Result<Value> {
		let url = Url::parse(hub_url)?.join(GRID_NODES_PATH)?;
		self.get_json(hub_url, url).await
	}
}

#[async_trait]
impl SessionSource for HttpGridClient {
	async fn fetch_sessions(&self, endpoint_url: &str) -> Result<Value> {
		let mut base = Url::parse(endpoint_url)?;
		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());
			base.set_path(&path);
		}
		let url = base.join(APPIUM_SESSIONS_PATH)?;
		self.get_json(endpoint_url, url).await
	}
}
