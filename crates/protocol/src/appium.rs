//! Appium server session listing (`GET /wd/hub/sessions`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Relative path of the session listing on an Appium endpoint.
pub const APPIUM_SESSIONS_PATH: &str = "wd/hub/sessions";

/// Response body of the session listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionList {
	#[serde(default)]
	pub status: Option<i64>,
	#[serde(default)]
	pub value: Vec<SessionEntry>,
}

/// A live session on an endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionEntry {
	#[serde(default)]
	pub id: String,
	#[serde(default)]
	pub capabilities: Map<String, Value>,
}

impl SessionEntry {
	/// Device identity the session runs on, if the endpoint reports one.
	pub fn udid(&self) -> Option<&str> {
		["udid", "UDID", "deviceUDID"]
			.iter()
			.find_map(|key| self.capabilities.get(*key).and_then(Value::as_str))
	}
}
