//! Request and response bodies of the device lab HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One bookable device as published in a snapshot and returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRecord {
	/// Hub the record was discovered through (scheme, host and port).
	pub hub_url: String,
	/// Runtime endpoint that executes sessions for the device.
	pub endpoint_url: String,
	/// Device identity (UDID).
	pub device_id: String,
	pub platform_name: String,
	pub platform_version: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device_name: Option<String>,
	/// Capabilities exactly as advertised by the node.
	#[serde(default)]
	pub capabilities: Map<String, Value>,
	/// Opaque reference accepted by the lease endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub capability_token: Option<String>,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
	pub code: u16,
	pub data: T,
}

impl<T> ApiEnvelope<T> {
	pub fn new(code: u16, data: T) -> Self {
		Self { code, data }
	}
}

/// Error payload carried in [`ApiEnvelope::data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_code: Option<String>,
}

/// Body of `POST leases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRequest {
	pub capability_token: String,
	/// Lease duration in seconds.
	pub timeout: i64,
}

/// Body returned by a successful `POST leases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseCreated {
	/// Lock token; present it to `DELETE leases/{token}` to release.
	pub token: String,
}
