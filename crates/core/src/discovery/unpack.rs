//! Flattening of hub topology documents into capability records.

use devlab_protocol::{CapabilityRecord, GridNode, GridSlot, GridTopology};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{LabError, Result};
use crate::grid::normalize_base_url;

/// Unpacks every node of one hub's topology.
///
/// Fails only when the document itself is not a topology. Individual nodes
/// and slots that lack the expected structure contribute nothing.
pub fn unpack_topology(hub_url: &str, document: &Value) -> Result<Vec<CapabilityRecord>> {
	let topology = parse_topology(document).map_err(|e| LabError::upstream(hub_url, format!("malformed topology: {e}")))?;

	let mut records = Vec::new();
	for raw in &topology.nodes {
		match unpack_node(hub_url, raw) {
			Ok(node_records) => records.extend(node_records),
			Err(err) => warn!(target = "devlab.discovery", hub_url, error = %err, "skipping node"),
		}
	}
	Ok(records)
}

fn unpack_node(hub_url: &str, raw: &Value) -> Result<Vec<CapabilityRecord>> {
	let node: GridNode = serde_json::from_value(raw.clone())?;
	let endpoint_url = normalize_base_url(&node.id)?;

	let Some(group) = node.protocols.web_driver else {
		debug!(target = "devlab.discovery", hub_url, %endpoint_url, "node advertises no web_driver group");
		return Ok(Vec::new());
	};

	let mut records = Vec::new();
	for versions in group.browsers.values() {
		let Some(versions) = versions.as_object() else {
			continue;
		};
		// Version keys hold slot arrays; `name`/`version` siblings are scalars.
		for slots in versions.values().filter_map(Value::as_array) {
			for slot in slots {
				let Ok(slot) = serde_json::from_value::<GridSlot>(slot.clone()) else {
					continue;
				};
				if let Some(record) = record_from_capabilities(hub_url, &endpoint_url, slot.capabilities) {
					records.push(record);
				}
			}
		}
	}
	Ok(records)
}

fn record_from_capabilities(hub_url: &str, endpoint_url: &str, capabilities: Map<String, Value>) -> Option<CapabilityRecord> {
	let field = |keys: &[&str]| keys.iter().find_map(|key| capabilities.get(*key).and_then(Value::as_str)).map(str::to_string);

	let device_id = field(&["UDID", "udid"]).filter(|id| !id.is_empty())?;
	let platform_name = field(&["platformName"])?;
	let platform_version = field(&["version", "platformVersion"]).unwrap_or_default();
	let device_name = field(&["deviceName"]);

	Some(CapabilityRecord {
		hub_url: hub_url.to_string(),
		endpoint_url: endpoint_url.to_string(),
		device_id,
		platform_name,
		platform_version,
		device_name,
		capabilities,
		capability_token: None,
	})
}

fn parse_topology(document: &Value) -> serde_json::Result<GridTopology> {
	if !document.is_object() {
		return Err(serde::de::Error::custom("topology document must be an object"));
	}
	serde_json::from_value(document.clone())
}
