//! Selenium Grid 3 hub topology (`/grid/admin/ShowAllNodesServlet`).
//!
//! A hub answers with every registered node. Each node declares its own
//! address in `id` and advertises capability slots grouped by protocol,
//! browser name and version:
//!
//! ```json
//! {
//!   "nodes": [{
//!     "id": "http://10.32.60.38:4723",
//!     "protocols": {
//!       "web_driver": {
//!         "browsers": {
//!           "": {
//!             "10.1": [{ "busy": false, "capabilities": { "UDID": "F0F7...", "platformName": "ios", "version": "10.1" } }],
//!             "name": "",
//!             "version": "10.1"
//!           }
//!         },
//!         "name": "WebDriver"
//!       }
//!     }
//!   }]
//! }
//! ```
//!
//! Nodes are kept as raw values at the document level so that one malformed
//! node can be skipped without discarding its siblings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Relative path of the node listing servlet on a Grid 3 hub.
pub const GRID_NODES_PATH: &str = "/grid/admin/ShowAllNodesServlet";

/// Top-level hub response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridTopology {
	#[serde(default)]
	pub nodes: Vec<Value>,
}

/// A single node registered with a hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridNode {
	/// Base URL of the runtime that executes sessions for this node.
	pub id: String,
	#[serde(default, rename = "class", skip_serializing_if = "Option::is_none")]
	pub proxy_class: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default)]
	pub protocols: GridProtocols,
}

/// Protocol groups advertised by a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridProtocols {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub web_driver: Option<GridProtocolGroup>,
}

/// Browsers exposed under one protocol.
///
/// `browsers` maps a browser name to a map of version keys. Version keys hold
/// arrays of [`GridSlot`]; the same map also carries scalar metadata (`name`,
/// `version`) which consumers skip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridProtocolGroup {
	#[serde(default)]
	pub browsers: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

/// One bookable capability slot on a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridSlot {
	#[serde(default)]
	pub busy: bool,
	#[serde(default)]
	pub capabilities: Map<String, Value>,
}
