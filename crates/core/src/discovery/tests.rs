use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use super::*;
use crate::clock::ManualClock;
use crate::error::{LabError, Result};
use crate::hubs::StaticHubs;

#[derive(Default)]
struct FakeGrid {
	answers: HashMap<String, Value>,
	calls: Mutex<Vec<String>>,
}

impl FakeGrid {
	fn with(mut self, hub_url: &str, document: Value) -> Self {
		self.answers.insert(hub_url.to_string(), document);
		self
	}
}

#[async_trait]
impl TopologySource for FakeGrid {
	async fn fetch_topology(&self, hub_url: &str) -> Result<Value> {
		self.calls.lock().push(hub_url.to_string());
		self.answers
			.get(hub_url)
			.cloned()
			.ok_or_else(|| LabError::upstream(hub_url, "connection refused"))
	}
}

struct BrokenHubs;

#[async_trait]
impl HubSource for BrokenHubs {
	async fn list_hub_urls(&self) -> Result<Vec<String>> {
		Err(LabError::Io(std::io::Error::other("store offline")))
	}
}

fn topology(endpoint: &str, udids: &[&str]) -> Value {
	let slots: Vec<Value> = udids
		.iter()
		.map(|udid| json!({ "capabilities": { "UDID": udid, "platformName": "ios", "version": "11.2" } }))
		.collect();
	json!({ "nodes": [{ "id": endpoint, "protocols": { "web_driver": { "browsers": { "": { "11.2": slots } } } } }] })
}

fn directory(hubs: impl HubSource + 'static, grid: Arc<FakeGrid>) -> Directory {
	Directory::new(Arc::new(hubs), grid, Arc::new(ManualClock::new(42)))
}

#[tokio::test]
async fn failing_hub_contributes_nothing() {
	let grid = Arc::new(FakeGrid::default().with("http://hub-b:4444", topology("http://node-b:4723", &["b1", "b2"])));
	let dir = directory(StaticHubs::new(["http://hub-a:4444", "http://hub-b:4444"]), grid);

	let snapshot = dir.refresh().await;
	assert_eq!(snapshot.len(), 2);
	assert!(snapshot.records().iter().all(|r| r.hub_url == "http://hub-b:4444"));
	assert_eq!(snapshot.published_at(), 42);
}

#[tokio::test]
async fn non_topology_answer_contributes_nothing() {
	let grid = Arc::new(
		FakeGrid::default()
			.with("http://hub-a:4444", json!("<html>gateway timeout</html>"))
			.with("http://hub-b:4444", topology("http://node-b:4723", &["b1"])),
	);
	let dir = directory(StaticHubs::new(["http://hub-a:4444", "http://hub-b:4444"]), grid);

	let snapshot = dir.refresh().await;
	assert_eq!(snapshot.len(), 1);
	assert_eq!(snapshot.records()[0].device_id, "b1");
}

#[tokio::test]
async fn duplicate_hubs_are_fetched_once() {
	let grid = Arc::new(FakeGrid::default().with("http://hub-a:4444", topology("http://node-a:4723", &["a1"])));
	let dir = directory(
		StaticHubs::new(["http://hub-a:4444", "http://hub-a:4444/", "http://hub-a:4444/grid/console", "not a url"]),
		Arc::clone(&grid),
	);

	let snapshot = dir.refresh().await;
	assert_eq!(snapshot.len(), 1);
	assert_eq!(*grid.calls.lock(), vec!["http://hub-a:4444".to_string()]);
}

#[tokio::test]
async fn no_hubs_publishes_empty_snapshot() {
	let grid = Arc::new(FakeGrid::default());
	let dir = directory(StaticHubs::default(), grid);
	dir.publish(vec![]);

	let snapshot = dir.refresh().await;
	assert!(snapshot.is_empty());
}

#[tokio::test]
async fn hub_list_failure_keeps_previous_snapshot() {
	let grid = Arc::new(FakeGrid::default());
	let dir = directory(BrokenHubs, grid);
	let seeded = unpack_topology("http://hub:4444", &topology("http://node:4723", &["x"])).unwrap();
	let before = dir.publish(seeded);

	let after = dir.refresh().await;
	assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn readers_keep_their_snapshot_across_refresh() {
	let grid = Arc::new(FakeGrid::default().with("http://hub-a:4444", topology("http://node-a:4723", &["a1", "a2"])));
	let dir = directory(StaticHubs::new(["http://hub-a:4444"]), grid);

	let held = dir.snapshot();
	dir.refresh().await;
	assert!(held.is_empty());
	assert_eq!(dir.snapshot().len(), 2);
}

#[test]
fn snapshot_collapses_repeated_pairs() {
	let mut records = unpack_topology("http://hub-a:4444", &topology("http://node:4723", &["d1", "d2"])).unwrap();
	records.extend(unpack_topology("http://hub-b:4444", &topology("http://node:4723", &["d1"])).unwrap());

	let snapshot = Snapshot::new(records, 0);
	assert_eq!(snapshot.len(), 2);
	assert_eq!(snapshot.records()[0].hub_url, "http://hub-a:4444");
}
