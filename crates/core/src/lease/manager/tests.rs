use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::*;
use crate::clock::ManualClock;

const START: Timestamp = 1_700_000_000_000;

#[derive(Default)]
struct FakeSessions {
	answers: parking_lot::Mutex<HashMap<String, Value>>,
}

impl FakeSessions {
	fn set(&self, endpoint_url: &str, document: Value) {
		self.answers.lock().insert(endpoint_url.to_string(), document);
	}
}

#[async_trait]
impl SessionSource for FakeSessions {
	async fn fetch_sessions(&self, endpoint_url: &str) -> Result<Value> {
		self.answers
			.lock()
			.get(endpoint_url)
			.cloned()
			.ok_or_else(|| LabError::upstream(endpoint_url, "connection refused"))
	}
}

fn manager() -> (LeaseManager, ManualClock, Arc<FakeSessions>) {
	let clock = ManualClock::new(START);
	let sessions = Arc::new(FakeSessions::default());
	let manager = LeaseManager::new(TokenCodec::new("lease-tests"), Arc::new(clock.clone()), Arc::clone(&sessions) as Arc<dyn SessionSource>);
	(manager, clock, sessions)
}

fn cap(manager: &LeaseManager, endpoint: &str, device: &str) -> String {
	manager.codec().encode_capability(endpoint, device)
}

const SECS_10: Duration = Duration::from_secs(10);

#[test]
fn acquire_succeeds_exactly_once() {
	let (manager, _, _) = manager();
	let token = cap(&manager, "http://ep1:4723", "dev1");

	let lease = manager.acquire(&token, SECS_10).unwrap();
	assert_eq!(lease.expires_at, START + 10_000);
	assert!(matches!(manager.acquire(&token, SECS_10), Err(LabError::Conflict(_))));
}

#[test]
fn busy_endpoint_blocks_other_device() {
	let (manager, _, _) = manager();
	manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), SECS_10).unwrap();

	let err = manager.acquire(&cap(&manager, "http://ep1:4723", "dev2"), SECS_10).unwrap_err();
	assert!(matches!(err, LabError::Conflict(ref msg) if msg.contains("endpoint:http://ep1:4723")));
}

#[test]
fn busy_device_blocks_other_endpoint() {
	let (manager, _, _) = manager();
	manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), SECS_10).unwrap();

	let err = manager.acquire(&cap(&manager, "http://ep2:4723", "dev1"), SECS_10).unwrap_err();
	assert!(matches!(err, LabError::Conflict(_)));
	assert!(!manager.read(|store| store.is_leased(&LeaseKey::endpoint("http://ep2:4723"))));
}

#[test]
fn sweep_reclaims_abandoned_lease() {
	let (manager, clock, _) = manager();
	let token = cap(&manager, "http://ep1:4723", "dev1");
	manager.acquire(&token, Duration::from_secs(1)).unwrap();

	clock.advance(Duration::from_secs(2));
	assert_eq!(manager.sweep_expired(), 2);
	assert!(manager.acquire(&token, Duration::from_secs(1)).is_ok());
}

#[test]
fn release_frees_both_keys() {
	let (manager, _, _) = manager();
	let lease = manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), SECS_10).unwrap();

	manager.release(&lease.token).unwrap();
	assert!(manager.read(LeaseStore::is_empty));
	assert!(manager.acquire(&cap(&manager, "http://ep1:4723", "dev2"), SECS_10).is_ok());
}

#[test]
fn double_release_within_window_is_ok() {
	let (manager, _, _) = manager();
	let lease = manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), SECS_10).unwrap();
	manager.release(&lease.token).unwrap();
	manager.release(&lease.token).unwrap();
}

#[test]
fn release_of_garbage_is_not_found() {
	let (manager, _, _) = manager();
	assert!(matches!(manager.release("garbage"), Err(LabError::NotFound(_))));
}

#[test]
fn release_of_expired_token_is_not_found() {
	let (manager, clock, _) = manager();
	let lease = manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), Duration::from_secs(1)).unwrap();

	clock.advance(Duration::from_secs(2));
	assert!(matches!(manager.release(&lease.token), Err(LabError::NotFound(_))));
}

#[test]
fn tokens_cannot_stand_in_for_each_other() {
	let (manager, _, _) = manager();
	let capability = cap(&manager, "http://ep1:4723", "dev1");
	let lease = manager.acquire(&capability, SECS_10).unwrap();

	assert!(matches!(manager.acquire(&lease.token, SECS_10), Err(LabError::NotFound(_))));
	assert!(matches!(manager.release(&capability), Err(LabError::NotFound(_))));
}

#[test]
fn token_from_other_secret_is_not_found() {
	let (manager, _, _) = manager();
	let foreign = TokenCodec::new("someone-else").encode_capability("http://ep1:4723", "dev1");
	assert!(matches!(manager.acquire(&foreign, SECS_10), Err(LabError::NotFound(_))));
}

#[tokio::test]
async fn refresh_extends_lease_with_live_session() {
	let (manager, clock, sessions) = manager();
	manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), SECS_10).unwrap();
	sessions.set("http://ep1:4723", json!({ "status": 0, "value": [{ "id": "s1", "capabilities": { "udid": "dev1" } }] }));

	clock.advance(Duration::from_secs(8));
	assert_eq!(manager.refresh_leases().await, 1);

	clock.advance(Duration::from_secs(8));
	assert_eq!(manager.sweep_expired(), 0);
	assert!(manager.read(|store| store.is_leased(&LeaseKey::device("dev1"))));
}

#[tokio::test]
async fn refresh_ignores_sessions_for_other_devices() {
	let (manager, _, sessions) = manager();
	manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), SECS_10).unwrap();
	sessions.set("http://ep1:4723", json!({ "value": [{ "id": "s1", "capabilities": { "udid": "dev2" } }] }));

	assert_eq!(manager.refresh_leases().await, 0);
}

#[tokio::test]
async fn refresh_survives_unreachable_endpoint() {
	let (manager, clock, sessions) = manager();
	manager.acquire(&cap(&manager, "http://down:4723", "dev1"), SECS_10).unwrap();
	manager.acquire(&cap(&manager, "http://up:4723", "dev2"), SECS_10).unwrap();
	sessions.set("http://up:4723", json!({ "value": [{ "id": "s2", "capabilities": {} }] }));

	clock.advance(Duration::from_secs(5));
	assert_eq!(manager.refresh_leases().await, 1);

	clock.advance(Duration::from_secs(6));
	assert_eq!(manager.sweep_expired(), 2);
	assert!(manager.read(|store| store.is_leased(&LeaseKey::endpoint("http://up:4723"))));
}

#[tokio::test]
async fn refresh_without_leases_does_nothing() {
	let (manager, _, _) = manager();
	assert_eq!(manager.refresh_leases().await, 0);
}

#[test]
fn release_drops_both_keys_even_if_one_is_gone() {
	let (manager, _, _) = manager();
	let lease = manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), SECS_10).unwrap();
	manager.store.lock().release(&LeaseKey::device("dev1"));

	manager.release(&lease.token).unwrap();
	assert!(manager.read(LeaseStore::is_empty));
}

#[test]
fn replayed_release_frees_newer_booking_of_same_keys() {
	let (manager, _, _) = manager();
	let first = manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), SECS_10).unwrap();
	manager.release(&first.token).unwrap();
	manager.acquire(&cap(&manager, "http://ep1:4723", "dev2"), SECS_10).unwrap();

	manager.release(&first.token).unwrap();
	assert!(!manager.read(|store| store.is_leased(&LeaseKey::endpoint("http://ep1:4723"))));
	assert!(manager.read(|store| store.is_leased(&LeaseKey::device("dev2"))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquires_grant_one_lease() {
	let (manager, _, _) = manager();
	let manager = Arc::new(manager);
	let token = cap(&manager, "http://ep1:4723", "dev1");

	let attempts: Vec<_> = (0..16)
		.map(|_| {
			let manager = Arc::clone(&manager);
			let token = token.clone();
			tokio::spawn(async move { manager.acquire(&token, SECS_10) })
		})
		.collect();

	let mut granted = 0;
	let mut conflicts = 0;
	for attempt in attempts {
		match attempt.await.unwrap() {
			Ok(_) => granted += 1,
			Err(LabError::Conflict(_)) => conflicts += 1,
			Err(err) => panic!("unexpected error: {err}"),
		}
	}
	assert_eq!(granted, 1);
	assert_eq!(conflicts, 15);
	assert_eq!(manager.read(LeaseStore::len), 2);
}

/// Rebooks the polled endpoint with another device before answering.
#[derive(Default)]
struct RebookingSessions {
	pending: parking_lot::Mutex<Option<(Arc<LeaseManager>, ManualClock, String)>>,
}

#[async_trait]
impl SessionSource for RebookingSessions {
	async fn fetch_sessions(&self, endpoint_url: &str) -> Result<Value> {
		if let Some((manager, clock, lock_token)) = self.pending.lock().take() {
			manager.release(&lock_token).unwrap();
			manager.acquire(&cap(&manager, endpoint_url, "dev2"), SECS_10).unwrap();
			clock.advance(Duration::from_secs(5));
		}
		Ok(json!({ "value": [{ "id": "s1", "capabilities": { "udid": "dev1" } }] }))
	}
}

#[tokio::test]
async fn refresh_skips_booking_replaced_during_poll() {
	let clock = ManualClock::new(START);
	let sessions = Arc::new(RebookingSessions::default());
	let manager = Arc::new(LeaseManager::new(
		TokenCodec::new("lease-tests"),
		Arc::new(clock.clone()),
		Arc::clone(&sessions) as Arc<dyn SessionSource>,
	));
	let first = manager.acquire(&cap(&manager, "http://ep1:4723", "dev1"), SECS_10).unwrap();
	*sessions.pending.lock() = Some((Arc::clone(&manager), clock.clone(), first.token));

	assert_eq!(manager.refresh_leases().await, 0);
	let expiry = |key: LeaseKey| manager.read(|store| store.get(&key).map(|record| record.expires_at));
	assert_eq!(expiry(LeaseKey::endpoint("http://ep1:4723")), Some(START + 10_000));
	assert_eq!(expiry(LeaseKey::device("dev2")), Some(START + 10_000));
	assert_eq!(expiry(LeaseKey::device("dev1")), None);

	clock.advance(Duration::from_secs(6));
	assert_eq!(manager.sweep_expired(), 2);
	assert!(manager.acquire(&cap(&manager, "http://ep1:4723", "dev3"), SECS_10).is_ok());
}
