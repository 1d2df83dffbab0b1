//! Wall-clock abstraction for lease expiry.
//!
//! Timestamps are Unix epoch milliseconds. Lock tokens carry them, so they
//! must survive serialization and stay comparable across process restarts.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Source of the current time.
pub trait Clock: Send + Sync {
	fn now(&self) -> Timestamp;
}

/// Clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Timestamp {
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis() as Timestamp)
			.unwrap_or(0)
	}
}

/// Manually advanced clock for deterministic expiry tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	now: Arc<AtomicU64>,
}

impl ManualClock {
	pub fn new(start: Timestamp) -> Self {
		Self {
			now: Arc::new(AtomicU64::new(start)),
		}
	}

	pub fn advance(&self, by: Duration) {
		self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
	}

	pub fn set(&self, to: Timestamp) {
		self.now.store(to, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Timestamp {
		self.now.load(Ordering::SeqCst)
	}
}

/// Adds a duration to a timestamp, saturating at the maximum.
pub fn after(ts: Timestamp, by: Duration) -> Timestamp {
	ts.saturating_add(by.as_millis().min(u64::MAX as u128) as u64)
}
