//! Registry for the service's periodic background work.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Owns spawned tasks and the shutdown signal they watch.
///
/// Dropping the registry stops everything it spawned.
#[derive(Debug)]
pub struct TaskRegistry {
	shutdown_tx: watch::Sender<bool>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
	pub fn new() -> Self {
		let (shutdown_tx, _shutdown_rx) = watch::channel(false);
		Self {
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	/// Runs `f` every `period`, first run immediately, until shutdown.
	///
	/// Runs never overlap: a slow run delays the next tick instead of
	/// stacking up. A zero `period` leaves the task unscheduled.
	pub fn spawn_interval<F, Fut>(&self, name: &'static str, period: Duration, mut f: F)
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		if period.is_zero() {
			warn!(target = "devlab.tasks", task = name, "zero period, task not started");
			return;
		}
		let mut shutdown_rx = self.shutdown_tx.subscribe();
		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			debug!(target = "devlab.tasks", task = name, period_ms = period.as_millis() as u64, "task started");
			loop {
				tokio::select! {
					_ = shutdown_rx.changed() => break,
					_ = ticker.tick() => {}
				}
				if *shutdown_rx.borrow() {
					break;
				}
				f().await;
			}
			debug!(target = "devlab.tasks", task = name, "task stopped");
		});
		self.handles.lock().push(handle);
	}

	/// Number of tasks spawned and not yet shut down.
	pub fn len(&self) -> usize {
		self.handles.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Signals every task to stop and waits for them to finish.
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(true);
		let handles: Vec<_> = self.handles.lock().drain(..).collect();
		let count = handles.len();
		for handle in handles {
			let _ = handle.await;
		}
		info!(target = "devlab.tasks", tasks = count, "background tasks stopped");
	}
}

impl Default for TaskRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for TaskRegistry {
	fn drop(&mut self) {
		let _ = self.shutdown_tx.send(true);
		for handle in self.handles.lock().drain(..) {
			handle.abort();
		}
	}
}
