//! Process entry point for the device lab server.

pub mod cli;
pub mod http;
pub mod logging;

use std::sync::Arc;

use anyhow::Context;
use devlab::{DeviceLab, TaskRegistry};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::Cli;

/// Starts background work, serves HTTP until Ctrl+C, then stops everything.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
	let config = cli.service_config();
	if config.secret_generated {
		warn!(target = "devlab.http", secret = %config.secret, "LOCK_SECRET not set; generated a signing secret, tokens will not survive a restart");
	}
	let lab = Arc::new(DeviceLab::from_config(config).context("invalid configuration")?);

	let registry = TaskRegistry::new();
	lab.start_background_tasks(&registry);

	let addr = cli.bind_addr();
	let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind to {addr}"))?;
	info!(target = "devlab.http", %addr, base = %lab.config().api_base_url, "listening");

	axum::serve(listener, http::router(Arc::clone(&lab)))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("server error")?;

	registry.shutdown().await;
	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		warn!(target = "devlab.http", error = %err, "cannot listen for Ctrl+C; running until killed");
		std::future::pending::<()>().await;
	}
	info!(target = "devlab.http", "shutting down");
}
