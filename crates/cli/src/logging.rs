use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v` when set.
pub fn init_logging(verbose: u8) {
	let level = match verbose {
		0 => "warn,devlab=info",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
