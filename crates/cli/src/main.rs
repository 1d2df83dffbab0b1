use clap::Parser;
use devlab_cli::{cli::Cli, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = devlab_cli::run(cli).await {
		error!(target = "devlab", error = %format!("{err:#}"), "server failed");
		std::process::exit(1);
	}
}
