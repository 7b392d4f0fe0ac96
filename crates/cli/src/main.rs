use anyhow::Result;
use bridge_cli::cli::Cli;
use bridge_cli::{BridgeConfig, BridgeServer, logging};
use clap::Parser;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = run(&cli).await {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}

async fn run(cli: &Cli) -> Result<()> {
	let config = BridgeConfig::from_cli(cli)?;
	BridgeServer::new(config).run_until_signal().await
}
