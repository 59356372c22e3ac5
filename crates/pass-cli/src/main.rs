//! Command-line front end for the membership pass engine.
//!
//! Connects with the private key from the configuration file, then reads
//! balances, payout destinations or the owned pass, or runs a mint attempt.

mod commands;

use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use clap::Parser;
use commands::Commands;
use pass_chain::implementations::evm::alloy::AlloyChain;
use pass_config::Config;
use pass_core::PassEngine;
use pass_metadata::implementations::http::HttpMetadata;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pass-cli")]
#[command(about = "Membership pass minting and lookup")]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Enable debug logging
	#[arg(global = true, long, env = "PASS_DEBUG")]
	debug: bool,

	/// Config file path
	#[arg(global = true, long, env = "PASS_CONFIG", default_value = "config/pass.toml")]
	config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	init_logging(cli.debug);

	let config = Config::from_file(&cli.config)
		.await
		.with_context(|| format!("Failed to load {}", cli.config.display()))?;
	tracing::debug!(contract = %config.contract.address, "Loaded configuration");

	let engine = build_engine(config)?;
	commands::run(cli.command, engine).await
}

fn init_logging(debug: bool) {
	use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

	let default_filter = if debug {
		"pass_cli=debug,pass_core=debug,pass_chain=debug,warn"
	} else {
		"pass_cli=info,pass_core=info,warn"
	};
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::registry()
		.with(
			fmt::layer()
				.with_target(true)
				.with_thread_ids(false)
				.with_file(false)
				.with_line_number(false)
				.compact(),
		)
		.with(env_filter)
		.init();
}

fn build_engine(config: Config) -> Result<PassEngine> {
	let signer = config
		.wallet
		.private_key()
		.map(|key| key.parse::<PrivateKeySigner>())
		.transpose()
		.context("Invalid wallet private key")?;
	if signer.is_none() {
		tracing::warn!("No wallet key configured");
	}

	let chain = AlloyChain::new(&config.chain.rpc_url, config.chain.chain_id, signer)?;
	let metadata = HttpMetadata::new(
		Duration::from_secs(config.metadata.timeout_seconds),
		config.metadata.ipfs_gateway.clone(),
	)?;

	Ok(PassEngine::new(config, Arc::new(chain), Arc::new(metadata))?)
}
