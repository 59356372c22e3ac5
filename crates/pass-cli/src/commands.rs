//! Subcommands and their handlers.

use anyhow::{anyhow, bail, Result};
use clap::Subcommand;
use pass_config::Config;
use pass_core::{LocateOutcome, MintAttempt, PassEngine, Session};
use pass_types::{Currency, MintEvent, MintStep};
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Debug, Subcommand)]
pub enum Commands {
	/// Show the connected account's balances and mint eligibility
	Balances,

	/// Show the payout destinations configured on the pass contract
	Destinations,

	/// Mint a membership pass
	Mint {
		/// Payment currency: primary, secondary or its symbol (e.g. cUSD)
		#[arg(long, default_value = "primary")]
		currency: String,

		/// Accept the terms and privacy policy
		#[arg(long)]
		accept_terms: bool,
	},

	/// Find the pass owned by the connected account
	Locate,
}

/// Runs `command` against a freshly connected session.
pub async fn run(command: Commands, engine: PassEngine) -> Result<()> {
	let session = Session::new();
	let account = engine
		.connect(&session)
		.await
		.map_err(|reason| anyhow!("Could not connect wallet: {reason}"))?;

	match command {
		Commands::Balances => {
			let state = session.snapshot().await;
			let Some(snapshot) = state.balances else {
				bail!("Balances unavailable");
			};
			let mut rows = Vec::new();
			for currency in Currency::ALL {
				let config = engine.config().currencies.get(currency);
				let balance = snapshot.get(currency).map(|b| b.display());
				rows.push(json!({
					"currency": currency,
					"symbol": config.symbol,
					"balance": balance,
					"price": config.amount.to_string(),
					"eligible": engine.can_mint(&session, currency).await.is_ok(),
				}));
			}
			print_json(&json!({ "account": account, "balances": rows }))
		},
		Commands::Destinations => {
			let destinations = session.snapshot().await.destinations;
			print_json(&json!(destinations))
		},
		Commands::Mint {
			currency,
			accept_terms,
		} => {
			let currency = resolve_currency(engine.config(), &currency)?;
			session.accept_terms(accept_terms).await;

			let progress = tokio::spawn(log_progress(engine.subscribe()));
			let attempt = engine.mint(&session, currency).await?;
			progress.abort();

			print_json(&attempt_summary(&attempt))?;
			match attempt.failure() {
				Some(reason) => bail!("Mint failed: {reason}"),
				None => Ok(()),
			}
		},
		Commands::Locate => match engine.locate(&session).await? {
			LocateOutcome::Found(pass) => print_json(&json!(pass)),
			LocateOutcome::NotOwned => print_json(&json!({ "account": account, "pass": null })),
			LocateOutcome::ScanExhausted { balance } => bail!(
				"Account holds {balance} pass(es) but none was found within the scan limit"
			),
		},
	}
}

/// Accepts a currency name, discriminant or configured symbol.
pub fn resolve_currency(config: &Config, value: &str) -> Result<Currency> {
	value
		.parse::<Currency>()
		.ok()
		.or_else(|| config.currencies.by_symbol(value))
		.ok_or_else(|| anyhow!("Unknown currency: {value}"))
}

fn attempt_summary(attempt: &MintAttempt) -> Value {
	json!({
		"currency": attempt.currency(),
		"step": attempt.step().to_string(),
		"steps": attempt.history().iter().map(MintStep::to_string).collect::<Vec<_>>(),
		"pass": attempt.pass(),
		"failure": attempt.failure().map(|reason| json!({
			"reason": reason.to_string(),
			"category": reason.category(),
		})),
	})
}

async fn log_progress(mut events: broadcast::Receiver<MintEvent>) {
	loop {
		match events.recv().await {
			Ok(MintEvent::StepEntered { step, .. }) => tracing::info!(%step, "Step entered"),
			Ok(MintEvent::TransactionConfirmed { step, tx_hash }) => {
				tracing::info!(%step, %tx_hash, "Transaction confirmed")
			},
			Ok(MintEvent::RecoveryStarted { trigger }) => {
				tracing::info!(?trigger, "Looking up existing pass")
			},
			Ok(MintEvent::Succeeded { pass_id }) => tracing::info!(%pass_id, "Pass ready"),
			Ok(MintEvent::Failed { reason }) => tracing::warn!(%reason, "Mint failed"),
			Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "Progress events dropped"),
			Err(RecvError::Closed) => break,
		}
	}
}

fn print_json(value: &Value) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
