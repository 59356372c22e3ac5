//! Pass engine facade.
//!
//! [`PassEngine`] wires the chain client, metadata service and the services
//! built on them, and exposes the operations a front end needs: connect,
//! balance and destination refreshes, the mint precondition check, minting
//! and recovery.

pub mod event_bus;

use crate::orchestrator::MintOrchestrator;
use crate::services::{BalanceService, DestinationResolver, LocateOutcome, PassLocator};
use crate::session::Session;
use crate::state::{MintAttempt, MintStateError};
use pass_chain::{ChainClient, ChainError, ChainInterface, ContractRef};
use pass_config::{Config, ConfigError};
use pass_metadata::{MetadataInterface, MetadataService};
use pass_types::{
	Account, BalanceSnapshot, Currency, FailureReason, MintEvent, PayoutDestinations,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::instrument;

/// Errors that can occur while building or driving the engine.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("State error: {0}")]
	State(#[from] MintStateError),
}

/// Entry point of the membership pass engine.
#[derive(Debug, Clone)]
pub struct PassEngine {
	config: Config,
	chain: ChainClient,
	contract: ContractRef,
	balances: BalanceService,
	destinations: DestinationResolver,
	locator: PassLocator,
	orchestrator: MintOrchestrator,
	event_bus: event_bus::EventBus,
}

impl PassEngine {
	/// Builds an engine over the given chain backend and metadata source.
	pub fn new(
		config: Config,
		chain: Arc<dyn ChainInterface>,
		metadata: Arc<dyn MetadataInterface>,
	) -> Result<Self, EngineError> {
		config.validate()?;

		let chain = ChainClient::new(chain)?;
		let contract = ContractRef::pass(config.contract.address);
		let event_bus = event_bus::EventBus::new(config.engine.event_capacity);
		let metadata = Arc::new(MetadataService::new(metadata));

		let balances = BalanceService::new(chain.clone(), config.currencies.clone());
		let destinations = DestinationResolver::new(chain.clone(), contract);
		let locator = PassLocator::new(chain.clone(), metadata);
		let orchestrator = MintOrchestrator::new(
			chain.clone(),
			contract,
			config.currencies.clone(),
			locator.clone(),
			config.contract.scan_limit,
			event_bus.clone(),
		);

		Ok(Self {
			config,
			chain,
			contract,
			balances,
			destinations,
			locator,
			orchestrator,
			event_bus,
		})
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn subscribe(&self) -> broadcast::Receiver<MintEvent> {
		self.event_bus.subscribe()
	}

	/// Connects the wallet and refreshes balances and destinations.
	///
	/// Both refreshes run concurrently; their failures are logged and leave
	/// the session's informational state empty.
	#[instrument(skip_all)]
	pub async fn connect(&self, session: &Session) -> Result<Account, FailureReason> {
		let account = self.chain.connect().await.map_err(|e| {
			tracing::warn!(error = %e, "Wallet connection failed");
			FailureReason::from(e)
		})?;
		session.set_account(account).await;
		tracing::info!(%account, "Account connected");

		let (balances, _) = tokio::join!(
			self.refresh_balances(session),
			self.resolve_destinations(session)
		);
		if let Err(reason) = balances {
			tracing::warn!(%reason, "Balances unavailable after connect");
		}
		Ok(account)
	}

	/// Refreshes the session's balance snapshot.
	///
	/// On failure the session holds no snapshot.
	pub async fn refresh_balances(
		&self,
		session: &Session,
	) -> Result<BalanceSnapshot, FailureReason> {
		let account = session
			.account()
			.await
			.ok_or(FailureReason::WalletUnavailable)?;
		match self.balances.refresh(&account).await {
			Ok(snapshot) => {
				session.set_balances(Some(snapshot.clone())).await;
				Ok(snapshot)
			},
			Err(reason) => {
				session.set_balances(None).await;
				Err(reason)
			},
		}
	}

	pub async fn resolve_destinations(&self, session: &Session) -> PayoutDestinations {
		let destinations = self.destinations.resolve().await;
		session.set_destinations(destinations).await;
		destinations
	}

	/// Reports whether `currency` can be minted right now, without chain calls.
	pub async fn can_mint(
		&self,
		session: &Session,
		currency: Currency,
	) -> Result<(), FailureReason> {
		let state = session.snapshot().await;
		self.orchestrator
			.check_preconditions(&state, currency)
			.map(|_| ())
	}

	/// Runs a mint attempt paying with `currency`.
	pub async fn mint(
		&self,
		session: &Session,
		currency: Currency,
	) -> Result<MintAttempt, EngineError> {
		Ok(self.orchestrator.mint(session, currency).await?)
	}

	/// Looks up the pass of the session's account through the recovery branch.
	pub async fn recover(&self, session: &Session) -> Result<MintAttempt, EngineError> {
		Ok(self.orchestrator.recover(session).await?)
	}

	/// Locates the pass of the connected account without driving an attempt.
	pub async fn locate(&self, session: &Session) -> Result<LocateOutcome, FailureReason> {
		let account = session
			.account()
			.await
			.ok_or(FailureReason::WalletUnavailable)?;
		let outcome = self
			.locator
			.locate(&account, &self.contract, self.config.contract.scan_limit)
			.await?;
		if let LocateOutcome::Found(pass) = &outcome {
			session.set_pass(pass.clone()).await;
		}
		Ok(outcome)
	}
}
