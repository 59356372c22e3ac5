//! Mint orchestrator.
//!
//! Drives approve, acceptTerms and mint strictly in sequence, extracts the new
//! token identifier from the receipt and loads the pass metadata. Every step's
//! failure is first checked for the contract's "already minted" guard, which
//! redirects into recovery through the [`PassLocator`]. A receipt without a
//! decodable mint event also falls through to recovery, since the mint may
//! have succeeded anyway.

use crate::engine::event_bus::EventBus;
use crate::extract::extract_token_id;
use crate::services::{required_amount, LocateOutcome, PassLocator};
use crate::session::{Session, SessionState};
use crate::state::{MintAttempt, MintStateError};
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::U256;
use pass_chain::{ChainClient, ChainError, ContractRef};
use pass_config::CurrenciesConfig;
use pass_types::{
	Account, Currency, FailureReason, MintEvent, MintStep, PassRecord, RecoveryTrigger,
	TransactionReceipt,
};
use tracing::instrument;

/// Runs mint attempts and recoveries against one pass contract.
#[derive(Debug, Clone)]
pub struct MintOrchestrator {
	chain: ChainClient,
	contract: ContractRef,
	currencies: CurrenciesConfig,
	locator: PassLocator,
	scan_limit: u64,
	event_bus: EventBus,
}

impl MintOrchestrator {
	pub fn new(
		chain: ChainClient,
		contract: ContractRef,
		currencies: CurrenciesConfig,
		locator: PassLocator,
		scan_limit: u64,
		event_bus: EventBus,
	) -> Self {
		Self {
			chain,
			contract,
			currencies,
			locator,
			scan_limit,
			event_bus,
		}
	}

	/// Checks that `currency` can be minted with the session as it stands.
	///
	/// Returns the account and the raw amount to approve. Performs no chain
	/// calls.
	pub fn check_preconditions(
		&self,
		state: &SessionState,
		currency: Currency,
	) -> Result<(Account, U256), FailureReason> {
		let account = state.account.ok_or(FailureReason::WalletUnavailable)?;
		if !state.terms_accepted {
			return Err(FailureReason::TermsNotAccepted);
		}
		let balance = state
			.balances
			.as_ref()
			.and_then(|snapshot| snapshot.get(currency))
			.ok_or(FailureReason::BalanceUnavailable { currency })?;
		let amount = required_amount(&self.currencies, currency, balance.decimals)?;
		if !balance.covers(amount) {
			return Err(FailureReason::InsufficientBalance { currency });
		}
		Ok((account, amount))
	}

	/// Runs a full mint attempt paying with `currency`.
	///
	/// The returned attempt always ends in `Succeeded` or `Failed`.
	#[instrument(skip(self, session))]
	pub async fn mint(
		&self,
		session: &Session,
		currency: Currency,
	) -> Result<MintAttempt, MintStateError> {
		let mut attempt = MintAttempt::new(Some(currency));
		let Some(_guard) = session.begin_attempt() else {
			self.finish_failed(&mut attempt, FailureReason::AttemptInProgress)?;
			return Ok(attempt);
		};

		let state = session.snapshot().await;
		match self.check_preconditions(&state, currency) {
			Ok((account, amount)) => {
				attempt.set_account(account);
				self.run(session, &mut attempt, currency, amount).await?;
			},
			Err(reason) => {
				tracing::info!(%reason, "Mint refused before any chain call");
				self.finish_failed(&mut attempt, reason)?;
			},
		}
		Ok(attempt)
	}

	/// Enters recovery directly, e.g. after an interrupted attempt.
	#[instrument(skip(self, session))]
	pub async fn recover(&self, session: &Session) -> Result<MintAttempt, MintStateError> {
		let mut attempt = MintAttempt::new(None);
		let Some(_guard) = session.begin_attempt() else {
			self.finish_failed(&mut attempt, FailureReason::AttemptInProgress)?;
			return Ok(attempt);
		};
		self.recover_into(session, &mut attempt, RecoveryTrigger::Direct)
			.await?;
		Ok(attempt)
	}

	async fn run(
		&self,
		session: &Session,
		attempt: &mut MintAttempt,
		currency: Currency,
		amount: U256,
	) -> Result<(), MintStateError> {
		let config = self.currencies.get(currency);
		let token = ContractRef::erc20(config.token);

		self.enter(attempt, MintStep::Approving)?;
		let approve = [
			DynSolValue::Address(self.contract.address),
			DynSolValue::Uint(amount, 256),
		];
		if let Err(e) = self.send_step(attempt, &token, "approve", &approve).await {
			return self.on_step_error(session, attempt, e).await;
		}

		self.enter(attempt, MintStep::AcceptingTerms)?;
		if let Err(e) = self
			.send_step(attempt, &self.contract, "acceptTerms", &[])
			.await
		{
			return self.on_step_error(session, attempt, e).await;
		}

		self.enter(attempt, MintStep::Minting)?;
		attempt.submit_mint()?;
		let mint = [
			DynSolValue::Uint(U256::from(currency.discriminant()), 8),
			DynSolValue::Address(config.token),
			DynSolValue::String(config.metadata_uri.clone()),
		];
		let receipt = match self.send_step(attempt, &self.contract, "mint", &mint).await {
			Ok(receipt) => receipt,
			Err(e) => return self.on_step_error(session, attempt, e).await,
		};

		self.enter(attempt, MintStep::ExtractingResult)?;
		let Some(token_id) = extract_token_id(&self.chain, &self.contract, &receipt) else {
			tracing::warn!(tx_hash = %receipt.hash, "No mint event in receipt, looking up pass");
			return self
				.recover_into(session, attempt, RecoveryTrigger::UndecodableResult)
				.await;
		};
		tracing::info!(%token_id, "Pass minted");

		self.enter(attempt, MintStep::FetchingMetadata)?;
		match self.locator.load_pass(&self.contract, token_id).await {
			Ok(pass) => self.finish_succeeded(session, attempt, pass).await,
			Err(reason) => self.finish_failed(attempt, reason),
		}
	}

	async fn recover_into(
		&self,
		session: &Session,
		attempt: &mut MintAttempt,
		trigger: RecoveryTrigger,
	) -> Result<(), MintStateError> {
		self.enter(attempt, MintStep::RecoveringExistingPass)?;
		self.event_bus
			.publish(MintEvent::RecoveryStarted { trigger })
			.ok();

		let account = match attempt.account() {
			Some(account) => account,
			None => match self.reacquire_account(session).await {
				Ok(account) => {
					attempt.set_account(account);
					account
				},
				Err(reason) => return self.finish_failed(attempt, reason),
			},
		};

		match self
			.locator
			.locate(&account, &self.contract, self.scan_limit)
			.await
		{
			Ok(LocateOutcome::Found(pass)) => self.finish_succeeded(session, attempt, pass).await,
			Ok(outcome) => {
				tracing::warn!(?outcome, ?trigger, "Recovery found no pass");
				let reason = match trigger {
					RecoveryTrigger::UndecodableResult => FailureReason::ResultExtractionFailed,
					RecoveryTrigger::AlreadyMinted | RecoveryTrigger::Direct => {
						FailureReason::RecoveryExhausted
					},
				};
				self.finish_failed(attempt, reason)
			},
			Err(reason) => self.finish_failed(attempt, reason),
		}
	}

	/// Uses the session's account, connecting the wallet if there is none.
	async fn reacquire_account(&self, session: &Session) -> Result<Account, FailureReason> {
		if let Some(account) = session.account().await {
			return Ok(account);
		}
		let account = self.chain.connect().await.map_err(FailureReason::from)?;
		session.set_account(account).await;
		Ok(account)
	}

	async fn on_step_error(
		&self,
		session: &Session,
		attempt: &mut MintAttempt,
		err: ChainError,
	) -> Result<(), MintStateError> {
		if err.is_already_minted() {
			tracing::info!(step = %attempt.step(), "Account already minted, looking up pass");
			return self
				.recover_into(session, attempt, RecoveryTrigger::AlreadyMinted)
				.await;
		}
		self.finish_failed(attempt, err.into())
	}

	async fn send_step(
		&self,
		attempt: &MintAttempt,
		contract: &ContractRef,
		method: &str,
		args: &[DynSolValue],
	) -> Result<TransactionReceipt, ChainError> {
		let receipt = self.chain.send(contract, method, args).await?;
		tracing::info!(tx_hash = %receipt.hash, block = receipt.block_number, method, "Transaction confirmed");
		self.event_bus
			.publish(MintEvent::TransactionConfirmed {
				step: attempt.step(),
				tx_hash: receipt.hash,
			})
			.ok();
		Ok(receipt)
	}

	fn enter(&self, attempt: &mut MintAttempt, step: MintStep) -> Result<(), MintStateError> {
		attempt.advance(step)?;
		tracing::info!(%step, currency = ?attempt.currency(), "Mint step");
		self.event_bus
			.publish(MintEvent::StepEntered {
				currency: attempt.currency(),
				step,
			})
			.ok();
		Ok(())
	}

	async fn finish_succeeded(
		&self,
		session: &Session,
		attempt: &mut MintAttempt,
		pass: PassRecord,
	) -> Result<(), MintStateError> {
		attempt.succeed(pass.clone())?;
		tracing::info!(pass_id = %pass.id, "Mint attempt succeeded");
		self.event_bus
			.publish(MintEvent::Succeeded {
				pass_id: pass.id.clone(),
			})
			.ok();
		session.set_pass(pass).await;
		Ok(())
	}

	fn finish_failed(
		&self,
		attempt: &mut MintAttempt,
		reason: FailureReason,
	) -> Result<(), MintStateError> {
		let step = attempt.step();
		attempt.fail(reason.clone())?;
		tracing::warn!(
			%step,
			category = ?reason.category(),
			%reason,
			"Mint attempt failed"
		);
		self.event_bus.publish(MintEvent::Failed { reason }).ok();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::PassLocator;
	use alloy_primitives::{address, Address, Bytes, B256};
	use pass_chain::MockChainInterface;
	use pass_config::Config;
	use pass_metadata::{MetadataService, MockMetadataInterface};
	use pass_types::{BalanceSnapshot, TokenBalance};
	use std::str::FromStr;
	use std::sync::Arc;

	const CONFIG: &str = r#"
[chain]
rpc_url = "http://localhost:8545"
chain_id = 42220

[contract]
address = "0x35050de3D73e58019890150f59124A57998892A3"
scan_limit = 5

[currencies.primary]
symbol = "cUSD"
token = "0x765DE816845861e75A25fCA122bb6898B8B1282a"
amount = "55"
metadata_uri = "ipfs://pass"

[currencies.secondary]
symbol = "cEUR"
token = "0xD8763CBa276a3738E6DE85b4b3bF5FDed6D6cA73"
amount = "50"
metadata_uri = "ipfs://pass"
"#;

	const USER: Address = address!("00000000000000000000000000000000000000aa");

	fn orchestrator(chain: MockChainInterface) -> MintOrchestrator {
		let config = Config::from_str(CONFIG).unwrap();
		let client = ChainClient::new(Arc::new(chain)).unwrap();
		let metadata = MetadataService::new(Arc::new(MockMetadataInterface::new()));
		let locator = PassLocator::new(client.clone(), Arc::new(metadata));
		MintOrchestrator::new(
			client,
			ContractRef::pass(config.contract.address),
			config.currencies,
			locator,
			config.contract.scan_limit,
			EventBus::new(16),
		)
	}

	fn snapshot(primary: u64, secondary: u64) -> BalanceSnapshot {
		let units = |whole: u64| U256::from(whole) * U256::from(10u64).pow(U256::from(18u64));
		BalanceSnapshot::from_entries([
			(Currency::Primary, TokenBalance::new(units(primary), 18)),
			(Currency::Secondary, TokenBalance::new(units(secondary), 18)),
		])
		.unwrap()
	}

	fn ready_state(primary: u64) -> SessionState {
		SessionState {
			account: Some(Account::new(USER)),
			terms_accepted: true,
			balances: Some(snapshot(primary, 0)),
			..Default::default()
		}
	}

	#[test]
	fn test_preconditions() {
		let orchestrator = orchestrator(MockChainInterface::new());

		assert!(orchestrator
			.check_preconditions(&ready_state(60), Currency::Primary)
			.is_ok());
		assert_eq!(
			orchestrator.check_preconditions(&SessionState::default(), Currency::Primary),
			Err(FailureReason::WalletUnavailable)
		);
		assert_eq!(
			orchestrator.check_preconditions(
				&SessionState {
					terms_accepted: false,
					..ready_state(60)
				},
				Currency::Primary
			),
			Err(FailureReason::TermsNotAccepted)
		);
		assert_eq!(
			orchestrator.check_preconditions(&ready_state(40), Currency::Primary),
			Err(FailureReason::InsufficientBalance {
				currency: Currency::Primary
			})
		);
		assert_eq!(
			orchestrator.check_preconditions(
				&SessionState {
					balances: None,
					..ready_state(60)
				},
				Currency::Secondary
			),
			Err(FailureReason::BalanceUnavailable {
				currency: Currency::Secondary
			})
		);
	}

	#[tokio::test]
	async fn test_approval_rejection_is_terminal() {
		let mut chain = MockChainInterface::new();
		chain
			.expect_send_transaction()
			.times(1)
			.returning(|_, _| Box::pin(async { Err(ChainError::UserRejected) }));
		chain.expect_call().never();
		let orchestrator = orchestrator(chain);

		let session = Session::new();
		session.set_account(Account::new(USER)).await;
		session.accept_terms(true).await;
		session.set_balances(Some(snapshot(60, 0))).await;

		let attempt = orchestrator.mint(&session, Currency::Primary).await.unwrap();

		assert_eq!(attempt.step(), MintStep::Failed);
		assert_eq!(attempt.failure(), Some(&FailureReason::UserRejected));
		assert_eq!(
			attempt.history(),
			&[MintStep::Idle, MintStep::Approving, MintStep::Failed]
		);
		assert!(!session.attempt_in_progress());
	}

	#[tokio::test]
	async fn test_overlapping_attempt_is_refused() {
		let orchestrator = orchestrator(MockChainInterface::new());
		let session = Session::new();
		let _guard = session.begin_attempt().unwrap();

		let attempt = orchestrator.mint(&session, Currency::Primary).await.unwrap();

		assert_eq!(attempt.failure(), Some(&FailureReason::AttemptInProgress));
	}

	#[tokio::test]
	async fn test_accept_terms_revert_with_already_minted_enters_recovery() {
		let mut chain = MockChainInterface::new();
		let mut sent = 0;
		chain.expect_send_transaction().times(2).returning(move |_, _| {
			sent += 1;
			let result = if sent == 1 {
				Ok(TransactionReceipt {
					hash: B256::repeat_byte(1),
					block_number: 1,
					success: true,
					logs: vec![],
				})
			} else {
				Err(ChainError::Reverted {
					reason: "execution reverted: Already minted".to_string(),
				})
			};
			Box::pin(async move { result })
		});
		// balanceOf reports zero: nothing to find.
		chain.expect_call().times(1).returning(|_, _| {
			Box::pin(async { Ok(Bytes::from(DynSolValue::Uint(U256::ZERO, 256).abi_encode())) })
		});
		let orchestrator = orchestrator(chain);

		let session = Session::new();
		session.set_account(Account::new(USER)).await;
		session.accept_terms(true).await;
		session.set_balances(Some(snapshot(60, 0))).await;

		let attempt = orchestrator.mint(&session, Currency::Primary).await.unwrap();

		assert!(attempt
			.history()
			.contains(&MintStep::RecoveringExistingPass));
		assert!(!attempt.mint_submitted());
		assert_eq!(attempt.failure(), Some(&FailureReason::RecoveryExhausted));
	}
}
