//! Mint attempt state machine.
//!
//! Tracks one attempt through `Idle -> Approving -> AcceptingTerms -> Minting
//! -> ExtractingResult -> FetchingMetadata -> Succeeded`, with the recovery
//! branch `RecoveringExistingPass -> Succeeded` and the terminal `Failed`.
//! Once the mint transaction has been submitted the attempt can never move
//! back to `Approving` or `Minting`.

use once_cell::sync::Lazy;
use pass_types::{Account, Currency, FailureReason, MintStep, PassRecord};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised by an attempted state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MintStateError {
	#[error("Invalid mint transition from {from} to {to}")]
	InvalidTransition { from: MintStep, to: MintStep },
	#[error("Mint already submitted; cannot enter {0}")]
	MintAlreadySubmitted(MintStep),
}

// Static transition table - each step maps to allowed next steps
static TRANSITIONS: Lazy<HashMap<MintStep, HashSet<MintStep>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		MintStep::Idle,
		HashSet::from([
			MintStep::Approving,
			MintStep::RecoveringExistingPass,
			MintStep::Failed,
		]),
	);
	m.insert(
		MintStep::Approving,
		HashSet::from([
			MintStep::AcceptingTerms,
			MintStep::RecoveringExistingPass,
			MintStep::Failed,
		]),
	);
	m.insert(
		MintStep::AcceptingTerms,
		HashSet::from([
			MintStep::Minting,
			MintStep::RecoveringExistingPass,
			MintStep::Failed,
		]),
	);
	m.insert(
		MintStep::Minting,
		HashSet::from([
			MintStep::ExtractingResult,
			MintStep::RecoveringExistingPass,
			MintStep::Failed,
		]),
	);
	m.insert(
		MintStep::ExtractingResult,
		HashSet::from([
			MintStep::FetchingMetadata,
			MintStep::RecoveringExistingPass,
			MintStep::Failed,
		]),
	);
	m.insert(
		MintStep::RecoveringExistingPass,
		HashSet::from([MintStep::Succeeded, MintStep::Failed]),
	);
	m.insert(
		MintStep::FetchingMetadata,
		HashSet::from([MintStep::Succeeded, MintStep::Failed]),
	);
	m.insert(MintStep::Succeeded, HashSet::from([MintStep::Succeeded])); // idempotent
	m.insert(MintStep::Failed, HashSet::new()); // terminal
	m
});

/// Checks if a step transition is valid.
pub fn is_valid_transition(from: MintStep, to: MintStep) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|set| set.contains(&to))
}

/// State of one mint invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MintAttempt {
	currency: Option<Currency>,
	step: MintStep,
	history: Vec<MintStep>,
	account: Option<Account>,
	mint_submitted: bool,
	pass: Option<PassRecord>,
	failure: Option<FailureReason>,
}

impl MintAttempt {
	/// Starts an attempt for `currency`; `None` for a direct recovery.
	pub fn new(currency: Option<Currency>) -> Self {
		Self {
			currency,
			step: MintStep::Idle,
			history: vec![MintStep::Idle],
			account: None,
			mint_submitted: false,
			pass: None,
			failure: None,
		}
	}

	pub fn currency(&self) -> Option<Currency> {
		self.currency
	}

	pub fn step(&self) -> MintStep {
		self.step
	}

	/// Every step entered, in order, starting with `Idle`.
	pub fn history(&self) -> &[MintStep] {
		&self.history
	}

	pub fn account(&self) -> Option<Account> {
		self.account
	}

	pub fn set_account(&mut self, account: Account) {
		self.account = Some(account);
	}

	pub fn mint_submitted(&self) -> bool {
		self.mint_submitted
	}

	pub fn pass(&self) -> Option<&PassRecord> {
		self.pass.as_ref()
	}

	pub fn failure(&self) -> Option<&FailureReason> {
		self.failure.as_ref()
	}

	pub fn is_finished(&self) -> bool {
		self.step.is_terminal()
	}

	/// Moves to `to` if the table allows it.
	pub fn advance(&mut self, to: MintStep) -> Result<(), MintStateError> {
		if self.mint_submitted && matches!(to, MintStep::Approving | MintStep::Minting) {
			return Err(MintStateError::MintAlreadySubmitted(to));
		}
		if !is_valid_transition(self.step, to) {
			return Err(MintStateError::InvalidTransition {
				from: self.step,
				to,
			});
		}
		self.step = to;
		self.history.push(to);
		Ok(())
	}

	/// Records that the mint transaction is about to be sent.
	///
	/// Fails if it was already recorded for this attempt.
	pub fn submit_mint(&mut self) -> Result<(), MintStateError> {
		if self.mint_submitted {
			return Err(MintStateError::MintAlreadySubmitted(MintStep::Minting));
		}
		self.mint_submitted = true;
		Ok(())
	}

	pub fn succeed(&mut self, pass: PassRecord) -> Result<(), MintStateError> {
		self.advance(MintStep::Succeeded)?;
		self.pass = Some(pass);
		Ok(())
	}

	/// Moves to `Failed` from any non-terminal step.
	pub fn fail(&mut self, reason: FailureReason) -> Result<(), MintStateError> {
		self.advance(MintStep::Failed)?;
		self.failure = Some(reason);
		Ok(())
	}
}
