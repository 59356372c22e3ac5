//! Session context shared by the engine's components.
//!
//! A session holds everything the UI would otherwise keep as ambient state:
//! the connected account, the terms checkbox, the latest balance snapshot,
//! payout destinations and the pass once one is known. Components read and
//! write it explicitly, so the state machine can be driven without a UI.

use pass_types::{Account, BalanceSnapshot, PassRecord, PayoutDestinations};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Plain copy of a session's state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
	pub account: Option<Account>,
	pub terms_accepted: bool,
	/// `None` until a refresh succeeds, and again after a failed one.
	pub balances: Option<BalanceSnapshot>,
	pub destinations: PayoutDestinations,
	pub pass: Option<PassRecord>,
}

/// Per-session workflow context.
#[derive(Debug, Default)]
pub struct Session {
	state: RwLock<SessionState>,
	attempt_in_progress: AtomicBool,
}

impl Session {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn snapshot(&self) -> SessionState {
		self.state.read().await.clone()
	}

	pub async fn account(&self) -> Option<Account> {
		self.state.read().await.account
	}

	/// Sets the connected account.
	///
	/// Switching to a different account drops everything derived from the
	/// previous one.
	pub async fn set_account(&self, account: Account) {
		let mut state = self.state.write().await;
		if state.account != Some(account) {
			state.balances = None;
			state.destinations = PayoutDestinations::default();
			state.pass = None;
		}
		state.account = Some(account);
	}

	pub async fn accept_terms(&self, accepted: bool) {
		self.state.write().await.terms_accepted = accepted;
	}

	pub async fn set_balances(&self, balances: Option<BalanceSnapshot>) {
		self.state.write().await.balances = balances;
	}

	pub async fn set_destinations(&self, destinations: PayoutDestinations) {
		self.state.write().await.destinations = destinations;
	}

	pub async fn pass(&self) -> Option<PassRecord> {
		self.state.read().await.pass.clone()
	}

	pub async fn set_pass(&self, pass: PassRecord) {
		self.state.write().await.pass = Some(pass);
	}

	/// Marks a mint attempt as in flight.
	///
	/// Returns `None` if another attempt already holds the session.
	pub fn begin_attempt(&self) -> Option<AttemptGuard<'_>> {
		self.attempt_in_progress
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| AttemptGuard {
				flag: &self.attempt_in_progress,
			})
	}

	pub fn attempt_in_progress(&self) -> bool {
		self.attempt_in_progress.load(Ordering::Acquire)
	}
}

/// Releases the session's attempt slot when dropped.
#[derive(Debug)]
pub struct AttemptGuard<'a> {
	flag: &'a AtomicBool,
}

impl Drop for AttemptGuard<'_> {
	fn drop(&mut self) {
		self.flag.store(false, Ordering::Release);
	}
}
