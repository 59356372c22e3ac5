//! Progress events published by the mint workflow.
//!
//! Subscribers (a UI, the CLI, tests) observe the attempt's progress without
//! sharing any state with it.

use crate::{Currency, FailureReason, MintStep};
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Why the orchestrator entered the recovery branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryTrigger {
	/// A step failed with the contract's "already minted" guard.
	AlreadyMinted,
	/// The mint receipt carried no decodable mint event.
	UndecodableResult,
	/// The caller asked to load an existing pass directly.
	Direct,
}

/// Events emitted during a mint attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MintEvent {
	/// The attempt moved to a new step.
	StepEntered {
		currency: Option<Currency>,
		step: MintStep,
	},
	/// A transaction of `step` was mined.
	TransactionConfirmed { step: MintStep, tx_hash: B256 },
	/// The recovery branch started.
	RecoveryStarted { trigger: RecoveryTrigger },
	/// The attempt reached `Succeeded`.
	Succeeded { pass_id: String },
	/// The attempt reached `Failed`.
	Failed { reason: FailureReason },
}
