//! Mint workflow steps and failure taxonomy.
//!
//! The steps mirror the orchestrator's state machine. [`FailureReason`] is the
//! reason exposed to the caller when an attempt ends in `Failed`; it separates
//! causes the user can act on from system failures and from the ambiguous
//! "recovery exhausted" outcome.

use crate::Currency;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Revert text the pass contract uses when the account already owns a pass.
pub const ALREADY_MINTED_SIGNATURE: &str = "already minted";

/// Returns true if `text` carries the "already minted" revert signature.
pub fn contains_already_minted(text: &str) -> bool {
	text.to_ascii_lowercase().contains(ALREADY_MINTED_SIGNATURE)
}

/// Step marker of a mint attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MintStep {
	Idle,
	Approving,
	AcceptingTerms,
	Minting,
	ExtractingResult,
	RecoveringExistingPass,
	FetchingMetadata,
	Succeeded,
	Failed,
}

impl MintStep {
	pub fn is_terminal(&self) -> bool {
		matches!(self, MintStep::Succeeded | MintStep::Failed)
	}
}

impl fmt::Display for MintStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			MintStep::Idle => "idle",
			MintStep::Approving => "approving",
			MintStep::AcceptingTerms => "accepting_terms",
			MintStep::Minting => "minting",
			MintStep::ExtractingResult => "extracting_result",
			MintStep::RecoveringExistingPass => "recovering_existing_pass",
			MintStep::FetchingMetadata => "fetching_metadata",
			MintStep::Succeeded => "succeeded",
			MintStep::Failed => "failed",
		};
		f.write_str(name)
	}
}

/// Coarse classification of a failure for user-facing messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCategory {
	/// The user can fix it: connect a wallet, accept terms, top up, retry.
	UserActionable,
	/// Node, network or contract trouble outside the user's control.
	System,
	/// The mint may have happened but the pass could not be found.
	Ambiguous,
}

/// Why a mint attempt, or one of its preconditions, failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FailureReason {
	#[error("No wallet available")]
	WalletUnavailable,
	#[error("Request rejected in wallet")]
	UserRejected,
	#[error("Terms and privacy policy not accepted")]
	TermsNotAccepted,
	#[error("Insufficient {currency} balance")]
	InsufficientBalance { currency: Currency },
	#[error("A mint attempt is already in progress")]
	AttemptInProgress,
	#[error("RPC error: {0}")]
	RpcError(String),
	#[error("Transaction reverted: {reason}")]
	TransactionReverted { reason: String },
	#[error("Mint result could not be extracted from the receipt")]
	ResultExtractionFailed,
	#[error("Account reports a pass but none was found; contact support")]
	RecoveryExhausted,
	#[error("Pass metadata unavailable: {0}")]
	MetadataUnavailable(String),
	#[error("Balance unavailable for {currency}")]
	BalanceUnavailable { currency: Currency },
}

impl FailureReason {
	pub fn category(&self) -> FailureCategory {
		match self {
			FailureReason::WalletUnavailable
			| FailureReason::UserRejected
			| FailureReason::TermsNotAccepted
			| FailureReason::InsufficientBalance { .. }
			| FailureReason::AttemptInProgress => FailureCategory::UserActionable,
			FailureReason::RecoveryExhausted => FailureCategory::Ambiguous,
			FailureReason::RpcError(_)
			| FailureReason::TransactionReverted { .. }
			| FailureReason::ResultExtractionFailed
			| FailureReason::MetadataUnavailable(_)
			| FailureReason::BalanceUnavailable { .. } => FailureCategory::System,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_already_minted_signature_is_case_insensitive() {
		assert!(contains_already_minted("execution reverted: Already minted"));
		assert!(contains_already_minted("ALREADY MINTED"));
		assert!(!contains_already_minted("insufficient allowance"));
	}

	#[test]
	fn test_categories() {
		assert_eq!(
			FailureReason::InsufficientBalance {
				currency: Currency::Primary
			}
			.category(),
			FailureCategory::UserActionable
		);
		assert_eq!(
			FailureReason::UserRejected.category(),
			FailureCategory::UserActionable
		);
		assert_eq!(
			FailureReason::MetadataUnavailable("timeout".into()).category(),
			FailureCategory::System
		);
		assert_eq!(
			FailureReason::RecoveryExhausted.category(),
			FailureCategory::Ambiguous
		);
	}
}
