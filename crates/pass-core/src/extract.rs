//! Token identifier extraction from a mint receipt.
//!
//! The identifier is read from the first log that decodes as
//! `MembershipMinted`. Which arguments are indexed has changed across contract
//! versions, so extraction runs an ordered chain of strategies and the first
//! one that yields a non-zero identifier wins.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::U256;
use pass_chain::abi::MEMBERSHIP_MINTED_EVENT;
use pass_chain::{ChainClient, ContractRef, DecodedEvent};
use pass_types::TransactionReceipt;

/// One way of reading the token identifier from a decoded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
	/// A decoded argument looked up by name.
	NamedArgument(&'static str),
	/// A raw topic by position, topic 0 being the signature.
	PositionalTopic(usize),
}

impl ExtractionStrategy {
	pub fn extract(&self, event: &DecodedEvent) -> Option<U256> {
		match self {
			ExtractionStrategy::NamedArgument(name) => match event.arg(name)? {
				DynSolValue::Uint(value, _) => Some(*value),
				_ => None,
			},
			ExtractionStrategy::PositionalTopic(index) => {
				event.topic(*index).map(|topic| U256::from_be_bytes(topic.0))
			},
		}
	}
}

/// Strategies for the token identifier, in priority order.
pub const TOKEN_ID_STRATEGIES: [ExtractionStrategy; 2] = [
	ExtractionStrategy::NamedArgument("tokenId"),
	ExtractionStrategy::PositionalTopic(2),
];

/// Returns the first non-zero identifier any strategy reads from `event`.
pub fn token_id_from_event(event: &DecodedEvent) -> Option<U256> {
	TOKEN_ID_STRATEGIES
		.iter()
		.filter_map(|strategy| strategy.extract(event))
		.find(|id| !id.is_zero())
}

/// Extracts the minted token identifier from `receipt`.
///
/// Logs of other contracts and other events are skipped. Returns `None` if no
/// log decodes as the mint event or the first one carries no usable id.
pub fn extract_token_id(
	chain: &ChainClient,
	contract: &ContractRef,
	receipt: &TransactionReceipt,
) -> Option<U256> {
	let event = receipt
		.logs
		.iter()
		.filter_map(|log| chain.decode_log(contract, log))
		.find(|event| event.name == MEMBERSHIP_MINTED_EVENT)?;

	let token_id = token_id_from_event(&event);
	if token_id.is_none() {
		tracing::warn!(
			topics = event.topics.len(),
			"Mint event carries no token identifier"
		);
	}
	token_id
}
