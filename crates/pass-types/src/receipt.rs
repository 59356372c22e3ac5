//! Transaction receipts and event logs.
//!
//! These are chain-agnostic copies of what a provider returns once a
//! transaction is mined, so the engine never depends on a provider's types.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// Event log emitted by a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
	/// Contract address that emitted the log.
	pub address: Address,
	/// Indexed event parameters.
	/// Topic[0] is the event signature hash for non-anonymous events.
	pub topics: Vec<B256>,
	/// Non-indexed event data.
	pub data: Bytes,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: B256,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Logs in emission order, including those of other contracts.
	pub logs: Vec<Log>,
}
