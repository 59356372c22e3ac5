//! Chain access for the membership pass engine.
//!
//! This crate wraps the two contracts the engine talks to, the pass contract
//! and the stablecoin tokens, behind a small backend trait. Backends only move
//! raw calldata and receipts; ABI encoding and event decoding happen once in
//! [`ChainClient`] so every backend behaves identically above the wire.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use pass_types::{contains_already_minted, Account, FailureReason, Log, TransactionReceipt};
use std::sync::Arc;
use thiserror::Error;

pub mod abi;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod memory;
}

pub use abi::{ContractKind, Contracts, DecodedEvent};

/// Errors that can occur while talking to the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
	/// No signer or wallet is available to supply an account.
	#[error("No wallet available")]
	WalletUnavailable,
	/// The wallet refused the account request or a signature.
	#[error("Request rejected by user")]
	UserRejected,
	/// Node or transport failure.
	#[error("RPC error: {0}")]
	Rpc(String),
	/// A call or transaction reverted.
	#[error("Transaction reverted: {reason}")]
	Reverted { reason: String },
	/// Calldata or return data did not match the contract ABI.
	#[error("ABI error: {0}")]
	Abi(String),
}

impl ChainError {
	/// Returns true if the error carries the pass contract's "already minted" guard.
	pub fn is_already_minted(&self) -> bool {
		match self {
			ChainError::Reverted { reason } => contains_already_minted(reason),
			ChainError::Rpc(message) => contains_already_minted(message),
			_ => false,
		}
	}
}

impl From<ChainError> for FailureReason {
	fn from(err: ChainError) -> Self {
		match err {
			ChainError::WalletUnavailable => FailureReason::WalletUnavailable,
			ChainError::UserRejected => FailureReason::UserRejected,
			ChainError::Rpc(message) => FailureReason::RpcError(message),
			ChainError::Reverted { reason } => FailureReason::TransactionReverted { reason },
			ChainError::Abi(message) => FailureReason::RpcError(message),
		}
	}
}

/// Address of a deployed contract together with the ABI it speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContractRef {
	pub kind: ContractKind,
	pub address: Address,
}

impl ContractRef {
	pub fn pass(address: Address) -> Self {
		Self {
			kind: ContractKind::MembershipPass,
			address,
		}
	}

	pub fn erc20(address: Address) -> Self {
		Self {
			kind: ContractKind::Erc20,
			address,
		}
	}
}

/// Trait defining the interface for chain backends.
///
/// A backend supplies the connected account, executes read-only calls and
/// submits state-changing transactions, waiting until each one is mined.
#[async_trait]
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ChainInterface: Send + Sync {
	/// Requests the account the backend signs for.
	async fn request_account(&self) -> Result<Address, ChainError>;

	/// Executes a read-only call and returns the raw return data.
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

	/// Submits a transaction from the connected account and waits for its receipt.
	async fn send_transaction(
		&self,
		to: Address,
		data: Bytes,
	) -> Result<TransactionReceipt, ChainError>;
}

/// Typed access to the pass and token contracts over a chain backend.
#[derive(Clone)]
pub struct ChainClient {
	backend: Arc<dyn ChainInterface>,
	contracts: Contracts,
}

impl std::fmt::Debug for ChainClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChainClient").finish_non_exhaustive()
	}
}

impl ChainClient {
	pub fn new(backend: Arc<dyn ChainInterface>) -> Result<Self, ChainError> {
		Ok(Self {
			backend,
			contracts: Contracts::load()?,
		})
	}

	pub fn contracts(&self) -> &Contracts {
		&self.contracts
	}

	/// Requests the connected account from the backend.
	pub async fn connect(&self) -> Result<Account, ChainError> {
		let address = self.backend.request_account().await?;
		tracing::debug!(account = %address, "Wallet connected");
		Ok(Account::new(address))
	}

	/// Calls a view method and decodes its outputs.
	pub async fn read(
		&self,
		contract: &ContractRef,
		method: &str,
		args: &[DynSolValue],
	) -> Result<Vec<DynSolValue>, ChainError> {
		let data = self.contracts.encode_call(contract.kind, method, args)?;
		let output = self.backend.call(contract.address, data).await?;
		self.contracts.decode_output(contract.kind, method, &output)
	}

	/// Submits a state-changing call and waits until it is mined.
	///
	/// A mined transaction with a failed status is reported as a revert.
	pub async fn send(
		&self,
		contract: &ContractRef,
		method: &str,
		args: &[DynSolValue],
	) -> Result<TransactionReceipt, ChainError> {
		let data = self.contracts.encode_call(contract.kind, method, args)?;
		tracing::debug!(
			contract = %contract.address,
			method,
			data_len = data.len(),
			"Sending transaction"
		);
		let receipt = self.backend.send_transaction(contract.address, data).await?;
		if !receipt.success {
			tracing::warn!(tx_hash = %receipt.hash, method, "Transaction mined with failed status");
			return Err(ChainError::Reverted {
				reason: "transaction reverted".to_string(),
			});
		}
		Ok(receipt)
	}

	/// Decodes `log` against the ABI of `contract`.
	///
	/// Logs emitted by other addresses are ignored.
	pub fn decode_log(&self, contract: &ContractRef, log: &Log) -> Option<DecodedEvent> {
		if log.address != contract.address {
			return None;
		}
		self.contracts.decode_log(contract.kind, log)
	}

	pub async fn read_uint(
		&self,
		contract: &ContractRef,
		method: &str,
		args: &[DynSolValue],
	) -> Result<U256, ChainError> {
		let values = self.read(contract, method, args).await?;
		match values.first() {
			Some(DynSolValue::Uint(value, _)) => Ok(*value),
			other => Err(unexpected_output(method, "uint", other)),
		}
	}

	pub async fn read_address(
		&self,
		contract: &ContractRef,
		method: &str,
		args: &[DynSolValue],
	) -> Result<Address, ChainError> {
		let values = self.read(contract, method, args).await?;
		match values.first() {
			Some(DynSolValue::Address(address)) => Ok(*address),
			other => Err(unexpected_output(method, "address", other)),
		}
	}

	pub async fn read_string(
		&self,
		contract: &ContractRef,
		method: &str,
		args: &[DynSolValue],
	) -> Result<String, ChainError> {
		let values = self.read(contract, method, args).await?;
		match values.into_iter().next() {
			Some(DynSolValue::String(value)) => Ok(value),
			other => Err(unexpected_output(method, "string", other.as_ref())),
		}
	}
}

fn unexpected_output(method: &str, expected: &str, got: Option<&DynSolValue>) -> ChainError {
	ChainError::Abi(format!(
		"{} returned {:?}, expected {}",
		method, got, expected
	))
}
