//! Contract ABIs and log decoding.
//!
//! The pass contract and the ERC-20 tokens are described by JSON ABIs that are
//! parsed once into a [`Contracts`] registry. Calls are encoded and outputs
//! decoded dynamically, so method names stay the single source of truth.

use crate::ChainError;
use alloy_dyn_abi::{DynSolValue, EventExt, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Event, Function, JsonAbi};
use alloy_primitives::{Bytes, B256};
use pass_types::Log;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the event the pass contract emits when a pass is minted.
pub const MEMBERSHIP_MINTED_EVENT: &str = "MembershipMinted";

const MEMBERSHIP_PASS_ABI: &str = r#"[
	{
		"type": "function",
		"name": "acceptTerms",
		"inputs": [],
		"outputs": [],
		"stateMutability": "nonpayable"
	},
	{
		"type": "function",
		"name": "mint",
		"inputs": [
			{"name": "currency", "type": "uint8", "internalType": "uint8"},
			{"name": "token", "type": "address", "internalType": "address"},
			{"name": "uri", "type": "string", "internalType": "string"}
		],
		"outputs": [],
		"stateMutability": "nonpayable"
	},
	{
		"type": "function",
		"name": "balanceOf",
		"inputs": [{"name": "owner", "type": "address", "internalType": "address"}],
		"outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}],
		"stateMutability": "view"
	},
	{
		"type": "function",
		"name": "ownerOf",
		"inputs": [{"name": "tokenId", "type": "uint256", "internalType": "uint256"}],
		"outputs": [{"name": "", "type": "address", "internalType": "address"}],
		"stateMutability": "view"
	},
	{
		"type": "function",
		"name": "tokenURI",
		"inputs": [{"name": "tokenId", "type": "uint256", "internalType": "uint256"}],
		"outputs": [{"name": "", "type": "string", "internalType": "string"}],
		"stateMutability": "view"
	},
	{
		"type": "function",
		"name": "axmcSafe",
		"inputs": [],
		"outputs": [{"name": "", "type": "address", "internalType": "address"}],
		"stateMutability": "view"
	},
	{
		"type": "function",
		"name": "treasury",
		"inputs": [],
		"outputs": [{"name": "", "type": "address", "internalType": "address"}],
		"stateMutability": "view"
	},
	{
		"type": "event",
		"name": "MembershipMinted",
		"inputs": [
			{"name": "minter", "type": "address", "indexed": true, "internalType": "address"},
			{"name": "tokenId", "type": "uint256", "indexed": true, "internalType": "uint256"},
			{"name": "currency", "type": "uint256", "indexed": false, "internalType": "uint256"}
		],
		"anonymous": false
	}
]"#;

const ERC20_ABI: &str = r#"[
	{
		"type": "function",
		"name": "approve",
		"inputs": [
			{"name": "spender", "type": "address", "internalType": "address"},
			{"name": "amount", "type": "uint256", "internalType": "uint256"}
		],
		"outputs": [{"name": "", "type": "bool", "internalType": "bool"}],
		"stateMutability": "nonpayable"
	},
	{
		"type": "function",
		"name": "allowance",
		"inputs": [
			{"name": "owner", "type": "address", "internalType": "address"},
			{"name": "spender", "type": "address", "internalType": "address"}
		],
		"outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}],
		"stateMutability": "view"
	},
	{
		"type": "function",
		"name": "balanceOf",
		"inputs": [{"name": "account", "type": "address", "internalType": "address"}],
		"outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}],
		"stateMutability": "view"
	},
	{
		"type": "function",
		"name": "decimals",
		"inputs": [],
		"outputs": [{"name": "", "type": "uint8", "internalType": "uint8"}],
		"stateMutability": "view"
	},
	{
		"type": "event",
		"name": "Transfer",
		"inputs": [
			{"name": "from", "type": "address", "indexed": true, "internalType": "address"},
			{"name": "to", "type": "address", "indexed": true, "internalType": "address"},
			{"name": "value", "type": "uint256", "indexed": false, "internalType": "uint256"}
		],
		"anonymous": false
	},
	{
		"type": "event",
		"name": "Approval",
		"inputs": [
			{"name": "owner", "type": "address", "indexed": true, "internalType": "address"},
			{"name": "spender", "type": "address", "indexed": true, "internalType": "address"},
			{"name": "value", "type": "uint256", "indexed": false, "internalType": "uint256"}
		],
		"anonymous": false
	}
]"#;

/// The contract interfaces the engine knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
	MembershipPass,
	Erc20,
}

/// An event log decoded against a known ABI.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
	/// Event name from the ABI.
	pub name: String,
	/// Named arguments in declaration order.
	///
	/// Empty when the selector matched but the payload did not fit the
	/// declared layout; the raw topics remain available.
	pub args: Vec<(String, DynSolValue)>,
	/// Raw topics of the log.
	pub topics: Vec<B256>,
}

impl DecodedEvent {
	pub fn arg(&self, name: &str) -> Option<&DynSolValue> {
		self.args
			.iter()
			.find(|(arg, _)| arg == name)
			.map(|(_, value)| value)
	}

	pub fn topic(&self, index: usize) -> Option<B256> {
		self.topics.get(index).copied()
	}
}

/// Registry of parsed contract ABIs.
#[derive(Debug, Clone)]
pub struct Contracts {
	abis: Arc<HashMap<ContractKind, JsonAbi>>,
}

impl Contracts {
	pub fn load() -> Result<Self, ChainError> {
		let mut abis = HashMap::new();
		abis.insert(ContractKind::MembershipPass, parse_abi(MEMBERSHIP_PASS_ABI)?);
		abis.insert(ContractKind::Erc20, parse_abi(ERC20_ABI)?);
		Ok(Self {
			abis: Arc::new(abis),
		})
	}

	pub fn abi(&self, kind: ContractKind) -> Result<&JsonAbi, ChainError> {
		self.abis
			.get(&kind)
			.ok_or_else(|| ChainError::Abi(format!("No ABI registered for {:?}", kind)))
	}

	pub fn function(&self, kind: ContractKind, method: &str) -> Result<&Function, ChainError> {
		self.abi(kind)?
			.function(method)
			.and_then(|overloads| overloads.first())
			.ok_or_else(|| ChainError::Abi(format!("{:?} has no method {}", kind, method)))
	}

	pub fn function_by_selector(&self, kind: ContractKind, selector: &[u8]) -> Option<&Function> {
		self.abi(kind)
			.ok()?
			.functions()
			.find(|function| function.selector().as_slice() == selector)
	}

	pub fn event(&self, kind: ContractKind, name: &str) -> Option<&Event> {
		self.abi(kind)
			.ok()?
			.event(name)
			.and_then(|overloads| overloads.first())
	}

	/// Encodes a call to `method`, selector included.
	pub fn encode_call(
		&self,
		kind: ContractKind,
		method: &str,
		args: &[DynSolValue],
	) -> Result<Bytes, ChainError> {
		let function = self.function(kind, method)?;
		function
			.abi_encode_input(args)
			.map(Bytes::from)
			.map_err(|e| ChainError::Abi(format!("Failed to encode {}: {}", method, e)))
	}

	pub fn decode_output(
		&self,
		kind: ContractKind,
		method: &str,
		data: &[u8],
	) -> Result<Vec<DynSolValue>, ChainError> {
		let function = self.function(kind, method)?;
		function
			.abi_decode_output(data)
			.map_err(|e| ChainError::Abi(format!("Failed to decode {} output: {}", method, e)))
	}

	/// Decodes a log by its signature topic.
	///
	/// Returns `None` for anonymous logs and for events the ABI does not
	/// declare.
	pub fn decode_log(&self, kind: ContractKind, log: &Log) -> Option<DecodedEvent> {
		let signature = log.topics.first()?;
		let event = self
			.abi(kind)
			.ok()?
			.events()
			.find(|event| !event.anonymous && event.selector() == *signature)?;

		let args = match event.decode_log_parts(log.topics.iter().copied(), &log.data) {
			Ok(decoded) => {
				let mut indexed = decoded.indexed.into_iter();
				let mut body = decoded.body.into_iter();
				event
					.inputs
					.iter()
					.filter_map(|param| {
						let value = if param.indexed {
							indexed.next()
						} else {
							body.next()
						};
						value.map(|value| (param.name.clone(), value))
					})
					.collect()
			},
			Err(e) => {
				tracing::debug!(event = %event.name, "Log does not match declared layout: {}", e);
				Vec::new()
			},
		};

		Some(DecodedEvent {
			name: event.name.clone(),
			args,
			topics: log.topics.clone(),
		})
	}
}

fn parse_abi(json: &str) -> Result<JsonAbi, ChainError> {
	serde_json::from_str(json).map_err(|e| ChainError::Abi(format!("Invalid ABI: {}", e)))
}
