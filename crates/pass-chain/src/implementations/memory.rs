//! In-memory chain backend for testing purposes.
//!
//! Simulates the pass contract and any number of ERC-20 tokens. Calldata is
//! decoded with the same ABIs the client encodes with, so a call that works
//! here is wire-compatible with the real contracts. Failure knobs let tests
//! force reverts, RPC errors, wallet states and alternative mint logs.

use crate::abi::{ContractKind, Contracts, MEMBERSHIP_MINTED_EVENT};
use crate::{ChainError, ChainInterface};
use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use pass_types::{Log, TransactionReceipt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Wallet behaviour of the simulated backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletMode {
	Connected(Address),
	/// No wallet is installed.
	Missing,
	/// The wallet refuses every request.
	Rejecting,
}

/// Shape of the log the simulated pass contract emits on mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintLogMode {
	/// `MembershipMinted(minter, tokenId, currency)` as declared.
	Standard,
	/// A log from the pass contract no known ABI describes.
	Undecodable,
	/// No mint log at all.
	Omitted,
}

/// Whether a recorded call was a read or a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
	Read,
	Transaction,
}

/// A call the backend received, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
	pub kind: CallKind,
	pub to: Address,
	pub method: String,
	pub args: Vec<DynSolValue>,
}

#[derive(Debug, Default)]
struct MemoryToken {
	decimals: u8,
	balances: HashMap<Address, U256>,
	allowances: HashMap<(Address, Address), U256>,
}

#[derive(Debug)]
struct MemoryState {
	wallet: WalletMode,
	tokens: HashMap<Address, MemoryToken>,
	owners: BTreeMap<U256, Address>,
	token_uris: BTreeMap<U256, String>,
	next_token_id: U256,
	accepted_terms: HashSet<Address>,
	safe: Option<Address>,
	treasury: Option<Address>,
	reverts: HashMap<String, String>,
	failing: HashSet<String>,
	mint_log: MintLogMode,
	calls: Vec<RecordedCall>,
	block_number: u64,
}

/// In-memory chain backend.
#[derive(Debug)]
pub struct MemoryChain {
	contracts: Contracts,
	pass: Address,
	state: Mutex<MemoryState>,
}

impl MemoryChain {
	/// Creates a chain with the pass contract at `pass` and no wallet connected.
	pub fn new(pass: Address) -> Result<Self, ChainError> {
		Ok(Self {
			contracts: Contracts::load()?,
			pass,
			state: Mutex::new(MemoryState {
				wallet: WalletMode::Missing,
				tokens: HashMap::new(),
				owners: BTreeMap::new(),
				token_uris: BTreeMap::new(),
				next_token_id: U256::from(1u64),
				accepted_terms: HashSet::new(),
				safe: None,
				treasury: None,
				reverts: HashMap::new(),
				failing: HashSet::new(),
				mint_log: MintLogMode::Standard,
				calls: Vec::new(),
				block_number: 1,
			}),
		})
	}

	pub fn set_wallet(&self, wallet: WalletMode) {
		self.state().wallet = wallet;
	}

	pub fn add_token(&self, token: Address, decimals: u8) {
		self.state().tokens.insert(
			token,
			MemoryToken {
				decimals,
				..Default::default()
			},
		);
	}

	pub fn set_balance(&self, token: Address, owner: Address, raw: U256) {
		if let Some(token) = self.state().tokens.get_mut(&token) {
			token.balances.insert(owner, raw);
		}
	}

	pub fn balance_of(&self, token: Address, owner: Address) -> U256 {
		self.state()
			.tokens
			.get(&token)
			.and_then(|token| token.balances.get(&owner).copied())
			.unwrap_or_default()
	}

	/// Records an existing pass.
	pub fn set_owner(&self, token_id: u64, owner: Address, uri: impl Into<String>) {
		let mut state = self.state();
		let id = U256::from(token_id);
		state.owners.insert(id, owner);
		state.token_uris.insert(id, uri.into());
	}

	pub fn owner_of(&self, token_id: u64) -> Option<Address> {
		self.state().owners.get(&U256::from(token_id)).copied()
	}

	pub fn set_next_token_id(&self, token_id: u64) {
		self.state().next_token_id = U256::from(token_id);
	}

	pub fn accept_terms_for(&self, account: Address) {
		self.state().accepted_terms.insert(account);
	}

	pub fn set_payout(&self, safe: Option<Address>, treasury: Option<Address>) {
		let mut state = self.state();
		state.safe = safe;
		state.treasury = treasury;
	}

	pub fn set_mint_log(&self, mode: MintLogMode) {
		self.state().mint_log = mode;
	}

	/// Makes every call of `method` revert with `reason`.
	pub fn revert_on(&self, method: &str, reason: &str) {
		self.state()
			.reverts
			.insert(method.to_string(), reason.to_string());
	}

	/// Makes every call of `method` fail at the transport level.
	pub fn fail_on(&self, method: &str) {
		self.state().failing.insert(method.to_string());
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.state().calls.clone()
	}

	/// Number of received calls of `method`, reads and transactions alike.
	pub fn call_count(&self, method: &str) -> usize {
		self.state()
			.calls
			.iter()
			.filter(|call| call.method == method)
			.count()
	}

	/// Number of transactions sent, any method.
	pub fn transaction_count(&self) -> usize {
		self.state()
			.calls
			.iter()
			.filter(|call| call.kind == CallKind::Transaction)
			.count()
	}

	fn state(&self) -> MutexGuard<'_, MemoryState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn kind_of(&self, state: &MemoryState, to: Address) -> Result<ContractKind, ChainError> {
		if to == self.pass {
			Ok(ContractKind::MembershipPass)
		} else if state.tokens.contains_key(&to) {
			Ok(ContractKind::Erc20)
		} else {
			Err(ChainError::Rpc(format!("No contract deployed at {}", to)))
		}
	}

	/// Decodes calldata, records it and applies the failure knobs.
	fn receive(
		&self,
		state: &mut MemoryState,
		kind: CallKind,
		to: Address,
		data: &[u8],
	) -> Result<(ContractKind, String, Vec<DynSolValue>), ChainError> {
		let contract = self.kind_of(state, to)?;
		if data.len() < 4 {
			return Err(ChainError::Reverted {
				reason: "missing selector".to_string(),
			});
		}
		let function = self
			.contracts
			.function_by_selector(contract, &data[..4])
			.ok_or_else(|| ChainError::Reverted {
				reason: "unknown selector".to_string(),
			})?;
		let args = function
			.abi_decode_input(&data[4..])
			.map_err(|e| ChainError::Abi(e.to_string()))?;

		state.calls.push(RecordedCall {
			kind,
			to,
			method: function.name.clone(),
			args: args.clone(),
		});

		if state.failing.contains(&function.name) {
			return Err(ChainError::Rpc(format!("{} request timed out", function.name)));
		}
		if let Some(reason) = state.reverts.get(&function.name) {
			return Err(ChainError::Reverted {
				reason: reason.clone(),
			});
		}
		Ok((contract, function.name.clone(), args))
	}

	fn view(
		&self,
		state: &MemoryState,
		contract: ContractKind,
		to: Address,
		method: &str,
		args: &[DynSolValue],
	) -> Result<Vec<DynSolValue>, ChainError> {
		match (contract, method) {
			(ContractKind::Erc20, "balanceOf") => {
				let owner = address_arg(args, 0)?;
				let balance = token(state, to)?
					.balances
					.get(&owner)
					.copied()
					.unwrap_or_default();
				Ok(vec![DynSolValue::Uint(balance, 256)])
			},
			(ContractKind::Erc20, "decimals") => Ok(vec![DynSolValue::Uint(
				U256::from(token(state, to)?.decimals),
				8,
			)]),
			(ContractKind::Erc20, "allowance") => {
				let owner = address_arg(args, 0)?;
				let spender = address_arg(args, 1)?;
				let allowance = token(state, to)?
					.allowances
					.get(&(owner, spender))
					.copied()
					.unwrap_or_default();
				Ok(vec![DynSolValue::Uint(allowance, 256)])
			},
			(ContractKind::MembershipPass, "balanceOf") => {
				let owner = address_arg(args, 0)?;
				let held = state.owners.values().filter(|o| **o == owner).count();
				Ok(vec![DynSolValue::Uint(U256::from(held), 256)])
			},
			(ContractKind::MembershipPass, "ownerOf") => {
				let id = uint_arg(args, 0)?;
				state
					.owners
					.get(&id)
					.map(|owner| vec![DynSolValue::Address(*owner)])
					.ok_or_else(|| nonexistent_token(id))
			},
			(ContractKind::MembershipPass, "tokenURI") => {
				let id = uint_arg(args, 0)?;
				state
					.token_uris
					.get(&id)
					.map(|uri| vec![DynSolValue::String(uri.clone())])
					.ok_or_else(|| nonexistent_token(id))
			},
			(ContractKind::MembershipPass, "axmcSafe") => state
				.safe
				.map(|safe| vec![DynSolValue::Address(safe)])
				.ok_or_else(|| ChainError::Reverted {
					reason: "safe not set".to_string(),
				}),
			(ContractKind::MembershipPass, "treasury") => state
				.treasury
				.map(|treasury| vec![DynSolValue::Address(treasury)])
				.ok_or_else(|| ChainError::Reverted {
					reason: "treasury not set".to_string(),
				}),
			_ => Err(ChainError::Reverted {
				reason: format!("{} is not a view method", method),
			}),
		}
	}

	fn execute(
		&self,
		state: &mut MemoryState,
		from: Address,
		contract: ContractKind,
		to: Address,
		method: &str,
		args: &[DynSolValue],
	) -> Result<Vec<Log>, ChainError> {
		match (contract, method) {
			(ContractKind::Erc20, "approve") => {
				let spender = address_arg(args, 0)?;
				let amount = uint_arg(args, 1)?;
				token_mut(state, to)?
					.allowances
					.insert((from, spender), amount);
				Ok(vec![self.erc20_log(to, "Approval", from, spender, amount)?])
			},
			(ContractKind::MembershipPass, "acceptTerms") => {
				state.accepted_terms.insert(from);
				Ok(Vec::new())
			},
			(ContractKind::MembershipPass, "mint") => self.mint(state, from, to, args),
			_ => Err(ChainError::Reverted {
				reason: format!("{} cannot be sent", method),
			}),
		}
	}

	fn mint(
		&self,
		state: &mut MemoryState,
		from: Address,
		pass: Address,
		args: &[DynSolValue],
	) -> Result<Vec<Log>, ChainError> {
		let currency = uint_arg(args, 0)?;
		let payment = address_arg(args, 1)?;
		let uri = match args.get(2) {
			Some(DynSolValue::String(uri)) => uri.clone(),
			other => return Err(ChainError::Abi(format!("expected string, got {:?}", other))),
		};

		if state.owners.values().any(|owner| *owner == from) {
			return Err(revert("Already minted"));
		}
		if !state.accepted_terms.contains(&from) {
			return Err(revert("Terms not accepted"));
		}
		let token = state
			.tokens
			.get_mut(&payment)
			.ok_or_else(|| revert("Unsupported token"))?;
		let price = token
			.allowances
			.get(&(from, pass))
			.copied()
			.unwrap_or_default();
		if price.is_zero() {
			return Err(revert("ERC20: insufficient allowance"));
		}
		let balance = token.balances.get(&from).copied().unwrap_or_default();
		if balance < price {
			return Err(revert("ERC20: transfer amount exceeds balance"));
		}
		token.balances.insert(from, balance - price);
		token.allowances.insert((from, pass), U256::ZERO);

		let token_id = state.next_token_id;
		state.next_token_id = token_id + U256::from(1u64);
		state.owners.insert(token_id, from);
		state.token_uris.insert(token_id, uri);

		let mut logs = vec![self.erc20_log(payment, "Transfer", from, pass, price)?];
		match state.mint_log {
			MintLogMode::Standard => {
				let event = self
					.contracts
					.event(ContractKind::MembershipPass, MEMBERSHIP_MINTED_EVENT)
					.ok_or_else(|| ChainError::Abi("MembershipMinted not declared".into()))?;
				logs.push(Log {
					address: pass,
					topics: vec![event.selector(), from.into_word(), word(token_id)],
					data: Bytes::from(DynSolValue::Uint(currency, 256).abi_encode()),
				});
			},
			MintLogMode::Undecodable => logs.push(Log {
				address: pass,
				topics: vec![
					keccak256("PassIssued(address,uint256)"),
					from.into_word(),
					word(token_id),
				],
				data: Bytes::new(),
			}),
			MintLogMode::Omitted => {},
		}
		Ok(logs)
	}

	fn erc20_log(
		&self,
		token: Address,
		event: &str,
		first: Address,
		second: Address,
		value: U256,
	) -> Result<Log, ChainError> {
		let event = self
			.contracts
			.event(ContractKind::Erc20, event)
			.ok_or_else(|| ChainError::Abi(format!("{} not declared", event)))?;
		Ok(Log {
			address: token,
			topics: vec![event.selector(), first.into_word(), second.into_word()],
			data: Bytes::from(DynSolValue::Uint(value, 256).abi_encode()),
		})
	}
}

#[async_trait]
impl ChainInterface for MemoryChain {
	async fn request_account(&self) -> Result<Address, ChainError> {
		match self.state().wallet {
			WalletMode::Connected(account) => Ok(account),
			WalletMode::Missing => Err(ChainError::WalletUnavailable),
			WalletMode::Rejecting => Err(ChainError::UserRejected),
		}
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
		let mut state = self.state();
		let (contract, method, args) = self.receive(&mut state, CallKind::Read, to, &data)?;
		let values = self.view(&state, contract, to, &method, &args)?;
		let function = self.contracts.function(contract, &method)?;
		function
			.abi_encode_output(&values)
			.map(Bytes::from)
			.map_err(|e| ChainError::Abi(e.to_string()))
	}

	async fn send_transaction(
		&self,
		to: Address,
		data: Bytes,
	) -> Result<TransactionReceipt, ChainError> {
		let mut state = self.state();
		let from = match state.wallet {
			WalletMode::Connected(account) => account,
			WalletMode::Missing => return Err(ChainError::WalletUnavailable),
			WalletMode::Rejecting => return Err(ChainError::UserRejected),
		};
		let (contract, method, args) =
			self.receive(&mut state, CallKind::Transaction, to, &data)?;
		let logs = self.execute(&mut state, from, contract, to, &method, &args)?;

		state.block_number += 1;
		let nonce = state.calls.len() as u64;
		let mut preimage = from.to_vec();
		preimage.extend_from_slice(&nonce.to_be_bytes());

		Ok(TransactionReceipt {
			hash: keccak256(preimage),
			block_number: state.block_number,
			success: true,
			logs,
		})
	}
}

fn token(state: &MemoryState, address: Address) -> Result<&MemoryToken, ChainError> {
	state
		.tokens
		.get(&address)
		.ok_or_else(|| ChainError::Rpc(format!("No token at {}", address)))
}

fn token_mut(state: &mut MemoryState, address: Address) -> Result<&mut MemoryToken, ChainError> {
	state
		.tokens
		.get_mut(&address)
		.ok_or_else(|| ChainError::Rpc(format!("No token at {}", address)))
}

fn address_arg(args: &[DynSolValue], index: usize) -> Result<Address, ChainError> {
	args.get(index)
		.and_then(DynSolValue::as_address)
		.ok_or_else(|| ChainError::Abi(format!("argument {} is not an address", index)))
}

fn uint_arg(args: &[DynSolValue], index: usize) -> Result<U256, ChainError> {
	args.get(index)
		.and_then(DynSolValue::as_uint)
		.map(|(value, _)| value)
		.ok_or_else(|| ChainError::Abi(format!("argument {} is not a uint", index)))
}

fn word(value: U256) -> B256 {
	B256::from(value.to_be_bytes::<32>())
}

fn revert(reason: &str) -> ChainError {
	ChainError::Reverted {
		reason: reason.to_string(),
	}
}

fn nonexistent_token(id: U256) -> ChainError {
	revert(&format!("ERC721NonexistentToken({})", id))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ChainClient, ContractRef};
	use alloy_primitives::address;
	use std::sync::Arc;

	const PASS: Address = address!("35050de3D73e58019890150f59124A57998892A3");
	const TOKEN: Address = address!("765DE816845861e75A25fCA122bb6898B8B1282a");
	const USER: Address = address!("00000000000000000000000000000000000000aa");

	fn setup() -> (Arc<MemoryChain>, ChainClient) {
		let chain = Arc::new(MemoryChain::new(PASS).unwrap());
		chain.set_wallet(WalletMode::Connected(USER));
		chain.add_token(TOKEN, 18);
		chain.set_balance(TOKEN, USER, U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64)));
		let client = ChainClient::new(chain.clone()).unwrap();
		(chain, client)
	}

	fn mint_args(currency: u8) -> Vec<DynSolValue> {
		vec![
			DynSolValue::Uint(U256::from(currency), 8),
			DynSolValue::Address(TOKEN),
			DynSolValue::String("ipfs://pass".to_string()),
		]
	}

	#[tokio::test]
	async fn test_full_mint_emits_transfer_then_membership_minted() {
		let (chain, client) = setup();
		chain.set_next_token_id(42);
		let pass = ContractRef::pass(PASS);
		let price = U256::from(55u64);

		client
			.send(
				&ContractRef::erc20(TOKEN),
				"approve",
				&[DynSolValue::Address(PASS), DynSolValue::Uint(price, 256)],
			)
			.await
			.unwrap();
		client.send(&pass, "acceptTerms", &[]).await.unwrap();
		let receipt = client.send(&pass, "mint", &mint_args(0)).await.unwrap();

		assert_eq!(receipt.logs.len(), 2);
		assert_eq!(receipt.logs[0].address, TOKEN);
		let decoded = client.decode_log(&pass, &receipt.logs[1]).unwrap();
		assert_eq!(decoded.name, MEMBERSHIP_MINTED_EVENT);
		assert_eq!(
			decoded.arg("tokenId"),
			Some(&DynSolValue::Uint(U256::from(42u64), 256))
		);
		assert_eq!(chain.owner_of(42), Some(USER));
		assert_eq!(
			client
				.read_string(&pass, "tokenURI", &[DynSolValue::Uint(U256::from(42u64), 256)])
				.await
				.unwrap(),
			"ipfs://pass"
		);
	}

	#[tokio::test]
	async fn test_mint_reverts_when_already_owner() {
		let (chain, client) = setup();
		chain.set_owner(15, USER, "ipfs://existing");

		let err = client
			.send(&ContractRef::pass(PASS), "mint", &mint_args(1))
			.await
			.unwrap_err();

		assert!(err.is_already_minted());
	}

	#[tokio::test]
	async fn test_mint_requires_terms_and_allowance() {
		let (chain, client) = setup();
		let pass = ContractRef::pass(PASS);

		let err = client.send(&pass, "mint", &mint_args(0)).await.unwrap_err();
		assert_eq!(err, revert("Terms not accepted"));

		chain.accept_terms_for(USER);
		let err = client.send(&pass, "mint", &mint_args(0)).await.unwrap_err();
		assert_eq!(err, revert("ERC20: insufficient allowance"));
	}

	#[tokio::test]
	async fn test_owner_of_unknown_token_reverts() {
		let (_chain, client) = setup();

		let err = client
			.read_address(
				&ContractRef::pass(PASS),
				"ownerOf",
				&[DynSolValue::Uint(U256::from(3u64), 256)],
			)
			.await
			.unwrap_err();

		assert!(matches!(err, ChainError::Reverted { .. }));
	}

	#[tokio::test]
	async fn test_wallet_modes() {
		let (chain, client) = setup();
		assert_eq!(client.connect().await.unwrap().address(), USER);

		chain.set_wallet(WalletMode::Rejecting);
		assert_eq!(client.connect().await.unwrap_err(), ChainError::UserRejected);

		chain.set_wallet(WalletMode::Missing);
		let err = client
			.send(&ContractRef::pass(PASS), "acceptTerms", &[])
			.await
			.unwrap_err();
		assert_eq!(err, ChainError::WalletUnavailable);
		assert_eq!(chain.transaction_count(), 0);
	}

	#[tokio::test]
	async fn test_failure_knobs_are_recorded() {
		let (chain, client) = setup();
		chain.fail_on("decimals");
		chain.revert_on("acceptTerms", "paused");

		let err = client
			.read_uint(&ContractRef::erc20(TOKEN), "decimals", &[])
			.await
			.unwrap_err();
		assert!(matches!(err, ChainError::Rpc(_)));

		let err = client
			.send(&ContractRef::pass(PASS), "acceptTerms", &[])
			.await
			.unwrap_err();
		assert_eq!(err, revert("paused"));

		assert_eq!(chain.call_count("decimals"), 1);
		assert_eq!(chain.call_count("acceptTerms"), 1);
	}
}
