//! Discovery of a pass the account already owns.
//!
//! The pass contract has no owner-to-token index, so a positive balance is
//! resolved by calling `ownerOf` over ascending identifiers `1..=scan_limit`.
//! An `ownerOf` call that reverts means the identifier was never minted; it is an
//! existence check, not an error. Only the lowest matching identifier is ever
//! found, and a pass above the scan limit is reported as
//! [`LocateOutcome::ScanExhausted`].

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use pass_chain::{ChainClient, ContractRef};
use pass_metadata::MetadataService;
use pass_types::{Account, FailureReason, PassRecord};
use std::sync::Arc;
use tracing::instrument;

/// Result of a locate call.
#[derive(Debug, Clone, PartialEq)]
pub enum LocateOutcome {
	Found(PassRecord),
	/// The account's pass balance is zero.
	NotOwned,
	/// The account reports passes but none was found within the scan limit.
	ScanExhausted { balance: U256 },
}

/// Finds the pass owned by an account and loads its metadata.
#[derive(Clone)]
pub struct PassLocator {
	chain: ChainClient,
	metadata: Arc<MetadataService>,
}

impl std::fmt::Debug for PassLocator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PassLocator").finish_non_exhaustive()
	}
}

impl PassLocator {
	pub fn new(chain: ChainClient, metadata: Arc<MetadataService>) -> Self {
		Self { chain, metadata }
	}

	#[instrument(skip(self, account, contract), fields(account = %account))]
	pub async fn locate(
		&self,
		account: &Account,
		contract: &ContractRef,
		scan_limit: u64,
	) -> Result<LocateOutcome, FailureReason> {
		let balance = self
			.chain
			.read_uint(
				contract,
				"balanceOf",
				&[DynSolValue::Address(account.address())],
			)
			.await
			.map_err(FailureReason::from)?;

		if balance.is_zero() {
			return Ok(LocateOutcome::NotOwned);
		}

		match self.scan(account, contract, scan_limit).await {
			Some(token_id) => {
				tracing::info!(%token_id, "Found existing pass");
				self.load_pass(contract, token_id)
					.await
					.map(LocateOutcome::Found)
			},
			None => {
				tracing::warn!(%balance, scan_limit, "Account owns a pass outside the scan range");
				Ok(LocateOutcome::ScanExhausted { balance })
			},
		}
	}

	/// Returns the lowest identifier in `1..=scan_limit` owned by `account`.
	pub async fn scan(
		&self,
		account: &Account,
		contract: &ContractRef,
		scan_limit: u64,
	) -> Option<U256> {
		for index in 1..=scan_limit {
			let token_id = U256::from(index);
			if let Some(owner) = self.try_owner_of(contract, token_id).await {
				if account.owns(&owner) {
					return Some(token_id);
				}
			}
		}
		None
	}

	/// Queries the owner of `token_id`; any failure means no such token.
	pub async fn try_owner_of(
		&self,
		contract: &ContractRef,
		token_id: U256,
	) -> Option<Address> {
		match self
			.chain
			.read_address(contract, "ownerOf", &[DynSolValue::Uint(token_id, 256)])
			.await
		{
			Ok(owner) => Some(owner),
			Err(e) => {
				tracing::debug!(%token_id, error = %e, "No owner");
				None
			},
		}
	}

	/// Reads the token URI of `token_id` and fetches its metadata document.
	pub async fn load_pass(
		&self,
		contract: &ContractRef,
		token_id: U256,
	) -> Result<PassRecord, FailureReason> {
		let uri = self
			.chain
			.read_string(contract, "tokenURI", &[DynSolValue::Uint(token_id, 256)])
			.await
			.map_err(|e| FailureReason::MetadataUnavailable(e.to_string()))?;

		self.metadata
			.load_pass(token_id, &uri)
			.await
			.map_err(|e| FailureReason::MetadataUnavailable(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use pass_chain::implementations::memory::MemoryChain;
	use pass_metadata::implementations::memory::MemoryMetadata;
	use serde_json::json;

	const PASS: Address = address!("3535353535353535353535353535353535353535");

	struct Fixture {
		chain: Arc<MemoryChain>,
		metadata: Arc<MemoryMetadata>,
		locator: PassLocator,
		account: Account,
	}

	fn fixture() -> Fixture {
		let chain = Arc::new(MemoryChain::new(PASS).unwrap());
		let metadata = Arc::new(MemoryMetadata::new());
		let service = MetadataService::new(metadata.clone());
		let client = ChainClient::new(chain.clone()).unwrap();
		let locator = PassLocator::new(client, Arc::new(service));
		Fixture {
			chain,
			metadata,
			locator,
			account: Account::new(Address::repeat_byte(0xaa)),
		}
	}

	fn document(name: &str) -> serde_json::Map<String, serde_json::Value> {
		json!({"name": name, "image": "ipfs://image"})
			.as_object()
			.cloned()
			.unwrap()
	}

	#[tokio::test]
	async fn test_zero_balance_skips_scan() {
		let f = fixture();

		let outcome = f
			.locator
			.locate(&f.account, &ContractRef::pass(PASS), 10)
			.await
			.unwrap();

		assert_eq!(outcome, LocateOutcome::NotOwned);
		assert_eq!(f.chain.call_count("ownerOf"), 0);
	}

	#[tokio::test]
	async fn test_scan_stops_at_first_match() {
		let f = fixture();
		for id in 1..=6 {
			f.chain.set_owner(id, Address::repeat_byte(id as u8), format!("ipfs://{id}"));
		}
		f.chain.set_owner(7, f.account.address(), "ipfs://7");
		f.metadata.insert("ipfs://7", document("Pass #7")).await;

		let outcome = f
			.locator
			.locate(&f.account, &ContractRef::pass(PASS), 10)
			.await
			.unwrap();

		match outcome {
			LocateOutcome::Found(pass) => {
				assert_eq!(pass.id, "7");
				assert_eq!(pass.name(), Some("Pass #7"));
			},
			other => panic!("unexpected outcome: {:?}", other),
		}
		assert_eq!(f.chain.call_count("ownerOf"), 7);
	}

	#[tokio::test]
	async fn test_pass_beyond_limit_is_scan_exhausted() {
		let f = fixture();
		f.chain.set_owner(12, f.account.address(), "ipfs://12");

		let outcome = f
			.locator
			.locate(&f.account, &ContractRef::pass(PASS), 10)
			.await
			.unwrap();

		assert_eq!(
			outcome,
			LocateOutcome::ScanExhausted {
				balance: U256::from(1u64)
			}
		);
		assert_eq!(f.chain.call_count("ownerOf"), 10);
		assert_eq!(f.metadata.fetch_count(), 0);
	}

	#[tokio::test]
	async fn test_metadata_failure_is_metadata_unavailable() {
		let f = fixture();
		f.chain.set_owner(2, f.account.address(), "ipfs://missing");

		let err = f
			.locator
			.locate(&f.account, &ContractRef::pass(PASS), 10)
			.await
			.unwrap_err();

		assert!(matches!(err, FailureReason::MetadataUnavailable(_)));
	}

	#[tokio::test]
	async fn test_balance_read_failure_is_rpc_error() {
		let f = fixture();
		f.chain.fail_on("balanceOf");

		let err = f
			.locator
			.locate(&f.account, &ContractRef::pass(PASS), 10)
			.await
			.unwrap_err();

		assert!(matches!(err, FailureReason::RpcError(_)));
	}
}
