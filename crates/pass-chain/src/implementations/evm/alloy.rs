//! Alloy-based chain backend.
//!
//! Reads go through `eth_call`; transactions are signed by a local private key
//! and awaited until their receipt is available. JSON-RPC failures are mapped
//! onto [`ChainError`] so wallet rejections and reverts stay distinguishable.

use crate::{ChainError, ChainInterface};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address, Bytes};
use alloy_provider::{DynProvider, PendingTransactionError, Provider, ProviderBuilder};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::decode_revert_reason;
use alloy_transport::layers::RetryBackoffLayer;
use alloy_transport::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use pass_types::{Log, TransactionReceipt};

/// EIP-1193 code for a request the user rejected in their wallet.
const USER_REJECTED_CODE: i64 = 4001;
/// JSON-RPC code nodes use for execution reverts.
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Chain backend talking JSON-RPC through an Alloy provider.
pub struct AlloyChain {
	provider: DynProvider,
	/// Account of the configured signer, if any.
	account: Option<Address>,
}

impl AlloyChain {
	/// Creates a backend for `rpc_url`.
	///
	/// Without a signer the backend can still read, but requesting an account
	/// or sending a transaction fails with [`ChainError::WalletUnavailable`].
	pub fn new(
		rpc_url: &str,
		chain_id: u64,
		signer: Option<PrivateKeySigner>,
	) -> Result<Self, ChainError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ChainError::Rpc(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

		let retry_layer = RetryBackoffLayer::new(
			5,    // max_retry
			1000, // initial backoff in milliseconds
			10,   // compute units per second
		);
		let client = RpcClient::builder().layer(retry_layer).http(url);

		let account = signer.as_ref().map(|signer| signer.address());
		let provider = match signer {
			Some(signer) => {
				let wallet = EthereumWallet::from(signer.with_chain_id(Some(chain_id)));
				ProviderBuilder::new()
					.wallet(wallet)
					.connect_client(client)
					.erased()
			},
			None => ProviderBuilder::new().connect_client(client).erased(),
		};

		Ok(Self { provider, account })
	}
}

#[async_trait]
impl ChainInterface for AlloyChain {
	async fn request_account(&self) -> Result<Address, ChainError> {
		self.account.ok_or(ChainError::WalletUnavailable)
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
		let mut request = TransactionRequest::default().to(to).input(data.into());
		if let Some(from) = self.account {
			request = request.from(from);
		}
		self.provider.call(request).await.map_err(map_rpc_error)
	}

	async fn send_transaction(
		&self,
		to: Address,
		data: Bytes,
	) -> Result<TransactionReceipt, ChainError> {
		let from = self.account.ok_or(ChainError::WalletUnavailable)?;
		let request = TransactionRequest::default()
			.from(from)
			.to(to)
			.input(data.into());

		let pending = self
			.provider
			.send_transaction(request)
			.await
			.map_err(map_rpc_error)?;
		let tx_hash = *pending.tx_hash();
		tracing::info!(tx_hash = %tx_hash, "Transaction submitted");

		let receipt = pending.get_receipt().await.map_err(|e| match e {
			PendingTransactionError::TransportError(e) => map_rpc_error(e),
			PendingTransactionError::FailedToRegister => {
				ChainError::Rpc("Failed to register transaction watcher".to_string())
			},
			PendingTransactionError::Recv(_) | PendingTransactionError::TxWatcher(_) => {
				ChainError::Rpc(format!("Failed to confirm transaction: {}", e))
			},
		})?;

		Ok(convert_receipt(&receipt))
	}
}

fn convert_receipt(receipt: &alloy_rpc_types::TransactionReceipt) -> TransactionReceipt {
	let logs = receipt
		.inner
		.logs()
		.iter()
		.map(|log| Log {
			address: log.address(),
			topics: log.topics().to_vec(),
			data: log.inner.data.data.clone(),
		})
		.collect();

	TransactionReceipt {
		hash: receipt.transaction_hash,
		block_number: receipt.block_number.unwrap_or_default(),
		success: receipt.status(),
		logs,
	}
}

/// Maps a JSON-RPC failure onto the chain error taxonomy.
fn map_rpc_error(err: RpcError<TransportErrorKind>) -> ChainError {
	let Some(payload) = err.as_error_resp() else {
		return ChainError::Rpc(err.to_string());
	};

	let message = payload.message.to_string();
	let lowered = message.to_ascii_lowercase();
	if payload.code == USER_REJECTED_CODE
		|| lowered.contains("user rejected")
		|| lowered.contains("user denied")
	{
		return ChainError::UserRejected;
	}

	let data_reason = payload
		.data
		.as_ref()
		.and_then(|data| serde_json::from_str::<Bytes>(data.get()).ok())
		.and_then(|data| decode_revert_reason(&data));

	if let Some(reason) = data_reason {
		return ChainError::Reverted { reason };
	}
	if payload.code == EXECUTION_REVERTED_CODE || lowered.contains("revert") {
		return ChainError::Reverted { reason: message };
	}
	ChainError::Rpc(message)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_json_rpc::ErrorPayload;
	use alloy_primitives::B256;

	fn error_response(code: i64, message: &str, data: Option<&str>) -> RpcError<TransportErrorKind> {
		let payload: ErrorPayload = serde_json::from_value(serde_json::json!({
			"code": code,
			"message": message,
			"data": data,
		}))
		.unwrap();
		RpcError::ErrorResp(payload)
	}

	#[test]
	fn test_user_rejection_code() {
		let err = map_rpc_error(error_response(4001, "User rejected the request.", None));
		assert_eq!(err, ChainError::UserRejected);
	}

	#[test]
	fn test_revert_message_is_kept() {
		let err = map_rpc_error(error_response(
			-32000,
			"execution reverted: Already minted",
			None,
		));
		assert!(err.is_already_minted());
	}

	#[test]
	fn test_revert_data_is_decoded() {
		// Error(string) with "Already minted"
		let data = "0x08c379a0\
			0000000000000000000000000000000000000000000000000000000000000020\
			000000000000000000000000000000000000000000000000000000000000000e\
			416c7265616479206d696e746564000000000000000000000000000000000000";
		let err = map_rpc_error(error_response(3, "execution reverted", Some(data)));

		match err {
			ChainError::Reverted { reason } => assert!(reason.contains("Already minted")),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn test_other_errors_are_rpc() {
		let err = map_rpc_error(error_response(-32603, "header not found", None));
		assert_eq!(err, ChainError::Rpc("header not found".to_string()));
	}

	#[test]
	fn test_convert_receipt_keeps_logs_in_order() {
		let receipt: alloy_rpc_types::TransactionReceipt =
			serde_json::from_value(serde_json::json!({
				"transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
				"transactionIndex": "0x0",
				"blockHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
				"blockNumber": "0x1b4",
				"from": "0x0000000000000000000000000000000000000001",
				"to": "0x35050de3d73e58019890150f59124a57998892a3",
				"gasUsed": "0x5208",
				"effectiveGasPrice": "0x3b9aca00",
				"cumulativeGasUsed": "0x5208",
				"contractAddress": null,
				"logsBloom": format!("0x{}", "0".repeat(512)),
				"type": "0x2",
				"status": "0x1",
				"logs": [
					{
						"address": "0x765de816845861e75a25fca122bb6898b8b1282a",
						"topics": [
							"0x3333333333333333333333333333333333333333333333333333333333333333"
						],
						"data": "0x",
						"blockHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
						"blockNumber": "0x1b4",
						"transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
						"transactionIndex": "0x0",
						"logIndex": "0x0",
						"removed": false
					},
					{
						"address": "0x35050de3d73e58019890150f59124a57998892a3",
						"topics": [
							"0x4444444444444444444444444444444444444444444444444444444444444444",
							"0x000000000000000000000000000000000000000000000000000000000000002a"
						],
						"data": "0xdeadbeef",
						"blockHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
						"blockNumber": "0x1b4",
						"transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
						"transactionIndex": "0x0",
						"logIndex": "0x1",
						"removed": false
					}
				]
			}))
			.unwrap();

		let converted = convert_receipt(&receipt);

		assert_eq!(converted.hash, B256::repeat_byte(0x11));
		assert_eq!(converted.block_number, 436);
		assert!(converted.success);
		assert_eq!(converted.logs.len(), 2);
		assert_eq!(
			converted.logs[0].address,
			"0x765DE816845861e75A25fCA122bb6898B8B1282a".parse::<Address>().unwrap()
		);
		assert_eq!(converted.logs[0].topics, vec![B256::repeat_byte(0x33)]);
		assert!(converted.logs[0].data.is_empty());
		assert_eq!(
			converted.logs[1].address,
			"0x35050de3D73e58019890150f59124A57998892A3".parse::<Address>().unwrap()
		);
		assert_eq!(converted.logs[1].topics[0], B256::repeat_byte(0x44));
		assert_eq!(converted.logs[1].topics[1], B256::with_last_byte(0x2a));
		assert_eq!(converted.logs[1].data, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]));
	}

	#[tokio::test]
	async fn test_without_signer_wallet_is_unavailable() {
		let chain = AlloyChain::new("http://127.0.0.1:8545", 42220, None).unwrap();
		assert_eq!(
			chain.request_account().await,
			Err(ChainError::WalletUnavailable)
		);
		assert_eq!(
			chain
				.send_transaction(Address::ZERO, Bytes::new())
				.await
				.unwrap_err(),
			ChainError::WalletUnavailable
		);
	}
}
