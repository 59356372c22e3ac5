//! Payout destinations configured on the pass contract.

use alloy_primitives::Address;
use pass_chain::{ChainClient, ContractRef};
use pass_types::PayoutDestinations;

/// Reads the safe and treasury addresses for display.
#[derive(Debug, Clone)]
pub struct DestinationResolver {
	chain: ChainClient,
	contract: ContractRef,
}

impl DestinationResolver {
	pub fn new(chain: ChainClient, contract: ContractRef) -> Self {
		Self { chain, contract }
	}

	/// Reads both destinations concurrently; a failed read leaves its value absent.
	pub async fn resolve(&self) -> PayoutDestinations {
		let (safe, treasury) = tokio::join!(self.read("axmcSafe"), self.read("treasury"));
		PayoutDestinations { safe, treasury }
	}

	async fn read(&self, method: &str) -> Option<Address> {
		match self.chain.read_address(&self.contract, method, &[]).await {
			Ok(address) => Some(address),
			Err(e) => {
				tracing::warn!(method, error = %e, "Failed to read payout destination");
				None
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pass_chain::implementations::memory::MemoryChain;
	use std::sync::Arc;

	#[tokio::test]
	async fn test_one_failure_does_not_block_the_other() {
		let pass = Address::repeat_byte(0x35);
		let treasury = Address::repeat_byte(0x7e);
		let chain = Arc::new(MemoryChain::new(pass).unwrap());
		chain.set_payout(Some(Address::repeat_byte(0x5a)), Some(treasury));
		chain.fail_on("axmcSafe");

		let resolver =
			DestinationResolver::new(ChainClient::new(chain).unwrap(), ContractRef::pass(pass));
		let destinations = resolver.resolve().await;

		assert_eq!(destinations.safe, None);
		assert_eq!(destinations.treasury, Some(treasury));
	}
}
