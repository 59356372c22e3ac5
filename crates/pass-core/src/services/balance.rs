//! Payment-token balances of the connected account.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::U256;
use pass_chain::{ChainClient, ChainError, ContractRef};
use pass_config::CurrenciesConfig;
use pass_types::{parse_token_amount, Account, BalanceSnapshot, Currency, FailureReason, TokenBalance};
use tracing::instrument;

/// Reads balances and decimals of every supported currency.
#[derive(Debug, Clone)]
pub struct BalanceService {
	chain: ChainClient,
	currencies: CurrenciesConfig,
}

impl BalanceService {
	pub fn new(chain: ChainClient, currencies: CurrenciesConfig) -> Self {
		Self { chain, currencies }
	}

	/// Builds a snapshot covering every currency, or fails as a whole.
	#[instrument(skip(self, account), fields(account = %account))]
	pub async fn refresh(&self, account: &Account) -> Result<BalanceSnapshot, FailureReason> {
		let mut entries = Vec::with_capacity(Currency::ALL.len());
		for currency in Currency::ALL {
			let balance = self.read_balance(account, currency).await.map_err(|e| {
				tracing::warn!(%currency, error = %e, "Balance read failed");
				FailureReason::BalanceUnavailable { currency }
			})?;
			entries.push((currency, balance));
		}

		BalanceSnapshot::from_entries(entries).ok_or_else(|| {
			FailureReason::BalanceUnavailable {
				currency: Currency::Primary,
			}
		})
	}

	async fn read_balance(
		&self,
		account: &Account,
		currency: Currency,
	) -> Result<TokenBalance, ChainError> {
		let token = ContractRef::erc20(self.currencies.get(currency).token);
		let decimals = self.decimals(&token).await?;
		let raw = self
			.chain
			.read_uint(
				&token,
				"balanceOf",
				&[DynSolValue::Address(account.address())],
			)
			.await?;
		Ok(TokenBalance::new(raw, decimals))
	}

	async fn decimals(&self, token: &ContractRef) -> Result<u8, ChainError> {
		let decimals = self.chain.read_uint(token, "decimals", &[]).await?;
		u8::try_from(decimals)
			.map_err(|_| ChainError::Abi(format!("decimals out of range: {}", decimals)))
	}
}

/// Converts the configured price of `currency` into raw token units.
pub fn required_amount(
	currencies: &CurrenciesConfig,
	currency: Currency,
	decimals: u8,
) -> Result<U256, FailureReason> {
	let amount = currencies.get(currency).amount.to_string();
	parse_token_amount(&amount, decimals).map_err(|e| {
		tracing::warn!(%currency, error = %e, "Configured amount does not fit token decimals");
		FailureReason::BalanceUnavailable { currency }
	})
}
