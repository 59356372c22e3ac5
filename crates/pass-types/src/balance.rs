//! Balance snapshot types for the supported currencies.

use crate::{amount::format_token_amount, Currency};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw token balance together with the token's declared precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
	/// Balance in the token's smallest unit.
	pub raw: U256,
	/// Decimals reported by the token contract.
	pub decimals: u8,
}

impl TokenBalance {
	pub fn new(raw: U256, decimals: u8) -> Self {
		Self { raw, decimals }
	}

	/// Full-precision decimal representation.
	pub fn formatted(&self) -> String {
		format_token_amount(self.raw, self.decimals)
	}

	/// Two-decimal representation for display, truncated rather than rounded.
	pub fn display(&self) -> String {
		let formatted = self.formatted();
		let (whole, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
		let mut cents: String = fraction.chars().take(2).collect();
		while cents.len() < 2 {
			cents.push('0');
		}
		format!("{whole}.{cents}")
	}

	/// Returns true if the balance is at least `required` base units.
	pub fn covers(&self, required: U256) -> bool {
		self.raw >= required
	}
}

/// Balances of every supported currency for one account.
///
/// A snapshot can only be built when every [`Currency`] has an entry, so a
/// partially populated map never escapes a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
	balances: BTreeMap<Currency, TokenBalance>,
}

impl BalanceSnapshot {
	/// Builds a snapshot, returning `None` unless the entries cover exactly
	/// the supported currency set.
	pub fn from_entries<I>(entries: I) -> Option<Self>
	where
		I: IntoIterator<Item = (Currency, TokenBalance)>,
	{
		let balances: BTreeMap<_, _> = entries.into_iter().collect();
		if balances.len() != Currency::ALL.len()
			|| !Currency::ALL.iter().all(|c| balances.contains_key(c))
		{
			return None;
		}
		Some(Self { balances })
	}

	pub fn get(&self, currency: Currency) -> Option<&TokenBalance> {
		self.balances.get(&currency)
	}

	pub fn currencies(&self) -> impl Iterator<Item = Currency> + '_ {
		self.balances.keys().copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Currency, &TokenBalance)> {
		self.balances.iter()
	}

	/// Returns true if the balance for `currency` covers `required` base units.
	pub fn eligible(&self, currency: Currency, required: U256) -> bool {
		self.get(currency).is_some_and(|b| b.covers(required))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tokens(amount: u64) -> TokenBalance {
		TokenBalance::new(U256::from(amount) * U256::from(10u64).pow(U256::from(18)), 18)
	}

	#[test]
	fn test_snapshot_requires_every_currency() {
		assert!(BalanceSnapshot::from_entries([(Currency::Primary, tokens(1))]).is_none());

		let snapshot = BalanceSnapshot::from_entries([
			(Currency::Primary, tokens(60)),
			(Currency::Secondary, tokens(0)),
		])
		.unwrap();
		assert_eq!(
			snapshot.currencies().collect::<Vec<_>>(),
			Currency::ALL.to_vec()
		);
	}

	#[test]
	fn test_eligible_compares_base_units() {
		let snapshot = BalanceSnapshot::from_entries([
			(Currency::Primary, tokens(40)),
			(Currency::Secondary, tokens(55)),
		])
		.unwrap();
		let required = tokens(55).raw;

		assert!(!snapshot.eligible(Currency::Primary, required));
		assert!(snapshot.eligible(Currency::Secondary, required));
	}

	#[test]
	fn test_display_two_decimals() {
		let balance = TokenBalance::new(U256::from(1_239_000u64), 6);
		assert_eq!(balance.formatted(), "1.239");
		assert_eq!(balance.display(), "1.23");
		assert_eq!(tokens(60).display(), "60.00");
	}
}
