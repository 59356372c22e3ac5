//! Connected wallet account.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The account granted by the wallet for the lifetime of a session.
///
/// Address comparison is byte-wise, so two hex spellings of the same
/// address that only differ in letter case compare equal once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account(pub Address);

impl Account {
	pub fn new(address: Address) -> Self {
		Self(address)
	}

	pub fn address(&self) -> Address {
		self.0
	}

	/// Returns true if `owner` is this account.
	pub fn owns(&self, owner: &Address) -> bool {
		self.0 == *owner
	}
}

impl From<Address> for Account {
	fn from(address: Address) -> Self {
		Self(address)
	}
}

impl fmt::Display for Account {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_owns_compares_bytes() {
		let address: Address = "0x765DE816845861e75A25fCA122bb6898B8B1282a"
			.parse()
			.unwrap();
		let lower: Address = "0x765de816845861e75a25fca122bb6898b8b1282a"
			.parse()
			.unwrap();

		assert!(Account::new(address).owns(&lower));
	}
}
