//! Supported payment currencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Payment currency accepted by the pass contract.
///
/// The set is closed: the contract only understands discriminants 0 and 1.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
	Primary,
	Secondary,
}

impl Currency {
	/// Every supported currency, in discriminant order.
	pub const ALL: [Currency; 2] = [Currency::Primary, Currency::Secondary];

	/// Integer code passed to the contract's `mint` call.
	pub fn discriminant(self) -> u8 {
		match self {
			Currency::Primary => 0,
			Currency::Secondary => 1,
		}
	}

	pub fn from_discriminant(code: u8) -> Option<Self> {
		match code {
			0 => Some(Currency::Primary),
			1 => Some(Currency::Secondary),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Currency::Primary => "primary",
			Currency::Secondary => "secondary",
		}
	}
}

impl fmt::Display for Currency {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a string names no supported currency.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown currency: {0}")]
pub struct ParseCurrencyError(pub String);

impl FromStr for Currency {
	type Err = ParseCurrencyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"primary" | "0" => Ok(Currency::Primary),
			"secondary" | "1" => Ok(Currency::Secondary),
			_ => Err(ParseCurrencyError(s.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_discriminant_round_trip() {
		for currency in Currency::ALL {
			assert_eq!(
				Currency::from_discriminant(currency.discriminant()),
				Some(currency)
			);
		}
		assert_eq!(Currency::from_discriminant(2), None);
	}

	#[test]
	fn test_parse_currency() {
		assert_eq!("Primary".parse::<Currency>().unwrap(), Currency::Primary);
		assert_eq!("1".parse::<Currency>().unwrap(), Currency::Secondary);
		assert!("cUSD".parse::<Currency>().is_err());
	}
}
