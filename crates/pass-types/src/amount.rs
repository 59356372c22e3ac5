//! Token amount conversions between decimal strings and base units.

use alloy_primitives::{
	utils::{format_units, parse_units},
	U256,
};
use thiserror::Error;

/// Errors raised while converting token amounts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
	#[error("Invalid amount '{0}': {1}")]
	Invalid(String, String),
	#[error("Amount must not be negative: {0}")]
	Negative(String),
}

/// Converts a decimal amount string into base units using `decimals`.
///
/// `"55"` with 18 decimals becomes `55 * 10^18`.
pub fn parse_token_amount(amount: &str, decimals: u8) -> Result<U256, AmountError> {
	let trimmed = amount.trim();
	if trimmed.starts_with('-') {
		return Err(AmountError::Negative(trimmed.to_string()));
	}

	parse_units(trimmed, decimals)
		.map(|units| units.get_absolute())
		.map_err(|e| AmountError::Invalid(trimmed.to_string(), e.to_string()))
}

/// Formats base units as a decimal string with trailing zeros trimmed.
pub fn format_token_amount(raw: U256, decimals: u8) -> String {
	let formatted = match format_units(raw, decimals) {
		Ok(s) => s,
		Err(_) => return raw.to_string(),
	};

	match formatted.split_once('.') {
		Some((whole, fraction)) => {
			let trimmed = fraction.trim_end_matches('0');
			if trimmed.is_empty() {
				whole.to_string()
			} else {
				format!("{whole}.{trimmed}")
			}
		},
		None => formatted,
	}
}
