//! Configuration module for the membership pass engine.
//!
//! This module provides structures and utilities for managing engine
//! configuration. It supports loading configuration from TOML files, resolves
//! `${VAR}` / `${VAR:-default}` environment references before parsing, and
//! validates that every required value is properly set.

use alloy_primitives::Address;
use pass_types::Currency;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, not the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// RPC endpoint of the chain hosting the pass contract.
	pub chain: ChainConfig,
	/// The pass contract and its scan bound.
	pub contract: ContractConfig,
	/// Payment currencies accepted by the contract.
	pub currencies: CurrenciesConfig,
	/// Local signing key used in place of an injected wallet.
	#[serde(default)]
	pub wallet: WalletConfig,
	/// Remote metadata fetching.
	#[serde(default)]
	pub metadata: MetadataConfig,
	/// Engine tuning.
	#[serde(default)]
	pub engine: EngineConfig,
}

/// Chain connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	/// HTTP RPC endpoint.
	pub rpc_url: String,
	/// Chain id the signer signs for.
	pub chain_id: u64,
}

/// Pass contract settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractConfig {
	/// Address of the pass contract.
	pub address: Address,
	/// Highest token identifier checked when locating an owned pass.
	///
	/// This is a correctness boundary: a pass whose identifier is above the
	/// limit cannot be recovered without an index. Raise it as issuance grows.
	#[serde(default = "default_scan_limit")]
	pub scan_limit: u64,
}

/// Settings of both supported currencies.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurrenciesConfig {
	pub primary: CurrencyConfig,
	pub secondary: CurrencyConfig,
}

impl CurrenciesConfig {
	pub fn get(&self, currency: Currency) -> &CurrencyConfig {
		match currency {
			Currency::Primary => &self.primary,
			Currency::Secondary => &self.secondary,
		}
	}

	/// Looks up a currency by its configured symbol, ignoring case.
	pub fn by_symbol(&self, symbol: &str) -> Option<Currency> {
		Currency::ALL
			.into_iter()
			.find(|c| self.get(*c).symbol.eq_ignore_ascii_case(symbol.trim()))
	}
}

/// A single payment currency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurrencyConfig {
	/// Display symbol, e.g. `cUSD`.
	pub symbol: String,
	/// Token contract address.
	pub token: Address,
	/// Price of a pass in whole tokens, as a decimal string.
	pub amount: Decimal,
	/// Metadata document URI submitted with the mint.
	pub metadata_uri: String,
}

/// Local wallet settings.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Hex private key; absent or empty means no wallet.
	#[serde(default)]
	pub private_key: Option<String>,
}

impl WalletConfig {
	/// The configured key, treating an empty value as absent.
	pub fn private_key(&self) -> Option<&str> {
		self.private_key
			.as_deref()
			.map(str::trim)
			.filter(|k| !k.is_empty())
	}
}

impl fmt::Debug for WalletConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WalletConfig")
			.field(
				"private_key",
				&self.private_key().map(|_| "<redacted>"),
			)
			.finish()
	}
}

/// Metadata fetching settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
	/// Request timeout in seconds.
	#[serde(default = "default_metadata_timeout")]
	pub timeout_seconds: u64,
	/// HTTP gateway used for `ipfs://` URIs.
	#[serde(default)]
	pub ipfs_gateway: Option<String>,
}

impl Default for MetadataConfig {
	fn default() -> Self {
		Self {
			timeout_seconds: default_metadata_timeout(),
			ipfs_gateway: None,
		}
	}
}

/// Engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
	/// Capacity of the progress event channel.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			event_capacity: default_event_capacity(),
		}
	}
}

/// Default scan limit, the issuance ceiling the contract was deployed with.
fn default_scan_limit() -> u64 {
	100
}

fn default_metadata_timeout() -> u64 {
	30
}

fn default_event_capacity() -> usize {
	64
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {e}")))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{var_name}' not found"
					)));
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Reverse order keeps earlier offsets valid
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads and validates configuration from a TOML file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let contents = tokio::fs::read_to_string(path.as_ref()).await?;
		contents.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.chain.rpc_url.trim().is_empty() {
			return Err(ConfigError::Validation("chain.rpc_url cannot be empty".into()));
		}

		if self.contract.address.is_zero() {
			return Err(ConfigError::Validation(
				"contract.address cannot be the zero address".into(),
			));
		}

		if self.contract.scan_limit == 0 {
			return Err(ConfigError::Validation(
				"contract.scan_limit must be greater than zero".into(),
			));
		}

		for currency in Currency::ALL {
			let settings = self.currencies.get(currency);
			if settings.amount <= Decimal::ZERO {
				return Err(ConfigError::Validation(format!(
					"currencies.{currency}.amount must be positive"
				)));
			}
			if settings.metadata_uri.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"currencies.{currency}.metadata_uri cannot be empty"
				)));
			}
			if settings.token.is_zero() {
				return Err(ConfigError::Validation(format!(
					"currencies.{currency}.token cannot be the zero address"
				)));
			}
		}

		if self
			.currencies
			.primary
			.symbol
			.eq_ignore_ascii_case(&self.currencies.secondary.symbol)
		{
			return Err(ConfigError::Validation(
				"currency symbols must be distinct".into(),
			));
		}

		if self.engine.event_capacity == 0 {
			return Err(ConfigError::Validation(
				"engine.event_capacity must be greater than zero".into(),
			));
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE_CONFIG: &str = r#"
[chain]
rpc_url = "https://forno.celo.org"
chain_id = 42220

[contract]
address = "0x35050de3D73e58019890150f59124A57998892A3"

[currencies.primary]
symbol = "cUSD"
token = "0x765DE816845861e75A25fCA122bb6898B8B1282a"
amount = "55"
metadata_uri = "https://example.com/ipfs/pass.json"

[currencies.secondary]
symbol = "cEUR"
token = "0xD8763CBa276a3738E6DE85b4b3bF5FDed6D6cA73"
amount = "50"
metadata_uri = "https://example.com/ipfs/pass.json"
"#;

	#[test]
	fn test_parse_base_config_with_defaults() {
		let config: Config = BASE_CONFIG.parse().unwrap();

		assert_eq!(config.chain.chain_id, 42220);
		assert_eq!(config.contract.scan_limit, 100);
		assert_eq!(config.currencies.get(Currency::Primary).symbol, "cUSD");
		assert_eq!(
			config.currencies.get(Currency::Secondary).amount,
			Decimal::from(50)
		);
		assert_eq!(config.metadata.timeout_seconds, 30);
		assert_eq!(config.engine.event_capacity, 64);
		assert!(config.wallet.private_key().is_none());
	}

	#[test]
	fn test_currency_by_symbol() {
		let config: Config = BASE_CONFIG.parse().unwrap();

		assert_eq!(config.currencies.by_symbol("cusd"), Some(Currency::Primary));
		assert_eq!(config.currencies.by_symbol("CEUR"), Some(Currency::Secondary));
		assert_eq!(config.currencies.by_symbol("celo"), None);
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("PASS_TEST_RPC_HOST", "localhost");
		std::env::set_var("PASS_TEST_RPC_PORT", "8545");

		let input = "url = \"http://${PASS_TEST_RPC_HOST}:${PASS_TEST_RPC_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("PASS_TEST_RPC_HOST");
		std::env::remove_var("PASS_TEST_RPC_PORT");
	}

	#[test]
	fn test_env_var_with_empty_default() {
		let input = "private_key = \"${PASS_TEST_MISSING_KEY:-}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "private_key = \"\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${PASS_TEST_NOT_SET}\"");
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("PASS_TEST_NOT_SET"));
	}

	#[test]
	fn test_empty_private_key_is_no_wallet() {
		let config: Config = format!("{BASE_CONFIG}\n[wallet]\nprivate_key = \"\"\n")
			.parse()
			.unwrap();
		assert!(config.wallet.private_key().is_none());
		assert!(!format!("{:?}", config.wallet).contains("0x"));
	}

	#[test]
	fn test_zero_scan_limit_rejected() {
		let input = BASE_CONFIG.replace(
			"[contract]\n",
			"[contract]\nscan_limit = 0\n",
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_non_positive_amount_rejected() {
		let input = BASE_CONFIG.replace("amount = \"50\"", "amount = \"0\"");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("secondary"));
	}

	#[tokio::test]
	async fn test_from_file_missing() {
		let result = Config::from_file("/nonexistent/pass.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}
}
