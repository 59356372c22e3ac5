//! Common types module for the membership pass engine.
//!
//! This module defines the core data types and structures shared by every
//! crate of the workspace: accounts, payment currencies, balance snapshots,
//! pass records, receipts and the mint workflow vocabulary. It provides a
//! centralized location for shared types to ensure consistency across the
//! chain client, the metadata fetcher and the orchestration engine.

/// Connected wallet account.
pub mod account;
/// Token amount parsing and formatting helpers.
pub mod amount;
/// Balance snapshot types for the supported currencies.
pub mod balance;
/// Supported payment currencies.
pub mod currency;
/// Progress events published by the mint workflow.
pub mod events;
/// Mint workflow steps and failure taxonomy.
pub mod mint;
/// Pass records and payout destinations.
pub mod pass;
/// Transaction receipts and event logs.
pub mod receipt;

pub use account::Account;
pub use amount::{format_token_amount, parse_token_amount, AmountError};
pub use balance::{BalanceSnapshot, TokenBalance};
pub use currency::{Currency, ParseCurrencyError};
pub use events::{MintEvent, RecoveryTrigger};
pub use mint::{contains_already_minted, FailureCategory, FailureReason, MintStep};
pub use pass::{PassRecord, PayoutDestinations};
pub use receipt::{Log, TransactionReceipt};
