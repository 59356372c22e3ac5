//! State management for mint attempts.

pub mod mint;

pub use mint::{is_valid_transition, MintAttempt, MintStateError};
