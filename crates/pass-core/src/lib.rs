//! Membership pass engine.
//!
//! Sequences the stablecoin approval, terms acceptance and mint transactions,
//! recovers the new pass identifier from the receipt, and falls back to a
//! bounded ownership scan when the contract reports the account already
//! holds a pass.

pub mod engine;
pub mod extract;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod state;

pub use engine::event_bus::EventBus;
pub use engine::{EngineError, PassEngine};
pub use orchestrator::MintOrchestrator;
pub use services::LocateOutcome;
pub use session::{Session, SessionState};
pub use state::MintAttempt;
