//! Services the orchestrator and the engine facade are built from.

pub mod balance;
pub mod destinations;
pub mod locator;

pub use balance::{required_amount, BalanceService};
pub use destinations::DestinationResolver;
pub use locator::{LocateOutcome, PassLocator};
