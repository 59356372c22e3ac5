//! Pass records and payout destinations.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A membership pass owned by the connected account.
///
/// The identifier comes from the chain; every other field is passed through
/// from the remote metadata document without schema enforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRecord {
	/// Token identifier, stringified.
	pub id: String,
	/// Fields of the metadata document (name, description, image, ...).
	#[serde(flatten)]
	pub metadata: Map<String, Value>,
}

impl PassRecord {
	/// Builds a record; an `id` key in the document never overrides the chain id.
	pub fn new(token_id: U256, mut metadata: Map<String, Value>) -> Self {
		metadata.remove("id");
		Self {
			id: token_id.to_string(),
			metadata,
		}
	}

	pub fn token_id(&self) -> Option<U256> {
		self.id.parse().ok()
	}

	pub fn name(&self) -> Option<&str> {
		self.field("name")
	}

	pub fn description(&self) -> Option<&str> {
		self.field("description")
	}

	pub fn image(&self) -> Option<&str> {
		self.field("image")
	}

	fn field(&self, key: &str) -> Option<&str> {
		self.metadata.get(key).and_then(Value::as_str)
	}
}

/// Payout recipients configured on the pass contract.
///
/// Informational only; each value is absent when its read failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDestinations {
	pub safe: Option<Address>,
	pub treasury: Option<Address>,
}
