//! Pass metadata retrieval.
//!
//! A pass's `tokenURI` points at a JSON document (name, description, image and
//! arbitrary attributes). This crate fetches that document and combines it
//! with the on-chain identifier into a [`PassRecord`].

use alloy_primitives::U256;
use async_trait::async_trait;
use pass_types::PassRecord;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors that can occur while retrieving a metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
	/// The request could not be sent or the connection failed.
	#[error("Request failed: {0}")]
	Request(String),
	/// The server answered with a non-success status.
	#[error("Server returned status {status} for {uri}")]
	Status { uri: String, status: u16 },
	/// The body was not a JSON object.
	#[error("Invalid metadata document: {0}")]
	InvalidDocument(String),
	/// The URI cannot be resolved to a fetchable location.
	#[error("Unsupported metadata URI: {0}")]
	UnsupportedUri(String),
}

/// Trait defining the interface for metadata sources.
#[async_trait]
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait MetadataInterface: Send + Sync {
	/// Fetches the document behind `uri` as a JSON object.
	async fn fetch(&self, uri: &str) -> Result<Map<String, Value>, MetadataError>;
}

/// Service wrapping a metadata source.
pub struct MetadataService {
	implementation: Arc<dyn MetadataInterface>,
}

impl MetadataService {
	pub fn new(implementation: Arc<dyn MetadataInterface>) -> Self {
		Self { implementation }
	}

	pub async fn fetch(&self, uri: &str) -> Result<Map<String, Value>, MetadataError> {
		self.implementation.fetch(uri).await
	}

	/// Fetches the document for `token_id` and builds its pass record.
	pub async fn load_pass(&self, token_id: U256, uri: &str) -> Result<PassRecord, MetadataError> {
		tracing::debug!(%token_id, uri, "Fetching pass metadata");
		let metadata = self.implementation.fetch(uri).await?;
		Ok(PassRecord::new(token_id, metadata))
	}
}

/// Parses a response body into a JSON object.
pub(crate) fn parse_document(body: &str) -> Result<Map<String, Value>, MetadataError> {
	match serde_json::from_str::<Value>(body) {
		Ok(Value::Object(map)) => Ok(map),
		Ok(other) => Err(MetadataError::InvalidDocument(format!(
			"expected a JSON object, got {}",
			type_name(&other)
		))),
		Err(e) => Err(MetadataError::InvalidDocument(e.to_string())),
	}
}

fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[tokio::test]
	async fn test_load_pass_uses_chain_id() {
		let mut source = MockMetadataInterface::new();
		source
			.expect_fetch()
			.withf(|uri| uri.ends_with("/pass.json"))
			.times(1)
			.returning(|_| {
				Box::pin(async {
					Ok(json!({"id": "1", "name": "Entrepreneur Pass"})
						.as_object()
						.cloned()
						.unwrap_or_default())
				})
			});

		let service = MetadataService::new(Arc::new(source));
		let pass = service
			.load_pass(U256::from(42u64), "https://gateway/pass.json")
			.await
			.unwrap();

		assert_eq!(pass.id, "42");
		assert_eq!(pass.name(), Some("Entrepreneur Pass"));
	}

	#[test]
	fn test_parse_document_rejects_non_objects() {
		assert!(parse_document(r#"{"name": "x"}"#).is_ok());
		assert!(matches!(
			parse_document("[1, 2]"),
			Err(MetadataError::InvalidDocument(_))
		));
		assert!(matches!(
			parse_document("<html>"),
			Err(MetadataError::InvalidDocument(_))
		));
	}
}
