//! In-memory metadata source for testing purposes.

use crate::{MetadataError, MetadataInterface};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Serves documents registered by URI.
#[derive(Default)]
pub struct MemoryMetadata {
	documents: RwLock<HashMap<String, Map<String, Value>>>,
	fetches: AtomicUsize,
}

impl MemoryMetadata {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn insert(&self, uri: impl Into<String>, document: Map<String, Value>) {
		self.documents.write().await.insert(uri.into(), document);
	}

	/// Number of fetches served or refused so far.
	pub fn fetch_count(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl MetadataInterface for MemoryMetadata {
	async fn fetch(&self, uri: &str) -> Result<Map<String, Value>, MetadataError> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		self.documents
			.read()
			.await
			.get(uri)
			.cloned()
			.ok_or_else(|| MetadataError::Status {
				uri: uri.to_string(),
				status: 404,
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[tokio::test]
	async fn test_unknown_uri_is_not_found() {
		let source = MemoryMetadata::new();
		source
			.insert("ipfs://known", json!({"name": "Pass"}).as_object().unwrap().clone())
			.await;

		assert!(source.fetch("ipfs://known").await.is_ok());
		assert!(matches!(
			source.fetch("ipfs://missing").await,
			Err(MetadataError::Status { status: 404, .. })
		));
		assert_eq!(source.fetch_count(), 2);
	}
}
