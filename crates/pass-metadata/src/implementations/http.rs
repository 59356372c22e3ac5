//! HTTP metadata source.
//!
//! Fetches documents over HTTP(S). `ipfs://` URIs are rewritten onto a
//! configured gateway.

use crate::{parse_document, MetadataError, MetadataInterface};
use async_trait::async_trait;
use reqwest::{
	header::{HeaderMap, HeaderValue, ACCEPT},
	Client,
};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

const IPFS_SCHEME: &str = "ipfs://";

/// Metadata source backed by a reqwest client.
pub struct HttpMetadata {
	client: Client,
	/// Base URL `ipfs://` URIs are resolved against.
	ipfs_gateway: Option<String>,
}

impl HttpMetadata {
	pub fn new(timeout: Duration, ipfs_gateway: Option<String>) -> Result<Self, MetadataError> {
		let mut headers = HeaderMap::new();
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		let client = Client::builder()
			.default_headers(headers)
			.timeout(timeout)
			.build()
			.map_err(|e| MetadataError::Request(format!("Failed to create HTTP client: {e}")))?;

		Ok(Self {
			client,
			ipfs_gateway,
		})
	}

	/// Maps `uri` to the URL that is actually requested.
	pub fn resolve(&self, uri: &str) -> Result<String, MetadataError> {
		if let Some(path) = uri.strip_prefix(IPFS_SCHEME) {
			let gateway = self
				.ipfs_gateway
				.as_deref()
				.ok_or_else(|| MetadataError::UnsupportedUri(uri.to_string()))?;
			let path = path.trim_start_matches("ipfs/");
			return Ok(format!("{}/{}", gateway.trim_end_matches('/'), path));
		}
		if uri.starts_with("http://") || uri.starts_with("https://") {
			return Ok(uri.to_string());
		}
		Err(MetadataError::UnsupportedUri(uri.to_string()))
	}
}

#[async_trait]
impl MetadataInterface for HttpMetadata {
	async fn fetch(&self, uri: &str) -> Result<Map<String, Value>, MetadataError> {
		let url = self.resolve(uri)?;
		debug!("Fetching metadata from {}", url);

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| MetadataError::Request(format!("{url}: {e}")))?;

		let status = response.status();
		if !status.is_success() {
			return Err(MetadataError::Status {
				uri: url,
				status: status.as_u16(),
			});
		}

		let body = response
			.text()
			.await
			.map_err(|e| MetadataError::Request(format!("Failed to read body: {e}")))?;
		parse_document(&body)
	}
}
