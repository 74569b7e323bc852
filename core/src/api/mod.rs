//! The consumed backend contract: submit imports, list jobs.
//!
//! Authentication and CSRF live in the excluded API layer; as far as this
//! crate is concerned a `401` from the job list is just another transient
//! condition to ride out.

mod http;

pub use http::HttpImportApi;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::job::{ImportJob, ImportSource};

#[derive(Debug, Error)]
pub enum ApiError {
	#[error("server returned http {status}")]
	Http { status: u16 },

	#[error("network error: {0}")]
	Network(String),

	#[error("failed to decode server response: {0}")]
	Decode(#[from] serde_json::Error),

	#[error("server response did not include a job id")]
	MissingJobId,
}

impl ApiError {
	/// Transient conditions the poller silently retries on the next tick:
	/// an expired session (401), rate limiting (429) or a network blip.
	pub fn is_transient(&self) -> bool {
		matches!(
			self,
			Self::Http { status: 401 | 429 } | Self::Network(_)
		)
	}
}

/// Provider-specific submission payload, serialized as the request body of
/// the provider's endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ImportPayload {
	/// Sync one Plex library section, or all of them.
	PlexSync {
		#[serde(skip_serializing_if = "Option::is_none")]
		section: Option<String>,
	},
	/// An uploaded CSV file in one of the supported dialects.
	Csv { file_name: String, content: String },
	/// Scanned barcodes to resolve against the lookup provider.
	Barcode { codes: Vec<String> },
}

/// What the tracker needs from the backend.
#[async_trait]
pub trait ImportApi: Send + Sync + 'static {
	/// Submit one import job. The returned job must carry the
	/// server-assigned id; implementations map an id-less response to
	/// [`ApiError::MissingJobId`].
	async fn submit_import(
		&self,
		source: ImportSource,
		payload: ImportPayload,
	) -> Result<ImportJob, ApiError>;

	/// The most recent jobs for this user, newest first, regardless of
	/// which process asks.
	async fn list_jobs(&self, limit: usize) -> Result<Vec<ImportJob>, ApiError>;
}
