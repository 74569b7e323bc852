//! `reqwest` implementation of [`ImportApi`].

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ApiError, ImportApi, ImportPayload};
use crate::job::{ImportJob, ImportSource, JobId, JobProgress, JobStatus};

/// HTTP adapter against the catalog server.
///
/// Submissions go to `POST {base}/api/import/{source}`, the job list to
/// `GET {base}/api/import/jobs?limit=N`. Session cookies and CSRF headers
/// are the embedding client's concern; pass a preconfigured
/// [`reqwest::Client`] through [`Self::with_client`] when needed.
pub struct HttpImportApi {
	client: reqwest::Client,
	base_url: String,
}

impl HttpImportApi {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self::with_client(reqwest::Client::new(), base_url)
	}

	pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
		let mut base_url = base_url.into();
		while base_url.ends_with('/') {
			base_url.pop();
		}
		Self { client, base_url }
	}

	fn submit_url(&self, source: ImportSource) -> String {
		format!("{}/api/import/{source}", self.base_url)
	}

	fn jobs_url(&self, limit: usize) -> String {
		format!("{}/api/import/jobs?limit={limit}", self.base_url)
	}
}

impl From<reqwest::Error> for ApiError {
	fn from(error: reqwest::Error) -> Self {
		Self::Network(error.to_string())
	}
}

/// `{ "job": { ... } }` envelope of the submission endpoints. The id is
/// optional on the wire so a misbehaving server surfaces as
/// [`ApiError::MissingJobId`] instead of a decode failure.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
	job: SubmittedJob,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmittedJob {
	id: Option<i64>,
	status: Option<JobStatus>,
	progress: Option<JobProgress>,
}

#[async_trait]
impl ImportApi for HttpImportApi {
	async fn submit_import(
		&self,
		source: ImportSource,
		payload: ImportPayload,
	) -> Result<ImportJob, ApiError> {
		let url = self.submit_url(source);
		debug!(%source, %url, "submitting import job");

		let response = self.client.post(&url).json(&payload).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(ApiError::Http {
				status: status.as_u16(),
			});
		}

		let body = response.text().await?;
		let submitted: SubmitResponse = serde_json::from_str(&body)?;

		let id = submitted.job.id.ok_or(ApiError::MissingJobId)?;
		Ok(ImportJob {
			id: JobId(id),
			source,
			status: submitted.job.status.unwrap_or(JobStatus::Queued),
			progress: submitted.job.progress,
			summary: None,
			error: None,
		})
	}

	async fn list_jobs(&self, limit: usize) -> Result<Vec<ImportJob>, ApiError> {
		let response = self.client.get(self.jobs_url(limit)).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(ApiError::Http {
				status: status.as_u16(),
			});
		}

		let body = response.text().await?;
		Ok(serde_json::from_str(&body)?)
	}
}
