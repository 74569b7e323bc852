//! Core types for import jobs.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Server-assigned job identifier, unique within the ledger and immutable
/// once assigned.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<i64> for JobId {
	fn from(id: i64) -> Self {
		Self(id)
	}
}

/// Where an import job pulls its rows from.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImportSource {
	/// Sync against a Plex library section.
	Plex,
	/// Plain `title,issue,...` CSV.
	CsvGeneric,
	/// Delicious Library export.
	CsvDelicious,
	/// Calibre catalog export.
	CsvCalibre,
	/// Batch of scanned barcodes resolved against the lookup provider.
	Barcode,
}

/// Current status of a job.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
	/// Accepted by the server, not yet picked up by the worker.
	Queued,
	/// The worker is processing rows.
	Running,
	/// Finished cleanly; a summary is available.
	Succeeded,
	/// Finished with a fatal error; `error` carries the message.
	Failed,
}

impl JobStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Succeeded | Self::Failed)
	}

	const fn rank(self) -> u8 {
		match self {
			Self::Queued => 0,
			Self::Running => 1,
			Self::Succeeded | Self::Failed => 2,
		}
	}

	/// Whether a job may move from `prev` to `self`.
	///
	/// The lifecycle is strictly `queued → running → {succeeded | failed}`:
	/// re-delivering the current status is fine, terminal states never
	/// change, and a job never moves backwards.
	pub fn can_follow(self, prev: Self) -> bool {
		if self == prev {
			return true;
		}
		!prev.is_terminal() && self.rank() > prev.rank()
	}
}

/// Row counters reported while a job runs. All counters are cumulative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobProgress {
	pub processed: u64,
	pub total: u64,
	pub created: u64,
	pub updated: u64,
	pub skipped: u64,
	pub error_count: u64,
}

/// Final tallies, present only once a job is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSummary {
	pub created: u64,
	pub updated: u64,
	pub error_count: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub audit_rows: Option<u64>,
}

/// One tracked import job, as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
	pub id: JobId,
	pub source: ImportSource,
	pub status: JobStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub progress: Option<JobProgress>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub summary: Option<JobSummary>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl ImportJob {
	/// A freshly submitted job, before the worker reports anything.
	pub fn queued(id: JobId, source: ImportSource) -> Self {
		Self {
			id,
			source,
			status: JobStatus::Queued,
			progress: None,
			summary: None,
			error: None,
		}
	}

	/// Merge freshly polled fields into this entry, field by field.
	///
	/// `id` and `source` never change. `status` only advances along the
	/// valid lifecycle; anything else is the server misbehaving and is
	/// dropped. `progress`, `summary` and `error` overwrite only when the
	/// incoming record carries them; fields absent from the fetch are
	/// preserved. Returns whether anything changed, so merging a record
	/// into itself is observably a no-op.
	pub fn merge_from(&mut self, incoming: &Self) -> bool {
		debug_assert_eq!(self.id, incoming.id);

		let mut changed = false;

		if incoming.status != self.status {
			if incoming.status.can_follow(self.status) {
				self.status = incoming.status;
				changed = true;
			} else {
				warn!(
					job_id = %self.id,
					from = %self.status,
					to = %incoming.status,
					"ignoring invalid job status transition",
				);
			}
		}

		if let Some(progress) = incoming.progress {
			if self.progress != Some(progress) {
				self.progress = Some(progress);
				changed = true;
			}
		}

		if let Some(summary) = incoming.summary {
			if self.summary != Some(summary) {
				self.summary = Some(summary);
				changed = true;
			}
		}

		if let Some(error) = &incoming.error {
			if self.error.as_deref() != Some(error) {
				self.error = Some(error.clone());
				changed = true;
			}
		}

		changed
	}

	pub fn is_terminal(&self) -> bool {
		self.status.is_terminal()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn running(id: i64) -> ImportJob {
		ImportJob {
			status: JobStatus::Running,
			progress: Some(JobProgress {
				processed: 3,
				total: 10,
				..JobProgress::default()
			}),
			..ImportJob::queued(JobId(id), ImportSource::CsvGeneric)
		}
	}

	#[test]
	fn status_lifecycle_is_monotonic() {
		use JobStatus::{Failed, Queued, Running, Succeeded};

		assert!(Running.can_follow(Queued));
		assert!(Succeeded.can_follow(Queued));
		assert!(Failed.can_follow(Running));
		assert!(Queued.can_follow(Queued));

		assert!(!Queued.can_follow(Running));
		assert!(!Running.can_follow(Succeeded));
		assert!(!Failed.can_follow(Succeeded));
		assert!(!Succeeded.can_follow(Failed));
	}

	#[test]
	fn merge_overwrites_present_fields_only() {
		let mut job = running(7);

		let update = ImportJob {
			status: JobStatus::Running,
			progress: Some(JobProgress {
				processed: 9,
				total: 10,
				created: 6,
				..JobProgress::default()
			}),
			..ImportJob::queued(JobId(7), ImportSource::CsvGeneric)
		};

		assert!(job.merge_from(&update));
		assert_eq!(job.progress.unwrap().processed, 9);
		assert_eq!(job.status, JobStatus::Running);
		// Absent fields stayed untouched.
		assert_eq!(job.summary, None);
		assert_eq!(job.error, None);
	}

	#[test]
	fn merge_is_idempotent() {
		let mut job = running(7);
		let update = ImportJob {
			status: JobStatus::Succeeded,
			summary: Some(JobSummary {
				created: 7,
				..JobSummary::default()
			}),
			..ImportJob::queued(JobId(7), ImportSource::CsvGeneric)
		};

		assert!(job.merge_from(&update));
		let after_first = job.clone();

		assert!(!job.merge_from(&update));
		assert_eq!(job, after_first);
	}

	#[test]
	fn merge_rejects_resurrection_from_terminal() {
		let mut job = running(7);
		job.status = JobStatus::Failed;
		job.error = Some("boom".into());

		let stale = running(7);
		job.merge_from(&stale);

		assert_eq!(job.status, JobStatus::Failed);
		assert_eq!(job.error.as_deref(), Some("boom"));
	}

	#[test]
	fn wire_format_uses_camel_case() {
		let job = ImportJob {
			status: JobStatus::Succeeded,
			summary: Some(JobSummary {
				created: 7,
				error_count: 1,
				audit_rows: Some(2),
				..JobSummary::default()
			}),
			..ImportJob::queued(JobId(1), ImportSource::CsvDelicious)
		};

		let json = serde_json::to_string(&job).unwrap();
		assert!(json.contains(r#""errorCount":1"#));
		assert!(json.contains(r#""auditRows":2"#));
		assert!(json.contains(r#""source":"csv_delicious""#));

		let back: ImportJob = serde_json::from_str(&json).unwrap();
		assert_eq!(back, job);
	}
}
