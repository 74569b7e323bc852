#![allow(dead_code)]

use std::{
	collections::VecDeque,
	sync::{
		atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use async_trait::async_trait;

use lb_core::{
	ApiError, ImportApi, ImportJob, ImportPayload, ImportSource, JobId, JobProgress, JobStatus,
	JobSummary, TrackerConfig,
};

/// Tight intervals so a whole election/poll/reconcile cycle fits in a test.
pub fn test_config() -> TrackerConfig {
	TrackerConfig {
		heartbeat: Duration::from_millis(20),
		lease_stale_after: Duration::from_millis(60),
		poll_interval: Duration::from_millis(20),
		min_poll_gap: Duration::ZERO,
		ledger_capacity: 30,
		poll_page_size: 50,
	}
}

/// Scripted stand-in for the catalog server.
///
/// Submissions hand out sequential ids; each poll pops the next scripted
/// page and keeps re-delivering the last one once the script runs out, the
/// way a real server keeps listing a finished job.
pub struct FakeApi {
	next_id: AtomicI64,
	pages: Mutex<VecDeque<Vec<ImportJob>>>,
	current: Mutex<Vec<ImportJob>>,
	list_calls: AtomicUsize,
	fail_submissions: AtomicBool,
}

impl FakeApi {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			next_id: AtomicI64::new(1),
			pages: Mutex::new(VecDeque::new()),
			current: Mutex::new(Vec::new()),
			list_calls: AtomicUsize::new(0),
			fail_submissions: AtomicBool::new(false),
		})
	}

	pub fn script_page(&self, page: Vec<ImportJob>) {
		self.pages.lock().unwrap().push_back(page);
	}

	pub fn list_calls(&self) -> usize {
		self.list_calls.load(Ordering::SeqCst)
	}

	pub fn fail_submissions(&self) {
		self.fail_submissions.store(true, Ordering::SeqCst);
	}
}

#[async_trait]
impl ImportApi for FakeApi {
	async fn submit_import(
		&self,
		source: ImportSource,
		_payload: ImportPayload,
	) -> Result<ImportJob, ApiError> {
		if self.fail_submissions.load(Ordering::SeqCst) {
			return Err(ApiError::Http { status: 422 });
		}

		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		Ok(ImportJob::queued(JobId(id), source))
	}

	async fn list_jobs(&self, _limit: usize) -> Result<Vec<ImportJob>, ApiError> {
		self.list_calls.fetch_add(1, Ordering::SeqCst);

		let mut current = self.current.lock().unwrap();
		if let Some(page) = self.pages.lock().unwrap().pop_front() {
			*current = page;
		}
		Ok(current.clone())
	}
}

pub fn running(id: i64, processed: u64, total: u64) -> ImportJob {
	ImportJob {
		status: JobStatus::Running,
		progress: Some(JobProgress {
			processed,
			total,
			..JobProgress::default()
		}),
		..ImportJob::queued(JobId(id), ImportSource::CsvGeneric)
	}
}

pub fn succeeded(id: i64, created: u64) -> ImportJob {
	ImportJob {
		status: JobStatus::Succeeded,
		summary: Some(JobSummary {
			created,
			..JobSummary::default()
		}),
		..ImportJob::queued(JobId(id), ImportSource::CsvGeneric)
	}
}

pub fn csv_payload() -> ImportPayload {
	ImportPayload::Csv {
		file_name: "collection.csv".into(),
		content: "title,issue\nSaga,12".into(),
	}
}

/// Poll `predicate` until it holds or the deadline passes.
pub async fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
	let start = tokio::time::Instant::now();
	loop {
		if predicate() {
			return true;
		}
		if start.elapsed() > deadline {
			return false;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
}
