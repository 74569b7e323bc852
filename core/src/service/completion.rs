//! One-shot side effects on job completion.

use std::{
	collections::HashSet,
	sync::{Arc, Mutex, PoisonError},
};

use tracing::debug;

use crate::infra::event::{EventBus, TrackerEvent};
use crate::job::{ImportJob, JobId, JobStatus};

type CompletionCallback = Arc<dyn Fn(&ImportJob) + Send + Sync>;

/// Fires the "a job just finished" side effect exactly once per job.
///
/// The poller re-delivers a `succeeded` job on every tick for as long as the
/// server lists it, so the watcher keeps the set of ids it has already fired
/// for. The set lives in process memory only: after a restart the effect may
/// fire once more, which callers must tolerate (it is a catalog refresh, not
/// a payment). `failed` jobs never fire.
pub struct CompletionWatcher {
	seen: Mutex<HashSet<JobId>>,
	callbacks: Mutex<Vec<CompletionCallback>>,
	events: EventBus,
}

impl CompletionWatcher {
	pub fn new(events: EventBus) -> Self {
		Self {
			seen: Mutex::new(HashSet::new()),
			callbacks: Mutex::new(Vec::new()),
			events,
		}
	}

	pub fn on_completed(&self, callback: impl Fn(&ImportJob) + Send + Sync + 'static) {
		self.callbacks
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(Arc::new(callback));
	}

	/// Diff a ledger snapshot against the already-fired set and invoke the
	/// callbacks for every newly succeeded job.
	pub fn observe(&self, jobs: &[ImportJob]) {
		for job in jobs {
			if job.status != JobStatus::Succeeded {
				continue;
			}

			// Mark before invoking: a callback that re-enters the ledger
			// and triggers another observe() must not fire twice.
			{
				let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
				if !seen.insert(job.id) {
					continue;
				}
			}

			debug!(job_id = %job.id, "job completed; firing side effects");
			self.events.emit(TrackerEvent::JobCompleted { job: job.clone() });

			let callbacks: Vec<CompletionCallback> = self
				.callbacks
				.lock()
				.unwrap_or_else(PoisonError::into_inner)
				.clone();
			for callback in callbacks {
				callback(job);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;
	use crate::job::{ImportSource, JobSummary};

	fn succeeded(id: i64) -> ImportJob {
		ImportJob {
			status: JobStatus::Succeeded,
			summary: Some(JobSummary {
				created: 7,
				..JobSummary::default()
			}),
			..ImportJob::queued(JobId(id), ImportSource::CsvGeneric)
		}
	}

	#[test]
	fn fires_exactly_once_per_job() {
		let watcher = CompletionWatcher::new(EventBus::new(16));
		let fired = Arc::new(AtomicUsize::new(0));

		let counter = fired.clone();
		watcher.on_completed(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		let jobs = vec![succeeded(1)];
		watcher.observe(&jobs);
		watcher.observe(&jobs);
		watcher.observe(&jobs);

		assert_eq!(fired.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn failed_jobs_never_fire() {
		let watcher = CompletionWatcher::new(EventBus::new(16));
		let fired = Arc::new(AtomicUsize::new(0));

		let counter = fired.clone();
		watcher.on_completed(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		let mut failed = succeeded(1);
		failed.status = JobStatus::Failed;
		// Direct construction; merge rules elsewhere prevent this shape,
		// but the watcher must not care.
		watcher.observe(&[failed]);

		assert_eq!(fired.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn each_job_fires_independently() {
		let watcher = CompletionWatcher::new(EventBus::new(16));
		let fired = Arc::new(AtomicUsize::new(0));

		let counter = fired.clone();
		watcher.on_completed(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		watcher.observe(&[succeeded(1)]);
		watcher.observe(&[succeeded(1), succeeded(2)]);

		assert_eq!(fired.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn callbacks_receive_the_summary() {
		let watcher = CompletionWatcher::new(EventBus::new(16));
		let created = Arc::new(AtomicUsize::new(0));

		let sink = created.clone();
		watcher.on_completed(move |job| {
			let summary = job.summary.expect("terminal job carries a summary");
			sink.store(summary.created as usize, Ordering::SeqCst);
		});

		watcher.observe(&[succeeded(3)]);
		assert_eq!(created.load(Ordering::SeqCst), 7);
	}
}
