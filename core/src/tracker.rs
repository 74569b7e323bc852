//! The composition root the UI layer talks to.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{ApiError, ImportApi, ImportPayload};
use crate::config::{ConfigError, TrackerConfig};
use crate::infra::event::{EventBus, TrackerEvent};
use crate::infra::store::{keys, SharedStore, StoreChange};
use crate::infra::sync::leader::{Foreground, LeaseCoordinator, PollRole};
use crate::job::{ImportJob, ImportSource, JobId, JobLedger};
use crate::service::{completion::CompletionWatcher, poller::JobPoller};

/// One user-facing import tracker for one process.
///
/// Owns the ledger, the lease coordinator, the poller and the completion
/// watcher, plus the background tasks that drive them. Cheap to clone; all
/// clones share one underlying tracker.
#[derive(Clone)]
pub struct ImportTracker {
	inner: Arc<Inner>,
}

struct Inner {
	api: Arc<dyn ImportApi>,
	ledger: Arc<JobLedger>,
	coordinator: Arc<LeaseCoordinator>,
	watcher: Arc<CompletionWatcher>,
	poller: Arc<JobPoller>,
	events: EventBus,
	foreground: Foreground,
	cancel: CancellationToken,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ImportTracker {
	/// Wire the whole layer together and spawn its background tasks:
	/// the lease heartbeat, the poll loop and the store-change watch.
	pub fn spawn(
		api: Arc<dyn ImportApi>,
		store: Arc<dyn SharedStore>,
		config: TrackerConfig,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let events = EventBus::new(64);
		let (foreground, foreground_rx) = Foreground::new();

		let ledger = Arc::new(JobLedger::load(store.clone(), config.ledger_capacity));
		let coordinator = Arc::new(LeaseCoordinator::new(
			store.clone(),
			&config,
			foreground_rx,
			events.clone(),
		));
		let watcher = Arc::new(CompletionWatcher::new(events.clone()));
		let poller = Arc::new(JobPoller::new(
			api.clone(),
			store.clone(),
			ledger.clone(),
			coordinator.clone(),
			watcher.clone(),
			events.clone(),
			&config,
		));

		let cancel = CancellationToken::new();
		let tasks = vec![
			tokio::spawn(coordinator.clone().run_heartbeat(cancel.child_token())),
			tokio::spawn(poller.clone().run(cancel.child_token())),
			tokio::spawn(Self::run_store_watch(
				store.subscribe(),
				ledger.clone(),
				coordinator.clone(),
				watcher.clone(),
				poller.clone(),
				events.clone(),
				cancel.child_token(),
			)),
		];

		info!(owner = %coordinator.owner_id(), "import tracker started");

		Ok(Self {
			inner: Arc::new(Inner {
				api,
				ledger,
				coordinator,
				watcher,
				poller,
				events,
				foreground,
				cancel,
				tasks: Mutex::new(tasks),
			}),
		})
	}

	/// Submit an import job and track it.
	///
	/// A submission failure surfaces immediately and inserts nothing; it is
	/// the one error in the layer the user is meant to see.
	pub async fn submit_job(
		&self,
		source: ImportSource,
		payload: ImportPayload,
	) -> Result<JobId, ApiError> {
		let job = self.inner.api.submit_import(source, payload).await?;
		let id = job.id;

		self.inner.ledger.upsert(job);
		self.inner.events.emit(TrackerEvent::LedgerChanged);
		self.inner.poller.notify();

		info!(job_id = %id, %source, "import job submitted");
		Ok(id)
	}

	/// Drop a job from the ledger. Server state is untouched; a running job
	/// keeps running, this process just stops tracking it.
	pub fn dismiss_job(&self, id: JobId) {
		if self.inner.ledger.dismiss(id) {
			self.inner.events.emit(TrackerEvent::LedgerChanged);
		}
	}

	/// Ledger snapshot, most recent first.
	pub fn jobs(&self) -> Vec<ImportJob> {
		self.inner.ledger.jobs()
	}

	pub fn has_active(&self) -> bool {
		self.inner.ledger.has_active()
	}

	pub fn role(&self) -> PollRole {
		self.inner.coordinator.role()
	}

	/// Live event feed for a status dock.
	pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
		self.inner.events.subscribe()
	}

	/// Register a one-shot-per-job completion side effect, e.g. refreshing
	/// the catalog view.
	pub fn on_job_completed(&self, callback: impl Fn(&ImportJob) + Send + Sync + 'static) {
		self.inner.watcher.on_completed(callback);
	}

	/// Handle for the host's visibility/focus wiring.
	pub fn foreground(&self) -> Foreground {
		self.inner.foreground.clone()
	}

	/// The unload path: release the lease if it is ours and stop every
	/// background task.
	pub async fn shutdown(&self) {
		self.inner.cancel.cancel();

		let tasks: Vec<JoinHandle<()>> = std::mem::take(
			&mut *self
				.inner
				.tasks
				.lock()
				.unwrap_or_else(PoisonError::into_inner),
		);
		for task in tasks {
			if let Err(error) = task.await {
				if !error.is_cancelled() {
					warn!(%error, "tracker task ended abnormally");
				}
			}
		}

		info!("import tracker stopped");
	}

	/// React to shared-store changes from other processes (and harmlessly
	/// to our own): lease movements trigger an immediate claim attempt,
	/// ledger rewrites are folded into our in-memory copy.
	async fn run_store_watch(
		mut changes: broadcast::Receiver<StoreChange>,
		ledger: Arc<JobLedger>,
		coordinator: Arc<LeaseCoordinator>,
		watcher: Arc<CompletionWatcher>,
		poller: Arc<JobPoller>,
		events: EventBus,
		cancel: CancellationToken,
	) {
		loop {
			tokio::select! {
				() = cancel.cancelled() => break,
				change = changes.recv() => match change {
					Ok(StoreChange { key }) if key == keys::POLL_LEASE => {
						coordinator.claim_on_change();
					}
					Ok(StoreChange { key }) if key == keys::JOB_LEDGER => {
						if ledger.reload_if_changed() {
							events.emit(TrackerEvent::LedgerChanged);
							watcher.observe(&ledger.jobs());
							poller.notify();
						}
					}
					Ok(_) => {}
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						// Missed notifications are within the contract;
						// the heartbeat picks up whatever was dropped.
						warn!(skipped, "store change feed lagged");
					}
					Err(broadcast::error::RecvError::Closed) => break,
				},
			}
		}
	}
}
