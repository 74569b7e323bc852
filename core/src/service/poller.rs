//! The leader-only poll loop.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ImportApi;
use crate::config::TrackerConfig;
use crate::infra::event::{EventBus, TrackerEvent};
use crate::infra::store::{self, keys, SharedStore};
use crate::infra::sync::leader::LeaseCoordinator;
use crate::job::JobLedger;
use crate::service::completion::CompletionWatcher;

/// Fetches server-side job state and reconciles it into the ledger.
///
/// The loop parks while every ledger entry is terminal and is woken by a
/// submission or a ledger change. Each tick re-verifies leadership before
/// anything else (holding it on a previous tick means nothing) and backs
/// off through the shared last-poll timestamp so a leadership handoff never
/// doubles the request rate. Fetch failures are logged and swallowed; this
/// is a best-effort background refresh, not a critical path.
pub struct JobPoller {
	api: Arc<dyn ImportApi>,
	store: Arc<dyn SharedStore>,
	ledger: Arc<JobLedger>,
	coordinator: Arc<LeaseCoordinator>,
	watcher: Arc<CompletionWatcher>,
	events: EventBus,
	poll_interval: Duration,
	min_poll_gap: Duration,
	page_size: usize,
	wake: Notify,
}

impl JobPoller {
	pub fn new(
		api: Arc<dyn ImportApi>,
		store: Arc<dyn SharedStore>,
		ledger: Arc<JobLedger>,
		coordinator: Arc<LeaseCoordinator>,
		watcher: Arc<CompletionWatcher>,
		events: EventBus,
		config: &TrackerConfig,
	) -> Self {
		Self {
			api,
			store,
			ledger,
			coordinator,
			watcher,
			events,
			poll_interval: config.poll_interval,
			min_poll_gap: config.min_poll_gap,
			page_size: config.poll_page_size,
			wake: Notify::new(),
		}
	}

	/// Wake a parked loop; called on submission and on ledger changes.
	pub fn notify(&self) {
		self.wake.notify_one();
	}

	/// Run until cancelled.
	pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
		loop {
			if !self.ledger.has_active() {
				debug!("no active jobs; poll loop parked");
				tokio::select! {
					() = cancel.cancelled() => break,
					() = self.wake.notified() => continue,
				}
			}

			tokio::select! {
				() = cancel.cancelled() => break,
				() = tokio::time::sleep(self.poll_interval) => self.tick().await,
			}
		}
	}

	async fn tick(&self) {
		// Leadership first; never assumed from a prior tick.
		if !self.coordinator.claim() {
			debug!("not the poll leader; skipping tick");
			return;
		}

		let now_ms = Utc::now().timestamp_millis();
		if let Some(last_ms) = store::read_json::<i64>(self.store.as_ref(), keys::LAST_POLL_AT)
		{
			if now_ms.saturating_sub(last_ms) < self.min_poll_gap.as_millis() as i64 {
				debug!("another process polled recently; skipping tick");
				return;
			}
		}

		// Recorded before the fetch. Last-writer-wins: two processes racing
		// the boundary cost one extra request, which the staleness
		// tolerances absorb.
		if let Err(error) =
			store::write_json(self.store.as_ref(), keys::LAST_POLL_AT, &now_ms)
		{
			warn!(%error, "failed to record poll timestamp");
		}

		match self.api.list_jobs(self.page_size).await {
			Ok(fetched) => {
				let count = fetched.len();
				if self.ledger.reconcile(fetched) {
					debug!(count, "reconciled polled jobs into ledger");
					self.events.emit(TrackerEvent::LedgerChanged);
					self.watcher.observe(&self.ledger.jobs());
				}
			}
			Err(error) if error.is_transient() => {
				debug!(%error, "transient poll failure; retrying next tick");
			}
			Err(error) => {
				warn!(%error, "poll failed; retrying next tick");
			}
		}
	}
}
