//! Event bus for decoupled communication with the UI layer.

use tokio::sync::broadcast;
use tracing::trace;

use crate::job::ImportJob;

/// Events emitted by the tracker for a UI status dock to render from.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
	/// The job ledger changed (submission, dismissal or reconciliation).
	LedgerChanged,
	/// A job reached `succeeded`; fired at most once per job per process.
	JobCompleted { job: ImportJob },
	/// This process gained or lost the polling lease.
	LeadershipChanged { leader: bool },
}

/// Broadcast fan-out for [`TrackerEvent`].
///
/// Subscribers that fall behind lose the oldest events; everything a
/// subscriber renders can be re-derived from the ledger, so lag is benign.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn emit(&self, event: TrackerEvent) {
		trace!(?event, "emitting tracker event");
		// An error only means nobody is listening right now.
		let _ = self.sender.send(event);
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
		self.sender.subscribe()
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}
}
