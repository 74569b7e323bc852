//! Poll-leader election and lease management.
//!
//! A user may have the catalog open in several processes at once; letting
//! each of them poll the server for import-job status would multiply load by
//! the number of open windows for no benefit. Exactly one *foregrounded*
//! process (visible and focused) holds the poll lease at a time and fetches
//! on behalf of all of them. The lease lives in shared storage, is renewed by
//! heartbeat, and goes stale after a fixed window so a crashed leader is
//! replaced automatically.
//!
//! Storage-change notifications only shorten leaderless gaps; the heartbeat
//! and staleness timers are what make the protocol correct.

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::infra::event::{EventBus, TrackerEvent};
use crate::infra::store::{self, keys, SharedStore};

/// The coordination token in shared storage.
///
/// At most one non-stale lease exists at a time. A lease is valid for the
/// configured staleness window after `claimed_at`; past that, any
/// foregrounded process may reclaim it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollLease {
	/// Opaque identifier of the owning process, generated once per process.
	pub owner_id: Uuid,
	/// Epoch-millis of the last successful claim or renewal.
	pub claimed_at: i64,
}

impl PollLease {
	pub fn new(owner_id: Uuid, now_ms: i64) -> Self {
		Self {
			owner_id,
			claimed_at: now_ms,
		}
	}

	pub fn is_stale(&self, now_ms: i64, stale_after: Duration) -> bool {
		now_ms.saturating_sub(self.claimed_at) > stale_after.as_millis() as i64
	}

	pub fn owned_by(&self, owner_id: Uuid) -> bool {
		self.owner_id == owner_id
	}
}

/// Role of this process in the polling protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollRole {
	/// This process holds the lease and runs the poller.
	Leader,
	/// Some other process polls, or nobody does.
	Unclaimed,
}

/// Host-reported visibility and focus bits.
///
/// A process is foregrounded, and thus allowed to claim the lease, only
/// while it is both visible and focused. Both bits default to `true` so an
/// embedder that never wires them still elects a leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForegroundState {
	pub visible: bool,
	pub focused: bool,
}

impl ForegroundState {
	pub const fn is_foreground(self) -> bool {
		self.visible && self.focused
	}
}

impl Default for ForegroundState {
	fn default() -> Self {
		Self {
			visible: true,
			focused: true,
		}
	}
}

/// Handle the host uses to report visibility/focus changes.
#[derive(Clone)]
pub struct Foreground {
	sender: Arc<watch::Sender<ForegroundState>>,
}

impl Foreground {
	pub fn new() -> (Self, watch::Receiver<ForegroundState>) {
		let (sender, receiver) = watch::channel(ForegroundState::default());
		(
			Self {
				sender: Arc::new(sender),
			},
			receiver,
		)
	}

	pub fn set_visible(&self, visible: bool) {
		self.sender.send_modify(|state| state.visible = visible);
	}

	pub fn set_focused(&self, focused: bool) {
		self.sender.send_modify(|state| state.focused = focused);
	}

	pub fn set(&self, visible: bool, focused: bool) {
		self.sender
			.send_modify(|state| *state = ForegroundState { visible, focused });
	}
}

/// Claims, renews and releases the poll lease for one process.
pub struct LeaseCoordinator {
	owner_id: Uuid,
	store: Arc<dyn SharedStore>,
	heartbeat: Duration,
	stale_after: Duration,
	foreground: watch::Receiver<ForegroundState>,
	events: EventBus,
	is_leader: AtomicBool,
}

impl LeaseCoordinator {
	pub fn new(
		store: Arc<dyn SharedStore>,
		config: &TrackerConfig,
		foreground: watch::Receiver<ForegroundState>,
		events: EventBus,
	) -> Self {
		Self {
			owner_id: Uuid::new_v4(),
			store,
			heartbeat: config.heartbeat,
			stale_after: config.lease_stale_after,
			foreground,
			events,
			is_leader: AtomicBool::new(false),
		}
	}

	pub fn owner_id(&self) -> Uuid {
		self.owner_id
	}

	pub fn role(&self) -> PollRole {
		if self.is_leader.load(Ordering::SeqCst) {
			PollRole::Leader
		} else {
			PollRole::Unclaimed
		}
	}

	fn now_ms() -> i64 {
		Utc::now().timestamp_millis()
	}

	fn read_lease(&self) -> Option<PollLease> {
		store::read_json(self.store.as_ref(), keys::POLL_LEASE)
	}

	fn is_foreground(&self) -> bool {
		self.foreground.borrow().is_foreground()
	}

	/// Attempt to claim or renew the lease.
	///
	/// Succeeds iff this process is foregrounded and the current lease is
	/// absent, stale, or already ours; on success the lease is rewritten
	/// with a fresh timestamp. Every poll tick runs this first; leadership
	/// is never assumed from a previous tick.
	pub fn claim(&self) -> bool {
		self.claim_at(Self::now_ms())
	}

	/// [`Self::claim`] with an explicit clock, the testable core of the
	/// protocol.
	pub fn claim_at(&self, now_ms: i64) -> bool {
		if !self.is_foreground() {
			self.set_leader(false);
			return false;
		}

		if let Some(lease) = self.read_lease() {
			if !lease.owned_by(self.owner_id) && !lease.is_stale(now_ms, self.stale_after) {
				debug!(
					owner = %lease.owner_id,
					"poll lease held elsewhere; staying unclaimed",
				);
				self.set_leader(false);
				return false;
			}
		}

		let lease = PollLease::new(self.owner_id, now_ms);
		if let Err(error) = store::write_json(self.store.as_ref(), keys::POLL_LEASE, &lease) {
			warn!(%error, "failed to write poll lease");
			self.set_leader(false);
			return false;
		}

		self.set_leader(true);
		true
	}

	/// Clear the lease iff it is currently ours, never another process's.
	pub fn release(&self) {
		if let Some(lease) = self.read_lease() {
			if lease.owned_by(self.owner_id) {
				if let Err(error) = self.store.remove(keys::POLL_LEASE) {
					warn!(%error, "failed to release poll lease");
				}
			}
		}
		self.set_leader(false);
	}

	/// React to the lease key changing in shared storage.
	///
	/// A foregrounded process claims immediately instead of waiting for its
	/// own heartbeat, minimizing leaderless gaps. Seeing our own fresh lease
	/// is a no-op, which also keeps self-notifications from ping-ponging.
	pub fn claim_on_change(&self) {
		if !self.is_foreground() {
			return;
		}

		let now_ms = Self::now_ms();
		if let Some(lease) = self.read_lease() {
			if lease.owned_by(self.owner_id) && !lease.is_stale(now_ms, self.stale_after) {
				return;
			}
		}

		self.claim_at(now_ms);
	}

	fn set_leader(&self, leader: bool) {
		let was = self.is_leader.swap(leader, Ordering::SeqCst);
		if was != leader {
			if leader {
				info!(owner = %self.owner_id, "acquired poll leadership");
			} else {
				info!(owner = %self.owner_id, "lost poll leadership");
			}
			self.events.emit(TrackerEvent::LeadershipChanged { leader });
		}
	}

	/// Heartbeat loop: renew the lease while foregrounded, release it on
	/// background/unload. Runs until cancelled.
	pub async fn run_heartbeat(self: Arc<Self>, cancel: CancellationToken) {
		let mut ticker = tokio::time::interval(self.heartbeat);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		let mut foreground = self.foreground.clone();
		let mut foreground_closed = false;

		loop {
			tokio::select! {
				() = cancel.cancelled() => {
					self.release();
					break;
				}
				_ = ticker.tick() => {
					if foreground.borrow().is_foreground() {
						self.claim();
					}
				}
				changed = foreground.changed(), if !foreground_closed => {
					if changed.is_err() {
						// Host dropped its handle; keep heartbeating with
						// the last reported state.
						foreground_closed = true;
						continue;
					}
					if foreground.borrow().is_foreground() {
						self.claim();
					} else {
						self.release();
					}
				}
			}
		}
	}
}
