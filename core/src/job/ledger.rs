//! The durable client-side job ledger.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::{ImportJob, JobId};
use crate::infra::store::{self, keys, SharedStore};

/// Ordered, capped list of the jobs this user cares about.
///
/// The ledger is the single source of truth for the status dock: the poller
/// merges server state *into* it, but only explicit dismissal or ring-buffer
/// eviction ever remove an entry. Every mutation is persisted synchronously
/// under [`keys::JOB_LEDGER`]; construction rehydrates from that key and a
/// corrupt or missing value just means starting empty.
pub struct JobLedger {
	store: Arc<dyn SharedStore>,
	capacity: usize,
	entries: Mutex<Vec<ImportJob>>,
}

impl JobLedger {
	/// Rehydrate the ledger from shared storage.
	pub fn load(store: Arc<dyn SharedStore>, capacity: usize) -> Self {
		let mut entries: Vec<ImportJob> =
			store::read_json(store.as_ref(), keys::JOB_LEDGER).unwrap_or_default();
		entries.truncate(capacity);

		debug!(jobs = entries.len(), "rehydrated job ledger");

		Self {
			store,
			capacity,
			entries: Mutex::new(entries),
		}
	}

	/// Snapshot, most-recently-touched-or-inserted first.
	pub fn jobs(&self) -> Vec<ImportJob> {
		self.lock().clone()
	}

	/// Whether any entry still has a non-terminal status.
	pub fn has_active(&self) -> bool {
		self.lock().iter().any(|job| !job.is_terminal())
	}

	pub fn contains(&self, id: JobId) -> bool {
		self.lock().iter().any(|job| job.id == id)
	}

	/// Insert a new job at the front, or merge into the existing entry and
	/// move it to the front. Truncates to capacity, evicting the oldest.
	/// Returns whether the ledger changed; applying the same upsert twice
	/// changes nothing the second time.
	pub fn upsert(&self, job: ImportJob) -> bool {
		let mut entries = self.lock();

		let changed = match entries.iter().position(|e| e.id == job.id) {
			Some(pos) => {
				let mut existing = entries.remove(pos);
				let merged = existing.merge_from(&job);
				entries.insert(0, existing);
				merged || pos != 0
			}
			None => {
				entries.insert(0, job);
				entries.truncate(self.capacity);
				true
			}
		};

		if changed {
			self.persist(&entries);
		}
		changed
	}

	/// Merge a polled page into the ledger: fetched jobs already present are
	/// merged in place, unknown jobs are ignored, and entries the server no
	/// longer lists are left untouched. One persisted write per call.
	pub fn reconcile(&self, fetched: Vec<ImportJob>) -> bool {
		let mut entries = self.lock();
		let mut changed = false;

		for job in fetched {
			if let Some(existing) = entries.iter_mut().find(|e| e.id == job.id) {
				changed |= existing.merge_from(&job);
			}
		}

		if changed {
			self.persist(&entries);
		}
		changed
	}

	/// Remove an entry by id; a no-op when absent.
	pub fn dismiss(&self, id: JobId) -> bool {
		let mut entries = self.lock();
		let before = entries.len();
		entries.retain(|job| job.id != id);

		let removed = entries.len() != before;
		if removed {
			self.persist(&entries);
		}
		removed
	}

	/// Re-read the persisted array and swap it in when it differs. This is
	/// how a process that is not the leader picks up the leader's
	/// reconciliation.
	/// A corrupt value keeps the current in-memory state.
	pub fn reload_if_changed(&self) -> bool {
		let fresh: Vec<ImportJob> = match self.store.get(keys::JOB_LEDGER) {
			Ok(Some(raw)) => match serde_json::from_str(&raw) {
				Ok(fresh) => fresh,
				Err(error) => {
					warn!(%error, "ignoring corrupt job ledger in shared store");
					return false;
				}
			},
			Ok(None) => Vec::new(),
			Err(error) => {
				warn!(%error, "failed to re-read job ledger");
				return false;
			}
		};

		let mut entries = self.lock();
		if *entries == fresh {
			return false;
		}
		*entries = fresh;
		true
	}

	fn persist(&self, entries: &[ImportJob]) {
		// A failed write leaves the in-memory ledger authoritative for this
		// process; the next successful mutation rewrites the whole array.
		if let Err(error) = store::write_json(self.store.as_ref(), keys::JOB_LEDGER, &entries)
		{
			warn!(%error, "failed to persist job ledger");
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ImportJob>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[cfg(test)]
mod tests {
	use rand::{seq::SliceRandom, Rng};

	use super::*;
	use crate::infra::store::MemoryStore;
	use crate::job::{ImportSource, JobStatus};

	fn ledger_with_capacity(capacity: usize) -> (JobLedger, MemoryStore) {
		let store = MemoryStore::new();
		(JobLedger::load(Arc::new(store.clone()), capacity), store)
	}

	fn queued(id: i64) -> ImportJob {
		ImportJob::queued(JobId(id), ImportSource::CsvGeneric)
	}

	#[test]
	fn upsert_is_idempotent() {
		let (ledger, _store) = ledger_with_capacity(30);

		assert!(ledger.upsert(queued(1)));
		let after_first = ledger.jobs();

		assert!(!ledger.upsert(queued(1)));
		assert_eq!(ledger.jobs(), after_first);
	}

	#[test]
	fn ring_buffer_keeps_the_most_recent() {
		let (ledger, _store) = ledger_with_capacity(5);

		for id in 1..=8 {
			ledger.upsert(queued(id));
		}

		let ids: Vec<i64> = ledger.jobs().iter().map(|j| j.id.0).collect();
		assert_eq!(ids, vec![8, 7, 6, 5, 4]);
	}

	#[test]
	fn merge_moves_entry_to_front() {
		let (ledger, _store) = ledger_with_capacity(30);
		ledger.upsert(queued(1));
		ledger.upsert(queued(2));

		let mut touched = queued(1);
		touched.status = JobStatus::Running;
		ledger.upsert(touched);

		let ids: Vec<i64> = ledger.jobs().iter().map(|j| j.id.0).collect();
		assert_eq!(ids, vec![1, 2]);
		assert_eq!(ledger.jobs()[0].status, JobStatus::Running);
	}

	#[test]
	fn dismiss_removes_only_the_target() {
		let (ledger, _store) = ledger_with_capacity(30);
		ledger.upsert(queued(1));
		ledger.upsert(queued(2));

		assert!(ledger.dismiss(JobId(1)));
		assert!(!ledger.dismiss(JobId(1)));

		let ids: Vec<i64> = ledger.jobs().iter().map(|j| j.id.0).collect();
		assert_eq!(ids, vec![2]);
	}

	#[test]
	fn mutations_survive_a_reload() {
		let store = MemoryStore::new();
		{
			let ledger = JobLedger::load(Arc::new(store.clone()), 30);
			ledger.upsert(queued(1));
			ledger.upsert(queued(2));
			ledger.dismiss(JobId(1));
		}

		let reborn = JobLedger::load(Arc::new(store.clone()), 30);
		let ids: Vec<i64> = reborn.jobs().iter().map(|j| j.id.0).collect();
		assert_eq!(ids, vec![2]);
	}

	#[test]
	fn corrupt_storage_yields_an_empty_ledger() {
		let store = MemoryStore::new();
		store.put(keys::JOB_LEDGER, "not json").unwrap();

		let ledger = JobLedger::load(Arc::new(store), 30);
		assert!(ledger.jobs().is_empty());
	}

	#[test]
	fn reconcile_ignores_unknown_jobs() {
		let (ledger, _store) = ledger_with_capacity(30);
		ledger.upsert(queued(1));

		let mut known = queued(1);
		known.status = JobStatus::Running;

		assert!(ledger.reconcile(vec![known, queued(99)]));

		let jobs = ledger.jobs();
		assert_eq!(jobs.len(), 1);
		assert_eq!(jobs[0].status, JobStatus::Running);
	}

	#[test]
	fn status_only_ever_progresses_under_random_upserts() {
		let (ledger, _store) = ledger_with_capacity(10);
		let mut rng = rand::thread_rng();

		let statuses = [
			JobStatus::Queued,
			JobStatus::Running,
			JobStatus::Succeeded,
			JobStatus::Failed,
		];

		for _ in 0..500 {
			let id = rng.gen_range(1..=5);
			let mut job = queued(id);
			job.status = *statuses.choose(&mut rng).unwrap();

			let before: Vec<(JobId, JobStatus)> =
				ledger.jobs().iter().map(|j| (j.id, j.status)).collect();

			ledger.upsert(job);

			for entry in ledger.jobs() {
				if let Some((_, old)) = before.iter().find(|(id, _)| *id == entry.id) {
					assert!(
						entry.status.can_follow(*old),
						"{old:?} regressed to {:?}",
						entry.status,
					);
				}
			}
		}
	}
}
