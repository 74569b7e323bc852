//! The durable shared key-value store the coordination layer runs on.
//!
//! Every open process of the same user shares one of these stores; it is the
//! *only* synchronization primitive between them. Change notifications are
//! best-effort (a lagged subscriber silently misses events), so correctness
//! always rests on the heartbeat/staleness timers, never on delivery.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

/// Well-known keys. Values are JSON.
pub mod keys {
	/// Capped array of [`crate::job::ImportJob`].
	pub const JOB_LEDGER: &str = "jobLedger";
	/// [`crate::infra::sync::leader::PollLease`] or absent.
	pub const POLL_LEASE: &str = "pollLease";
	/// Epoch-millis of the most recent fetch by *any* process.
	pub const LAST_POLL_AT: &str = "lastPollAt";
}

/// A key changed (written or removed) in the shared store.
#[derive(Debug, Clone)]
pub struct StoreChange {
	pub key: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("store io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to encode value for key {key}: {source}")]
	Encode {
		key: String,
		source: serde_json::Error,
	},
}

/// Durable shared storage with best-effort change notifications.
///
/// Implementations must deliver a [`StoreChange`] to subscribers after every
/// successful `put`/`remove`, including the caller's own writes (callers
/// guard against notification loops themselves).
pub trait SharedStore: Send + Sync + 'static {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
	fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
	fn remove(&self, key: &str) -> Result<(), StoreError>;
	fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Read and decode a JSON value, tolerating every failure mode.
///
/// Missing keys, read errors and corrupt JSON all come back as `None`; a
/// poisoned store must never take the tracker down with it.
pub fn read_json<T: DeserializeOwned>(store: &dyn SharedStore, key: &str) -> Option<T> {
	let raw = match store.get(key) {
		Ok(Some(raw)) => raw,
		Ok(None) => return None,
		Err(error) => {
			warn!(key, %error, "failed to read shared store key");
			return None;
		}
	};

	match serde_json::from_str(&raw) {
		Ok(value) => Some(value),
		Err(error) => {
			warn!(key, %error, "ignoring corrupt value in shared store");
			None
		}
	}
}

/// Encode and write a JSON value. Write failures are reported, not fatal.
pub fn write_json<T: Serialize>(
	store: &dyn SharedStore,
	key: &str,
	value: &T,
) -> Result<(), StoreError> {
	let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
		key: key.to_owned(),
		source,
	})?;
	store.put(key, &raw)
}
