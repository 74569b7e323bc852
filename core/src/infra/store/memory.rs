//! In-memory shared store.

use std::{
	collections::HashMap,
	sync::{Arc, RwLock},
};

use tokio::sync::broadcast;

use super::{SharedStore, StoreChange, StoreError};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// An in-memory [`SharedStore`].
///
/// Clones share one map and one notification channel, so each clone behaves
/// like one open process ("tab") of the same origin. This is the store the
/// test suite runs the whole coordination layer against, and what embedders
/// use when durability is handled elsewhere.
#[derive(Clone)]
pub struct MemoryStore {
	inner: Arc<Inner>,
}

struct Inner {
	values: RwLock<HashMap<String, String>>,
	changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
	pub fn new() -> Self {
		let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
		Self {
			inner: Arc::new(Inner {
				values: RwLock::new(HashMap::new()),
				changes,
			}),
		}
	}

	fn notify(&self, key: &str) {
		// No receivers is fine; delivery is best-effort by contract.
		let _ = self.inner.changes.send(StoreChange {
			key: key.to_owned(),
		});
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl SharedStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self
			.inner
			.values
			.read()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.get(key)
			.cloned())
	}

	fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.inner
			.values
			.write()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.insert(key.to_owned(), value.to_owned());
		self.notify(key);
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		let removed = self
			.inner
			.values
			.write()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.remove(key)
			.is_some();
		if removed {
			self.notify(key);
		}
		Ok(())
	}

	fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
		self.inner.changes.subscribe()
	}
}
