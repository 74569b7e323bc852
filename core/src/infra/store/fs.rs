//! Filesystem-backed shared store.

use std::{
	fs, io,
	path::{Path, PathBuf},
	sync::Arc,
};

use tokio::sync::broadcast;

use super::{SharedStore, StoreChange, StoreError};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A [`SharedStore`] persisting each key as a JSON file in a data directory.
///
/// Writes go through a temporary file and a rename, so readers never observe
/// a half-written value. Change notifications reach subscribers in the same
/// process; another OS process writing the same directory is picked up on
/// the next read, and the heartbeat/staleness tolerances absorb the delay.
#[derive(Clone)]
pub struct FsStore {
	inner: Arc<Inner>,
}

struct Inner {
	dir: PathBuf,
	changes: broadcast::Sender<StoreChange>,
}

impl FsStore {
	pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
		let dir = dir.as_ref().to_owned();
		fs::create_dir_all(&dir)?;

		let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
		Ok(Self {
			inner: Arc::new(Inner { dir, changes }),
		})
	}

	fn path_for(&self, key: &str) -> PathBuf {
		self.inner.dir.join(format!("{key}.json"))
	}

	fn notify(&self, key: &str) {
		let _ = self.inner.changes.send(StoreChange {
			key: key.to_owned(),
		});
	}
}

impl SharedStore for FsStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		match fs::read_to_string(self.path_for(key)) {
			Ok(raw) => Ok(Some(raw)),
			Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(error) => Err(error.into()),
		}
	}

	fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
		let path = self.path_for(key);
		let staging = path.with_extension("json.tmp");

		fs::write(&staging, value)?;
		fs::rename(&staging, &path)?;

		self.notify(key);
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		match fs::remove_file(self.path_for(key)) {
			Ok(()) => {
				self.notify(key);
				Ok(())
			}
			Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(error) => Err(error.into()),
		}
	}

	fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
		self.inner.changes.subscribe()
	}
}
