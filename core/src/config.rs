//! Tracker tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the import tracker and its background services.
///
/// The defaults are the reference behavior: heartbeat every 8s, a lease
/// going stale after 25s (about three missed heartbeats), polling every 10s
/// with a 6s cross-process floor between fetches, and a ledger of the 30
/// most recent jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
	/// How often a foregrounded process renews its poll lease.
	pub heartbeat: Duration,

	/// Age after which a lease may be reclaimed by any process.
	pub lease_stale_after: Duration,

	/// Interval between poll ticks while jobs are active.
	pub poll_interval: Duration,

	/// Minimum gap between fetches across *all* processes, enforced through
	/// the shared last-poll timestamp.
	pub min_poll_gap: Duration,

	/// Maximum number of jobs retained in the ledger.
	pub ledger_capacity: usize,

	/// Page size requested from the server on each poll.
	pub poll_page_size: usize,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		Self {
			heartbeat: Duration::from_secs(8),
			lease_stale_after: Duration::from_secs(25),
			poll_interval: Duration::from_secs(10),
			min_poll_gap: Duration::from_secs(6),
			ledger_capacity: 30,
			poll_page_size: 50,
		}
	}
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error(
		"lease staleness ({stale:?}) must be at least twice the heartbeat interval ({heartbeat:?})"
	)]
	StalenessTooTight { stale: Duration, heartbeat: Duration },

	#[error("ledger capacity must be at least 1")]
	ZeroCapacity,
}

impl TrackerConfig {
	/// Reject configurations that would make leadership flap or the ledger
	/// useless. The staleness threshold needs a safety margin over the
	/// heartbeat so ordinary timer jitter cannot trigger a false takeover.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.lease_stale_after < self.heartbeat * 2 {
			return Err(ConfigError::StalenessTooTight {
				stale: self.lease_stale_after,
				heartbeat: self.heartbeat,
			});
		}
		if self.ledger_capacity == 0 {
			return Err(ConfigError::ZeroCapacity);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		assert!(TrackerConfig::default().validate().is_ok());
	}

	#[test]
	fn tight_staleness_is_rejected() {
		let config = TrackerConfig {
			heartbeat: Duration::from_secs(8),
			lease_stale_after: Duration::from_secs(10),
			..TrackerConfig::default()
		};
		assert!(matches!(
			config.validate(),
			Err(ConfigError::StalenessTooTight { .. })
		));
	}

	#[test]
	fn zero_capacity_is_rejected() {
		let config = TrackerConfig {
			ledger_capacity: 0,
			..TrackerConfig::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::ZeroCapacity)));
	}
}
