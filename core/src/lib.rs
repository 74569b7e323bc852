//!
//! # Longbox core
//!
//! The asynchronous import-job tracking and cross-process coordination layer
//! of the Longbox media-collection catalog.
//!
//! Long-running imports (a Plex library sync, a CSV upload, a barcode batch)
//! run on the server; this crate observes them from the client side without a
//! push channel. Several processes of the same user may be open at once, so
//! the layer keeps a durable [`job::JobLedger`] in shared storage, elects a
//! single polling leader among the open processes via a heartbeat lease
//! ([`infra::sync::leader`]), reconciles polled job state back into the
//! ledger ([`service::poller`]), and fires the "job just finished" side
//! effect exactly once per job ([`service::completion`]).
//!
//! The server API and the durable store are both traits
//! ([`api::ImportApi`], [`infra::store::SharedStore`]), so the whole layer
//! runs unmodified against in-memory fakes in tests.
//!
//! ## Basic example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lb_core::{
//!     api::{HttpImportApi, ImportPayload},
//!     infra::store::FsStore,
//!     job::ImportSource,
//!     tracker::ImportTracker,
//!     config::TrackerConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let api = Arc::new(HttpImportApi::new("https://longbox.local"));
//!     let store = Arc::new(FsStore::new("/tmp/longbox").unwrap());
//!     let tracker = ImportTracker::spawn(api, store, TrackerConfig::default()).unwrap();
//!
//!     tracker.on_job_completed(|job| println!("import {} finished", job.id));
//!
//!     let id = tracker
//!         .submit_job(
//!             ImportSource::CsvGeneric,
//!             ImportPayload::Csv {
//!                 file_name: "collection.csv".into(),
//!                 content: "title,issue\nSaga,12".into(),
//!             },
//!         )
//!         .await
//!         .unwrap();
//!     println!("submitted job {id}");
//!
//!     tracker.shutdown().await;
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::dbg_macro,
	deprecated
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod infra;
pub mod job;
pub mod service;
pub mod tracker;

pub use api::{ApiError, HttpImportApi, ImportApi, ImportPayload};
pub use config::{ConfigError, TrackerConfig};
pub use infra::event::{EventBus, TrackerEvent};
pub use infra::store::{keys, FsStore, MemoryStore, SharedStore, StoreChange, StoreError};
pub use infra::sync::leader::{Foreground, LeaseCoordinator, PollLease, PollRole};
pub use job::{
	ImportJob, ImportSource, JobId, JobLedger, JobProgress, JobStatus, JobSummary,
};
pub use service::{completion::CompletionWatcher, poller::JobPoller};
pub use tracker::ImportTracker;
