//! Import job model and the durable client-side ledger.

mod ledger;
mod types;

pub use ledger::JobLedger;
pub use types::{ImportJob, ImportSource, JobId, JobProgress, JobStatus, JobSummary};
