//! Cross-process coordination over shared storage.

pub mod leader;
