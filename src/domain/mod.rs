//! Domain layer for rask-journal-forwarder.
//!
//! Contains the canonical types shared across all modules:
//! - `Severity`: syslog priority of a journal record (Emergency..Debug)
//! - `ForwarderError`: Top-level error type

pub mod error;
pub mod severity;

pub use error::ForwarderError;
pub use severity::{Severity, UnknownSeverity};
