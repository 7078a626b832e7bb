//! Harness errors.
//!
//! Everything here is setup-fatal: per-check failures and recovered faults
//! are recorded in the run's counters, never returned as errors.

use std::{collections::TryReserveError, io};

use thiserror::Error;

/// Errors that abort a harness run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
  /// Registry storage could not be grown.
  #[error("malloc failed")]
  Alloc(#[from] TryReserveError),

  /// `--bench` was requested on a target without a cycle counter.
  #[error("--bench is not supported on your system")]
  BenchUnsupported,

  /// The cycle counter exists but faulted when probed.
  #[error("unable to access cycle counter")]
  CycleCounterUnavailable,

  /// Writing a report stream failed.
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  /// Command line could not be parsed.
  #[error("{0}")]
  Usage(String),
}

/// Result alias for harness operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;
