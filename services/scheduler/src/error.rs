//! Error types for the scheduler service.

use std::path::PathBuf;

use thiserror::Error;
use vsched_policy::PolicyError;

use crate::conf::WatchError;

/// Errors raised by the configuration store.
///
/// Only `InvalidDefault` and `Watch` ever leave the store; the others are
/// reported through [`crate::conf::ReloadOutcome::Retained`] and logged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The embedded default policy failed to parse (packaging defect).
    #[error("embedded default policy is invalid: {0}")]
    InvalidDefault(#[source] PolicyError),

    /// The configuration directory could not be watched.
    #[error("failed creating file watcher for {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: WatchError,
    },

    /// The configuration file could not be read.
    #[error("failed to read scheduler configuration {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is malformed or fails validation.
    #[error("scheduler configuration {} is invalid: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: PolicyError,
    },
}

/// Errors raised while constructing the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cycles cannot run on a zero period.
    #[error("schedule period must be greater than zero")]
    ZeroPeriod,
}
