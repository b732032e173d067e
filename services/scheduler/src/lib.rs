//! vsched scheduler service.
//!
//! Runs periodic scheduling cycles against a hot-reloadable policy:
//! - `conf`: policy store and its file watch
//! - `cache`: cluster state cache seam
//! - `framework`: actions, sessions and plugin registry
//! - `scheduler`: the cycle loop

pub mod cache;
pub mod conf;
pub mod config;
mod error;
pub mod framework;
pub mod metrics;
pub mod scheduler;

pub use error::{SchedulerError, StoreError};
pub use scheduler::{CycleMode, Scheduler, SchedulerBuilder};
