//! Scheduling loop.
//!
//! - [`Scheduler`] runs one cycle per period against the published policy
//! - [`SchedulerBuilder`] wires in the collaborators

mod builder;
mod worker;

pub use builder::SchedulerBuilder;
pub use worker::{CycleMode, Scheduler};
