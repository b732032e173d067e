//! # vsched-policy
//!
//! Scheduling policy model for vsched.
//!
//! A [`Policy`] is the unit the scheduler publishes and every scheduling cycle
//! reads. It carries:
//!
//! - the ordered action pipeline (`enqueue`, `allocate`, ...)
//! - the plugin tiers, consulted in order by the session framework
//! - opaque per-component configuration blocks
//! - the node selector set (`label:value` entries)
//!
//! ## Invariants
//!
//! - Every capability flag of every plugin is resolved after parsing
//! - No tier combines hierarchical `drf` with `proportion`
//! - Parsing is pure: no I/O, same text in, same policy out

mod defaults;
mod error;
mod parse;
mod types;

pub use defaults::{PluginDefaults, DEFAULT_POLICY};
pub use error::PolicyError;
pub use parse::{parse_actions, parse_node_selector, parse_policy, validate_tiers};
pub use types::*;
