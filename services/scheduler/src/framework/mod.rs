//! Scheduling framework seams.
//!
//! Actions, sessions and the plugin registry are supplied by the embedder;
//! the defaults here keep the scheduler runnable on its own.

mod action;
mod plugins;
mod session;

pub use action::{Action, ActionRegistry};
pub use plugins::{PluginConfig, PluginRegistry};
pub use session::{DefaultSessionFactory, Session, SessionFactory};
