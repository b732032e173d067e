//! Scheduler configuration: the hot-reloadable policy store.
//!
//! - [`ConfigStore`] owns the published policy and its change handlers
//! - [`ConfigStore::watch`] reloads on filesystem changes
//! - [`ChangeSource`] implementations feed the watch loop

#[cfg(target_os = "linux")]
mod inotify;
mod source;
mod store;
mod watcher;

#[cfg(target_os = "linux")]
pub use inotify::InotifyWatcher;
pub use source::{
    ChangeSource, ChannelSource, ChannelSourceHandle, FileEvent, FileEventKind, WatchError,
    WatchStreams,
};
pub use store::{ConfigChangeHandler, ConfigStore, NotifyPolicy, ReloadOutcome, StoreOptions};
