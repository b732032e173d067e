//! Scheduler configuration store.
//!
//! Owns the published [`Policy`]. The store:
//! - bootstraps the embedded default exactly once per instance
//! - reloads the policy file on demand, keeping the previous policy when the
//!   file is unreadable, malformed, or fails validation
//! - publishes new policies as whole values, so a snapshot never mixes
//!   fields from two versions
//! - keeps the change handlers invoked by the watch loop

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, error, info};
use vsched_policy::{parse_policy, PluginDefaults, Policy, PolicyError, DEFAULT_POLICY};

use super::source::{ChangeSource, WatchError};
use crate::error::StoreError;

/// Callback invoked with the store after a qualifying reload event.
pub type ConfigChangeHandler = Arc<dyn Fn(&ConfigStore) + Send + Sync>;

/// When the watch loop invokes change handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifyPolicy {
    /// After every qualifying event, whatever the reload did.
    #[default]
    Always,
    /// Only after a reload published a policy different from the previous one.
    OnChange,
}

impl NotifyPolicy {
    /// Decide whether handlers run after `outcome`.
    pub fn should_notify(self, outcome: &ReloadOutcome) -> bool {
        match self {
            Self::Always => true,
            Self::OnChange => matches!(outcome, ReloadOutcome::Published { changed: true }),
        }
    }
}

/// What a call to [`ConfigStore::reload`] did.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// No configuration file is configured.
    Skipped,
    /// A new policy was published.
    Published { changed: bool },
    /// The file could not be used; the previous policy stays published.
    Retained { error: StoreError },
}

impl ReloadOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// Store construction options.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Capability-flag defaulting applied when parsing.
    pub defaults: PluginDefaults,
    /// Handler notification policy for the watch loop.
    pub notify: NotifyPolicy,
}

/// Hot-reloadable scheduling policy.
pub struct ConfigStore {
    path: Option<PathBuf>,
    options: StoreOptions,
    bootstrapped: OnceLock<Result<(), PolicyError>>,
    published: ArcSwap<Policy>,
    handlers: Mutex<Vec<ConfigChangeHandler>>,
    source: Mutex<Option<Box<dyn ChangeSource>>>,
}

impl ConfigStore {
    /// Create a store for `path`, watching its parent directory.
    ///
    /// An empty path is treated as no path. Fails if the directory cannot be
    /// watched or the embedded default is invalid.
    pub fn new(path: Option<PathBuf>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = normalize_path(path);
        let source = match &path {
            Some(path) => {
                let watcher = watch_directory(watch_dir(path)).map_err(|source| {
                    StoreError::Watch {
                        path: path.clone(),
                        source,
                    }
                })?;
                Some(watcher)
            }
            None => None,
        };
        Self::with_source(path, source, options)
    }

    /// Create a store driven by an explicit change source.
    ///
    /// Bootstraps the default and performs the initial reload before
    /// returning, so the store never exposes an empty policy.
    pub fn with_source(
        path: Option<PathBuf>,
        source: Option<Box<dyn ChangeSource>>,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let store = Self {
            path: normalize_path(path),
            options,
            bootstrapped: OnceLock::new(),
            published: ArcSwap::from_pointee(Policy::default()),
            handlers: Mutex::new(Vec::new()),
            source: Mutex::new(source),
        };

        store.bootstrap()?;
        store.reload();
        Ok(store)
    }

    /// Publish the embedded default policy, once.
    ///
    /// Later calls return the first call's result without touching the
    /// published policy.
    pub fn bootstrap(&self) -> Result<(), StoreError> {
        self.bootstrapped
            .get_or_init(|| {
                let policy = parse_policy(DEFAULT_POLICY, &self.options.defaults)?;
                self.published.store(Arc::new(policy));
                debug!("Embedded default policy published");
                Ok(())
            })
            .clone()
            .map_err(StoreError::InvalidDefault)
    }

    /// Re-read the configuration file and publish it if valid.
    pub fn reload(&self) -> ReloadOutcome {
        let Some(path) = &self.path else {
            return ReloadOutcome::Skipped;
        };

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) => {
                let error = StoreError::Read {
                    path: path.clone(),
                    source,
                };
                error!(error = %error, "Failed to read scheduler configuration, using previous configuration");
                return ReloadOutcome::Retained { error };
            }
        };

        let policy = match parse_policy(&text, &self.options.defaults) {
            Ok(policy) => Arc::new(policy),
            Err(source) => {
                let error = StoreError::Invalid {
                    path: path.clone(),
                    source,
                };
                error!(error = %error, "Rejected scheduler configuration, using previous configuration");
                return ReloadOutcome::Retained { error };
            }
        };

        let previous = self.published.swap(Arc::clone(&policy));
        let changed = *previous != *policy;
        info!(
            path = %path.display(),
            actions = ?policy.actions,
            tiers = policy.tiers.len(),
            changed,
            "Scheduler configuration published"
        );
        ReloadOutcome::Published { changed }
    }

    /// The currently published policy.
    ///
    /// The returned value is never modified; a later reload publishes a new
    /// one instead.
    pub fn snapshot(&self) -> Arc<Policy> {
        self.published.load_full()
    }

    /// Register a handler. Handlers run in registration order.
    pub fn add_change_handler<F>(&self, handler: F)
    where
        F: Fn(&ConfigStore) + Send + Sync + 'static,
    {
        self.handlers.lock().push(Arc::new(handler));
    }

    /// The configuration file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run the change handlers after a reload, subject to the notify policy.
    pub(crate) fn notify_handlers(&self, outcome: &ReloadOutcome) {
        if !self.options.notify.should_notify(outcome) {
            debug!(?outcome, "Skipping change handlers");
            return;
        }
        // Handlers may register further handlers; don't hold the lock.
        let handlers = self.handlers.lock().clone();
        for handler in &handlers {
            handler(self);
        }
    }

    pub(crate) fn take_source(&self) -> Option<Box<dyn ChangeSource>> {
        self.source.lock().take()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("handlers", &self.handlers.lock().len())
            .finish_non_exhaustive()
    }
}

fn normalize_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

#[cfg(target_os = "linux")]
fn watch_directory(dir: PathBuf) -> Result<Box<dyn ChangeSource>, WatchError> {
    Ok(Box::new(super::InotifyWatcher::new(dir)?))
}

#[cfg(not(target_os = "linux"))]
fn watch_directory(dir: PathBuf) -> Result<Box<dyn ChangeSource>, WatchError> {
    Err(WatchError::Unsupported { path: dir })
}

/// Directory holding `path`; a bare file name lives in the working directory.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
