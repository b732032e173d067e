//! Scheduler construction.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::worker::{CycleMode, Scheduler};
use crate::cache::{Cache, ClusterConnection, LocalCache};
use crate::conf::{ConfigStore, StoreOptions};
use crate::error::SchedulerError;
use crate::framework::{
    ActionRegistry, DefaultSessionFactory, PluginConfig, PluginRegistry, SessionFactory,
};
use crate::metrics::{MetricsSink, SchedulerMetrics};

/// Builds a [`Scheduler`] with injectable collaborators.
pub struct SchedulerBuilder {
    period: Duration,
    store_options: StoreOptions,
    actions: ActionRegistry,
    sessions: Arc<dyn SessionFactory>,
    plugins: Arc<dyn PluginRegistry>,
    metrics: Arc<dyn MetricsSink>,
    cycle_mode: CycleMode,
}

impl SchedulerBuilder {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            store_options: StoreOptions::default(),
            actions: ActionRegistry::default(),
            sessions: Arc::new(DefaultSessionFactory),
            plugins: Arc::new(PluginConfig::new()),
            metrics: Arc::new(SchedulerMetrics::new()),
            cycle_mode: CycleMode::default(),
        }
    }

    pub fn store_options(mut self, options: StoreOptions) -> Self {
        self.store_options = options;
        self
    }

    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    pub fn session_factory(mut self, sessions: Arc<dyn SessionFactory>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn plugins(mut self, plugins: Arc<dyn PluginRegistry>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn cycle_mode(mut self, mode: CycleMode) -> Self {
        self.cycle_mode = mode;
        self
    }

    /// Build with a directory-watching config store and a [`LocalCache`].
    pub fn build(
        self,
        connection: ClusterConnection,
        scheduler_name: impl Into<String>,
        scheduler_conf: Option<PathBuf>,
        default_queue: impl Into<String>,
    ) -> Result<Scheduler, SchedulerError> {
        self.check_period()?;
        let store = Arc::new(ConfigStore::new(
            scheduler_conf,
            self.store_options.clone(),
        )?);
        let cache = Arc::new(LocalCache::new(connection, scheduler_name, default_queue));
        self.build_with(store, cache)
    }

    /// Build around an existing store and cache.
    ///
    /// Registers the change handler that forwards published tiers to the
    /// plugin registry. Fails on a zero period.
    pub fn build_with(
        self,
        store: Arc<ConfigStore>,
        cache: Arc<dyn Cache>,
    ) -> Result<Scheduler, SchedulerError> {
        self.check_period()?;
        let plugins = Arc::clone(&self.plugins);
        store.add_change_handler(move |store| {
            plugins.apply_configuration(&store.snapshot().tiers);
        });
        debug!(
            actions = ?self.actions.names(),
            mode = ?self.cycle_mode,
            "Scheduler built"
        );

        Ok(Scheduler {
            cache,
            store,
            actions: self.actions,
            sessions: self.sessions,
            metrics: self.metrics,
            period: self.period,
            cycle_mode: self.cycle_mode,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    fn check_period(&self) -> Result<(), SchedulerError> {
        if self.period.is_zero() {
            return Err(SchedulerError::ZeroPeriod);
        }
        Ok(())
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
