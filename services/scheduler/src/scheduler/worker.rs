//! Scheduler worker.
//!
//! Runs scheduling cycles on a fixed period once the cache has synchronized.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, trace};

use super::builder::SchedulerBuilder;
use crate::cache::{Cache, ClusterConnection};
use crate::conf::ConfigStore;
use crate::error::SchedulerError;
use crate::framework::{ActionRegistry, SessionFactory};
use crate::metrics::MetricsSink;

/// How a tick behaves while an earlier cycle is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CycleMode {
    /// Every tick starts a cycle.
    #[default]
    Overlap,
    /// A tick is dropped while a cycle is in flight.
    SkipIfBusy,
}

/// The scheduler.
pub struct Scheduler {
    pub(super) cache: Arc<dyn Cache>,
    pub(super) store: Arc<ConfigStore>,
    pub(super) actions: ActionRegistry,
    pub(super) sessions: Arc<dyn SessionFactory>,
    pub(super) metrics: Arc<dyn MetricsSink>,
    pub(super) period: Duration,
    pub(super) cycle_mode: CycleMode,
    pub(super) busy: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a scheduler with the default collaborators.
    ///
    /// Fails if `period` is zero or if `scheduler_conf` names a file whose
    /// directory cannot be watched.
    pub fn new(
        connection: ClusterConnection,
        scheduler_name: impl Into<String>,
        scheduler_conf: Option<PathBuf>,
        period: Duration,
        default_queue: impl Into<String>,
    ) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(period).build(
            connection,
            scheduler_name,
            scheduler_conf,
            default_queue,
        )
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn cycle_mode(&self) -> CycleMode {
        self.cycle_mode
    }

    /// Run until shutdown is signaled.
    ///
    /// Starts the configuration watch and the cache, waits for the cache to
    /// sync, then runs cycles every period. Returns after cycles in flight at
    /// shutdown have finished.
    #[instrument(skip_all, fields(period_ms = self.period.as_millis() as u64))]
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        info!(mode = ?self.cycle_mode, "Starting scheduler");

        let watch_task = tokio::spawn({
            let store = Arc::clone(&self.store);
            let shutdown = shutdown.clone();
            async move { store.watch(shutdown).await }
        });
        let cache_task = tokio::spawn({
            let cache = Arc::clone(&self.cache);
            let shutdown = shutdown.clone();
            async move { cache.run(shutdown).await }
        });

        if self.cache.wait_for_cache_sync(shutdown.clone()).await {
            info!("Cache synchronized");
            Arc::clone(&self).run_cycles(shutdown).await;
        } else {
            info!("Shutdown before cache synchronized");
        }

        for (task, handle) in [("watch", watch_task), ("cache", cache_task)] {
            if let Err(e) = handle.await {
                error!(task, error = %e, "Scheduler task failed");
            }
        }
        info!("Scheduler stopped");
    }

    /// Run one scheduling cycle against the current policy snapshot.
    pub fn run_once(&self) {
        let started = Instant::now();
        let policy = self.store.snapshot();
        debug!(actions = ?policy.actions, "Start scheduling cycle");

        let session = self
            .sessions
            .open(Arc::clone(&self.cache), Arc::clone(&policy));
        for name in &policy.actions {
            let Some(action) = self.actions.get(name) else {
                trace!(action = %name, "Action not registered");
                continue;
            };
            let action_started = Instant::now();
            action.execute(&session);
            self.metrics
                .record_action_duration(action.name(), action_started.elapsed());
        }
        self.sessions.close(session);

        let elapsed = started.elapsed();
        self.metrics.record_cycle_duration(elapsed);
        debug!(elapsed_us = elapsed.as_micros() as u64, "End scheduling cycle");
    }

    async fn run_cycles(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_cycle_result(result);
                }
                _ = ticker.tick() => {
                    Arc::clone(&self).start_cycle(&mut in_flight);
                }
            }
        }

        let pending = in_flight.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight cycles");
        }
        while let Some(result) = in_flight.join_next().await {
            log_cycle_result(result);
        }
    }

    fn start_cycle(self: Arc<Self>, in_flight: &mut JoinSet<()>) {
        let guard = match self.cycle_mode {
            CycleMode::Overlap => None,
            CycleMode::SkipIfBusy => match CycleGuard::acquire(&self.busy) {
                Some(guard) => Some(guard),
                None => {
                    debug!("Previous cycle still running, skipping tick");
                    return;
                }
            },
        };

        in_flight.spawn_blocking(move || {
            let _guard = guard;
            self.run_once();
        });
    }
}

fn log_cycle_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "Scheduling cycle panicked");
    }
}

/// Marks a cycle in flight until dropped.
struct CycleGuard {
    busy: Arc<AtomicBool>,
}

impl CycleGuard {
    fn acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                busy: Arc::clone(busy),
            })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_guard_is_exclusive() {
        let busy = Arc::new(AtomicBool::new(false));

        let guard = CycleGuard::acquire(&busy).unwrap();
        assert!(CycleGuard::acquire(&busy).is_none());

        drop(guard);
        assert!(!busy.load(Ordering::Acquire));
        assert!(CycleGuard::acquire(&busy).is_some());
    }
}
