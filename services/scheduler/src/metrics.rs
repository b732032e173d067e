//! Scheduling duration metrics.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

/// Receives per-action and per-cycle durations.
pub trait MetricsSink: Send + Sync {
    /// One action finished executing.
    fn record_action_duration(&self, action: &str, elapsed: Duration);

    /// One full scheduling cycle finished.
    fn record_cycle_duration(&self, elapsed: Duration);
}

/// Aggregated durations for one series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationStats {
    pub count: u64,
    pub total: Duration,
    pub last: Duration,
    pub max: Duration,
}

impl DurationStats {
    fn observe(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.last = elapsed;
        self.max = self.max.max(elapsed);
    }

    /// Mean duration, zero when nothing was observed.
    pub fn mean(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total / count,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.count as f64),
        }
    }
}

/// In-memory metrics sink.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    /// Completed cycles.
    pub cycles: AtomicU64,
    /// Sum of cycle durations in microseconds.
    pub cycle_micros_total: AtomicU64,
    /// Duration of the most recent cycle in microseconds.
    pub last_cycle_micros: AtomicU64,

    actions: Mutex<BTreeMap<String, DurationStats>>,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats for `action`, if it ever ran.
    pub fn action_stats(&self, action: &str) -> Option<DurationStats> {
        self.actions.lock().get(action).copied()
    }

    /// Stats for every action that ran, keyed by name.
    pub fn all_action_stats(&self) -> BTreeMap<String, DurationStats> {
        self.actions.lock().clone()
    }

    /// Number of completed cycles.
    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}

impl MetricsSink for SchedulerMetrics {
    fn record_action_duration(&self, action: &str, elapsed: Duration) {
        self.actions
            .lock()
            .entry(action.to_string())
            .or_default()
            .observe(elapsed);
        trace!(action, elapsed_us = elapsed.as_micros() as u64, "Action duration");
    }

    fn record_cycle_duration(&self, elapsed: Duration) {
        let micros = elapsed.as_micros() as u64;
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.cycle_micros_total.fetch_add(micros, Ordering::Relaxed);
        self.last_cycle_micros.store(micros, Ordering::Relaxed);
        trace!(elapsed_us = micros, "Cycle duration");
    }
}
