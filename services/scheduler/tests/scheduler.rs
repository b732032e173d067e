//! Scheduler loop tests.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use vsched_scheduler::cache::{Cache, ClusterConnection};
use vsched_scheduler::conf::{ConfigStore, StoreOptions};
use vsched_scheduler::framework::{Action, ActionRegistry, PluginConfig, Session};
use vsched_scheduler::metrics::SchedulerMetrics;
use vsched_scheduler::{CycleMode, Scheduler, SchedulerBuilder, SchedulerError, StoreError};

const INITIAL: &str = r#"
actions: "allocate"
tiers:
- plugins:
  - name: priority
  - name: gang
"#;

const UPDATED: &str = r#"
actions: "allocate, backfill"
tiers:
- plugins:
  - name: priority
- plugins:
  - name: drf
    enableHierarchy: true
  - name: predicates
"#;

/// Counts executions and tracks the highest concurrency seen.
#[derive(Default)]
struct CountingAction {
    name: &'static str,
    delay: Duration,
    runs: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl CountingAction {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            ..Default::default()
        })
    }

    fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            delay,
            ..Default::default()
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Action for CountingAction {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, session: &Session) {
        assert!(!session.tiers().is_empty());
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

/// Cache that is synchronized from the start.
struct ReadyCache;

#[async_trait]
impl Cache for ReadyCache {
    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let _ = shutdown.wait_for(|stop| *stop).await;
    }

    async fn wait_for_cache_sync(&self, _shutdown: watch::Receiver<bool>) -> bool {
        true
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[test]
fn run_once_skips_unregistered_actions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.yaml");
    fs::write(&path, "actions: \"a, b\"\ntiers:\n- plugins:\n  - name: gang\n").unwrap();

    let store = Arc::new(
        ConfigStore::with_source(Some(path), None, StoreOptions::default()).unwrap(),
    );
    let a = CountingAction::new("a");
    let metrics = Arc::new(SchedulerMetrics::new());
    let scheduler = SchedulerBuilder::new(Duration::from_secs(1))
        .actions(ActionRegistry::new().with(a.clone()))
        .metrics(metrics.clone())
        .build_with(store, Arc::new(ReadyCache))
        .unwrap();

    scheduler.run_once();

    assert_eq!(a.runs(), 1);
    assert_eq!(metrics.action_stats("a").unwrap().count, 1);
    assert!(metrics.action_stats("b").is_none());
    assert_eq!(metrics.all_action_stats().len(), 1);
    assert_eq!(metrics.cycle_count(), 1);
}

#[test]
fn new_fails_when_config_directory_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("policy.yaml");

    let result = Scheduler::new(
        ClusterConnection::default(),
        "vsched",
        Some(path),
        Duration::from_secs(1),
        "default",
    );

    assert!(matches!(
        result,
        Err(SchedulerError::Store(StoreError::Watch { .. }))
    ));
}

#[test]
fn zero_period_is_rejected() {
    let result = Scheduler::new(
        ClusterConnection::default(),
        "vsched",
        None,
        Duration::ZERO,
        "default",
    );
    assert!(matches!(result, Err(SchedulerError::ZeroPeriod)));

    let store = Arc::new(ConfigStore::new(None, StoreOptions::default()).unwrap());
    let result = SchedulerBuilder::new(Duration::ZERO).build_with(store, Arc::new(ReadyCache));
    assert!(matches!(result, Err(SchedulerError::ZeroPeriod)));
}

#[test]
fn new_without_config_uses_default_policy() {
    let scheduler = Scheduler::new(
        ClusterConnection::default(),
        "vsched",
        None,
        Duration::from_millis(100),
        "default",
    )
    .unwrap();

    assert_eq!(
        scheduler.store().snapshot().actions,
        vec!["enqueue", "allocate", "backfill"]
    );
    assert_eq!(scheduler.period(), Duration::from_millis(100));
    assert_eq!(scheduler.cycle_mode(), CycleMode::Overlap);
    assert!(scheduler.actions().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_cycles_and_forwards_reloaded_tiers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.yaml");
    fs::write(&path, INITIAL).unwrap();

    let allocate = CountingAction::new("allocate");
    let backfill = CountingAction::new("backfill");
    let plugins = Arc::new(PluginConfig::new());
    let metrics = Arc::new(SchedulerMetrics::new());

    let scheduler = SchedulerBuilder::new(Duration::from_millis(20))
        .actions(
            ActionRegistry::new()
                .with(allocate.clone())
                .with(backfill.clone()),
        )
        .plugins(plugins.clone())
        .metrics(metrics.clone())
        .build(
            ClusterConnection::default(),
            "vsched",
            Some(path.clone()),
            "default",
        )
        .unwrap();

    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(Arc::new(scheduler).run(rx));

    wait_until(|| allocate.runs() > 0).await;
    assert_eq!(backfill.runs(), 0);
    assert_eq!(plugins.generation(), 0);

    fs::write(&path, UPDATED).unwrap();

    wait_until(|| plugins.generation() > 0).await;
    assert_eq!(plugins.tiers().len(), 2);
    assert_eq!(plugins.option("drf").unwrap().enable_hierarchy, Some(true));
    wait_until(|| backfill.runs() > 0).await;

    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();

    assert!(metrics.cycle_count() > 0);
    assert!(metrics.action_stats("allocate").unwrap().count > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn skip_if_busy_never_overlaps_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.yaml");
    fs::write(&path, INITIAL).unwrap();

    let store = Arc::new(
        ConfigStore::with_source(Some(path), None, StoreOptions::default()).unwrap(),
    );
    let allocate = CountingAction::slow("allocate", Duration::from_millis(60));
    let scheduler = SchedulerBuilder::new(Duration::from_millis(10))
        .actions(ActionRegistry::new().with(allocate.clone()))
        .cycle_mode(CycleMode::SkipIfBusy)
        .build_with(store, Arc::new(ReadyCache))
        .unwrap();

    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(Arc::new(scheduler).run(rx));

    wait_until(|| allocate.runs() >= 3).await;
    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(allocate.max_running.load(Ordering::SeqCst), 1);
    assert_eq!(allocate.running.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn default_mode_lets_cycles_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.yaml");
    fs::write(&path, INITIAL).unwrap();

    let store = Arc::new(
        ConfigStore::with_source(Some(path), None, StoreOptions::default()).unwrap(),
    );
    let allocate = CountingAction::slow("allocate", Duration::from_millis(60));
    let scheduler = SchedulerBuilder::new(Duration::from_millis(10))
        .actions(ActionRegistry::new().with(allocate.clone()))
        .build_with(store, Arc::new(ReadyCache))
        .unwrap();
    assert_eq!(scheduler.cycle_mode(), CycleMode::Overlap);

    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(Arc::new(scheduler).run(rx));

    wait_until(|| allocate.max_running.load(Ordering::SeqCst) > 1).await;
    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();

    // Shutdown waits for every cycle already started.
    assert_eq!(allocate.running.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn run_returns_on_shutdown_before_sync() {
    struct NeverSynced;

    #[async_trait]
    impl Cache for NeverSynced {
        async fn run(&self, mut shutdown: watch::Receiver<bool>) {
            let _ = shutdown.wait_for(|stop| *stop).await;
        }

        async fn wait_for_cache_sync(&self, mut shutdown: watch::Receiver<bool>) -> bool {
            let _ = shutdown.wait_for(|stop| *stop).await;
            false
        }
    }

    let store = Arc::new(ConfigStore::new(None, StoreOptions::default()).unwrap());
    let metrics = Arc::new(SchedulerMetrics::new());
    let scheduler = SchedulerBuilder::new(Duration::from_millis(10))
        .metrics(metrics.clone())
        .build_with(store, Arc::new(NeverSynced))
        .unwrap();

    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(Arc::new(scheduler).run(rx));
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metrics.cycle_count(), 0);
}
