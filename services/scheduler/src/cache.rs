//! Cluster state cache interface.
//!
//! The scheduler only needs two things from the cache: a task that keeps it
//! synchronized, and a way to wait for the first full sync. The
//! [`LocalCache`] implementation serves in-process deployments and tests.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

/// Parameters for reaching the cluster API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConnection {
    /// API server address; overrides the one in `kubeconfig`.
    pub master: Option<String>,
    /// Credentials file.
    pub kubeconfig: Option<PathBuf>,
}

/// Cluster state cache.
#[async_trait]
pub trait Cache: Send + Sync + 'static {
    /// Keep the cache synchronized until shutdown is signaled.
    async fn run(&self, shutdown: watch::Receiver<bool>);

    /// Wait for the first full synchronization.
    ///
    /// Returns `false` if shutdown was signaled first.
    async fn wait_for_cache_sync(&self, shutdown: watch::Receiver<bool>) -> bool;
}

/// In-process cache.
///
/// Holds no cluster objects of its own; it is synchronized as soon as it runs.
pub struct LocalCache {
    connection: ClusterConnection,
    scheduler_name: String,
    default_queue: String,
    synced: watch::Sender<bool>,
}

impl LocalCache {
    /// Create a cache for `scheduler_name`.
    pub fn new(
        connection: ClusterConnection,
        scheduler_name: impl Into<String>,
        default_queue: impl Into<String>,
    ) -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            connection,
            scheduler_name: scheduler_name.into(),
            default_queue: default_queue.into(),
            synced,
        }
    }

    pub fn scheduler_name(&self) -> &str {
        &self.scheduler_name
    }

    /// Queue assigned to jobs that do not name one.
    pub fn default_queue(&self) -> &str {
        &self.default_queue
    }

    /// Whether the initial sync has completed.
    pub fn is_synced(&self) -> bool {
        *self.synced.borrow()
    }
}

#[async_trait]
impl Cache for LocalCache {
    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scheduler_name = %self.scheduler_name,
            master = ?self.connection.master,
            default_queue = %self.default_queue,
            "Starting cache"
        );
        self.synced.send_replace(true);

        // Nothing to poll; hold the task open until shutdown.
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
        info!("Cache stopped");
    }

    async fn wait_for_cache_sync(&self, mut shutdown: watch::Receiver<bool>) -> bool {
        let mut synced = self.synced.subscribe();
        let stopped = async {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                // Shutdown can no longer be signaled.
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            biased;

            result = synced.wait_for(|synced| *synced) => result.is_ok(),
            _ = stopped => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn cache() -> LocalCache {
        LocalCache::new(ClusterConnection::default(), "vsched", "default")
    }

    #[test]
    fn test_accessors() {
        let cache = cache();
        assert_eq!(cache.scheduler_name(), "vsched");
        assert_eq!(cache.default_queue(), "default");
        assert!(!cache.is_synced());
    }

    #[tokio::test]
    async fn test_wait_for_sync_after_run() {
        let cache = Arc::new(cache());
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn({
            let cache = Arc::clone(&cache);
            let rx = rx.clone();
            async move { cache.run(rx).await }
        });

        let synced = tokio::time::timeout(Duration::from_secs(5), cache.wait_for_cache_sync(rx))
            .await
            .unwrap();
        assert!(synced);
        assert!(cache.is_synced());

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_sync_stops_on_shutdown() {
        let cache = cache();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let synced = tokio::time::timeout(Duration::from_secs(5), cache.wait_for_cache_sync(rx))
            .await
            .unwrap();
        assert!(!synced);
    }
}
