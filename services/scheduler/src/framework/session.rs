//! Scheduling sessions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;
use vsched_policy::{Configuration, Policy, Tier};

use crate::cache::Cache;

/// State shared by the actions of one cycle.
///
/// Bound to exactly one policy snapshot for its whole lifetime.
pub struct Session {
    uid: Uuid,
    cache: Arc<dyn Cache>,
    policy: Arc<Policy>,
    opened_at: Instant,
}

impl Session {
    pub fn new(cache: Arc<dyn Cache>, policy: Arc<Policy>) -> Self {
        Self {
            uid: Uuid::new_v4(),
            cache,
            policy,
            opened_at: Instant::now(),
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.policy.tiers
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.policy.configurations
    }

    /// The snapshot this session was opened with.
    pub fn policy(&self) -> &Arc<Policy> {
        &self.policy
    }

    /// Node filter for actions placing work; uses this session's snapshot.
    pub fn selects_node(&self, labels: &BTreeMap<String, String>) -> bool {
        self.policy.selects_node(labels)
    }

    pub fn elapsed(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("tiers", &self.policy.tiers.len())
            .finish_non_exhaustive()
    }
}

/// Opens and closes sessions around each cycle.
pub trait SessionFactory: Send + Sync {
    fn open(&self, cache: Arc<dyn Cache>, policy: Arc<Policy>) -> Session;

    fn close(&self, session: Session);
}

/// Session factory with no side effects beyond logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSessionFactory;

impl SessionFactory for DefaultSessionFactory {
    fn open(&self, cache: Arc<dyn Cache>, policy: Arc<Policy>) -> Session {
        let session = Session::new(cache, policy);
        debug!(session = %session.uid(), "Open session");
        session
    }

    fn close(&self, session: Session) {
        debug!(
            session = %session.uid(),
            elapsed_us = session.elapsed().as_micros() as u64,
            "Close session"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::watch;
    use vsched_policy::{PluginOption, Tier};

    struct NullCache;

    #[async_trait]
    impl Cache for NullCache {
        async fn run(&self, _shutdown: watch::Receiver<bool>) {}

        async fn wait_for_cache_sync(&self, _shutdown: watch::Receiver<bool>) -> bool {
            true
        }
    }

    #[test]
    fn test_session_exposes_snapshot() {
        let policy = Arc::new(Policy {
            actions: vec!["allocate".to_string()],
            tiers: vec![Tier {
                plugins: vec![PluginOption::new("gang")],
            }],
            ..Default::default()
        });

        let factory = DefaultSessionFactory;
        let session = factory.open(Arc::new(NullCache), Arc::clone(&policy));

        assert_eq!(session.tiers().len(), 1);
        assert!(session.configurations().is_empty());
        assert!(Arc::ptr_eq(session.policy(), &policy));
        factory.close(session);
    }

    #[test]
    fn test_session_filters_nodes_by_snapshot() {
        let policy = Arc::new(Policy {
            node_selector: ["zone:a".to_string()].into(),
            ..Default::default()
        });
        let session = Session::new(Arc::new(NullCache), policy);

        let zone = |value: &str| BTreeMap::from([("zone".to_string(), value.to_string())]);
        assert!(session.selects_node(&zone("a")));
        assert!(!session.selects_node(&zone("b")));
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        let policy = Arc::new(Policy::default());
        let a = Session::new(Arc::new(NullCache), Arc::clone(&policy));
        let b = Session::new(Arc::new(NullCache), policy);
        assert_ne!(a.uid(), b.uid());
    }
}
