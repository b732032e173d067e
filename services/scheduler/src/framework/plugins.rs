//! Plugin tier configuration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;
use vsched_policy::{PluginOption, Tier};

/// Receives plugin tiers whenever the store notifies a change.
pub trait PluginRegistry: Send + Sync {
    fn apply_configuration(&self, tiers: &[Tier]);
}

/// Plugin registry that keeps the latest tiers for lookup.
#[derive(Debug, Default)]
pub struct PluginConfig {
    tiers: ArcSwap<Vec<Tier>>,
    applied: AtomicU64,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently applied tiers.
    pub fn tiers(&self) -> Arc<Vec<Tier>> {
        self.tiers.load_full()
    }

    /// First option named `name`, searching tiers in order.
    pub fn option(&self, name: &str) -> Option<PluginOption> {
        self.tiers
            .load()
            .iter()
            .find_map(|tier| tier.plugin(name))
            .cloned()
    }

    /// How many times a configuration was applied.
    pub fn generation(&self) -> u64 {
        self.applied.load(Ordering::Acquire)
    }
}

impl PluginRegistry for PluginConfig {
    fn apply_configuration(&self, tiers: &[Tier]) {
        self.tiers.store(Arc::new(tiers.to_vec()));
        let generation = self.applied.fetch_add(1, Ordering::AcqRel) + 1;
        info!(tiers = tiers.len(), generation, "Plugin configuration applied");
    }
}
