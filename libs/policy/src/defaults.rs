//! Built-in policy document and capability-flag defaulting.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{Capabilities, PluginOption};

/// Policy used until a configuration file is loaded.
///
/// Shipped inside the binary; failing to parse it is a packaging defect.
pub const DEFAULT_POLICY: &str = r#"
actions: "enqueue, allocate, backfill"
tiers:
- plugins:
  - name: priority
  - name: gang
  - name: conformance
- plugins:
  - name: overcommit
  - name: drf
  - name: predicates
  - name: proportion
  - name: nodeorder
"#;

type Override = Arc<dyn Fn(&mut Capabilities) + Send + Sync>;

/// Resolves unset capability flags on parsed plugin options.
///
/// Plugins may register an override that runs before the blanket default.
/// An override cannot change a flag the document set explicitly; anything
/// still unset afterwards becomes `true`.
#[derive(Clone, Default)]
pub struct PluginDefaults {
    overrides: HashMap<String, Override>,
}

impl PluginDefaults {
    /// Defaults with no plugin overrides (every unset flag becomes `true`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override for `plugin`, replacing any previous one.
    #[must_use]
    pub fn with_override<F>(mut self, plugin: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Capabilities) + Send + Sync + 'static,
    {
        self.overrides.insert(plugin.into(), Arc::new(f));
        self
    }

    /// Resolve every unset flag of `option`.
    pub fn apply(&self, option: &mut PluginOption) {
        if let Some(f) = self.overrides.get(&option.name) {
            let explicit = option.capabilities;
            f(&mut option.capabilities);
            // Flags written in the document win over the override.
            option.capabilities = explicit.or(option.capabilities);
        }
        option.capabilities.fill_unset(true);
    }
}

impl fmt::Debug for PluginDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.overrides.keys().collect();
        names.sort();
        f.debug_struct("PluginDefaults")
            .field("overrides", &names)
            .finish()
    }
}
