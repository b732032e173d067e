//! Policy data model.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Opaque plugin or component arguments, passed through untouched.
pub type Arguments = BTreeMap<String, serde_yaml::Value>;

/// Generates the closed set of capability flags.
///
/// Each flag is an `Option<bool>`: `None` means "not set in the document"
/// and is resolved by [`crate::PluginDefaults`] during parsing.
macro_rules! define_capabilities {
    ($( $(#[$doc:meta])* $field:ident => $key:literal ),+ $(,)?) => {
        /// Framework hooks a plugin participates in.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct Capabilities {
            $(
                $(#[$doc])*
                #[serde(rename = $key, default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<bool>,
            )+
        }

        impl Capabilities {
            /// Number of flags in the set.
            pub const COUNT: usize = [$(stringify!($field)),+].len();

            /// Every flag explicitly set to `value`.
            #[must_use]
            pub fn all(value: bool) -> Self {
                Self { $( $field: Some(value), )+ }
            }

            /// Set every flag that is still unset to `value`.
            pub fn fill_unset(&mut self, value: bool) {
                $( self.$field.get_or_insert(value); )+
            }

            /// Flags set in `self`, falling back to `fallback` for the rest.
            #[must_use]
            pub fn or(self, fallback: Self) -> Self {
                Self { $( $field: self.$field.or(fallback.$field), )+ }
            }

            /// Returns true once no flag is left unset.
            pub fn is_resolved(&self) -> bool {
                true $( && self.$field.is_some() )+
            }

            /// Flag keys paired with their current values, in declaration order.
            pub fn entries(&self) -> Vec<(&'static str, Option<bool>)> {
                vec![$( ($key, self.$field) ),+]
            }
        }
    };
}

define_capabilities! {
    /// Orders jobs within a queue.
    job_order => "enableJobOrder",
    /// Orders namespaces.
    namespace_order => "enableNamespaceOrder",
    /// Decides whether a job is ready to run.
    job_ready => "enableJobReady",
    /// Decides whether a job is pipelined.
    job_pipelined => "enableJobPipelined",
    /// Orders tasks within a job.
    task_order => "enableTaskOrder",
    /// Selects preemptable victims.
    preemptable => "enablePreemptable",
    /// Selects reclaimable victims.
    reclaimable => "enableReclaimable",
    /// Orders queues.
    queue_order => "enableQueueOrder",
    /// Filters nodes for a task.
    predicate => "enablePredicate",
    /// Picks the best node among candidates.
    best_node => "enableBestNode",
    /// Scores nodes.
    node_order => "enableNodeOrder",
    /// Picks the target job for elect actions.
    target_job => "enableTargetJob",
    /// Reserves nodes.
    reserved_nodes => "enableReservedNodes",
    /// Decides whether a job may be enqueued.
    job_enqueued => "enableJobEnqueued",
    /// Selects victims for eviction.
    victim => "enableVictim",
    /// Decides whether a job is starving.
    job_starving => "enableJobStarving",
}

/// A plugin instance within a tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginOption {
    /// Name of the plugin implementation to instantiate.
    pub name: String,

    /// Hooks this plugin participates in.
    #[serde(flatten)]
    pub capabilities: Capabilities,

    /// Hierarchical mode, only meaningful for `drf`. Not defaulted.
    #[serde(
        rename = "enableHierarchy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_hierarchy: Option<bool>,

    /// Plugin arguments.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: Arguments,
}

impl PluginOption {
    /// Create an option with no flags set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns true for a `drf` plugin with hierarchy explicitly enabled.
    pub fn is_hierarchical_drf(&self) -> bool {
        self.name == "drf" && self.enable_hierarchy == Some(true)
    }
}

/// An ordered group of plugins consulted together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    #[serde(default)]
    pub plugins: Vec<PluginOption>,
}

impl Tier {
    /// Look up a plugin in this tier by name.
    pub fn plugin(&self, name: &str) -> Option<&PluginOption> {
        self.plugins.iter().find(|p| p.name == name)
    }
}

/// Per-component argument block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: Arguments,
}

/// The published scheduling policy.
///
/// Always handled as a whole: the store swaps complete values and readers
/// hold on to the version they loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Policy {
    /// Action names, in execution order. Duplicates are allowed.
    pub actions: Vec<String>,

    /// Plugin tiers, in precedence order.
    pub tiers: Vec<Tier>,

    /// Opaque per-component configuration.
    pub configurations: Vec<Configuration>,

    /// `label:value` entries nodes must carry to be considered.
    pub node_selector: BTreeSet<String>,
}

impl Policy {
    /// Find the first option for `name` across all tiers.
    pub fn plugin(&self, name: &str) -> Option<&PluginOption> {
        self.tiers.iter().find_map(|t| t.plugin(name))
    }

    /// Find the configuration block for `name`.
    pub fn configuration(&self, name: &str) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.name == name)
    }

    /// Whether a node carrying `labels` is eligible under the node selector.
    ///
    /// An empty selector admits every node; otherwise one matching
    /// `label:value` entry is enough.
    pub fn selects_node(&self, labels: &BTreeMap<String, String>) -> bool {
        self.node_selector.is_empty()
            || labels
                .iter()
                .any(|(label, value)| self.node_selector.contains(&format!("{label}:{value}")))
    }
}
