//! Policy document parsing and validation.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::defaults::PluginDefaults;
use crate::error::PolicyError;
use crate::types::{Configuration, Policy, Tier};

/// On-disk shape of a policy document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyDocument {
    #[serde(default)]
    actions: String,

    #[serde(default)]
    tiers: Vec<Tier>,

    #[serde(default)]
    configurations: Vec<Configuration>,

    #[serde(default)]
    node_selector: BTreeMap<String, String>,
}

/// Parse and validate a policy document.
///
/// An empty document yields an empty policy. Capability flags are resolved
/// through `defaults` before validation runs.
pub fn parse_policy(text: &str, defaults: &PluginDefaults) -> Result<Policy, PolicyError> {
    let document = if text.trim().is_empty() {
        PolicyDocument::default()
    } else {
        serde_yaml::from_str::<Option<PolicyDocument>>(text)?.unwrap_or_default()
    };

    let mut tiers = document.tiers;
    for option in tiers.iter_mut().flat_map(|t| t.plugins.iter_mut()) {
        defaults.apply(option);
    }
    validate_tiers(&tiers)?;

    Ok(Policy {
        actions: parse_actions(&document.actions),
        tiers,
        configurations: document.configurations,
        node_selector: parse_node_selector(&document.node_selector),
    })
}

/// Split a comma-separated action list, trimming and dropping empty entries.
pub fn parse_actions(actions: &str) -> Vec<String> {
    actions
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expand `label -> "v1,v2"` into `{"label:v1", "label:v2"}`.
pub fn parse_node_selector(selector: &BTreeMap<String, String>) -> BTreeSet<String> {
    selector
        .iter()
        .flat_map(|(label, values)| {
            values
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(move |value| format!("{label}:{value}"))
        })
        .collect()
}

/// Reject any tier that enables hierarchical `drf` next to `proportion`.
///
/// One bad tier rejects the whole policy.
pub fn validate_tiers(tiers: &[Tier]) -> Result<(), PolicyError> {
    for (index, tier) in tiers.iter().enumerate() {
        let hierarchical_drf = tier.plugins.iter().any(|p| p.is_hierarchical_drf());
        let proportion = tier.plugins.iter().any(|p| p.name == "proportion");
        if hierarchical_drf && proportion {
            return Err(PolicyError::HierarchyConflict { tier: index });
        }
    }
    Ok(())
}
