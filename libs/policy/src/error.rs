//! Error types for policy parsing.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur when turning a document into a [`crate::Policy`].
#[derive(Debug, Error, Clone)]
pub enum PolicyError {
    /// The document is not valid YAML or does not match the policy shape.
    #[error("malformed policy document: {0}")]
    Malformed(#[source] Arc<serde_yaml::Error>),

    /// A tier enables hierarchical drf alongside proportion.
    #[error("tier {tier}: proportion and drf with hierarchy enabled conflict")]
    HierarchyConflict { tier: usize },
}

impl From<serde_yaml::Error> for PolicyError {
    fn from(err: serde_yaml::Error) -> Self {
        PolicyError::Malformed(Arc::new(err))
    }
}
