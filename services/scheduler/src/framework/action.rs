//! Scheduling actions and their registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::session::Session;

/// One step of a scheduling cycle.
pub trait Action: Send + Sync {
    /// Name the policy refers to this action by.
    fn name(&self) -> &str;

    /// Run against an open session.
    fn execute(&self, session: &Session);
}

/// Immutable name-to-action lookup, built before the scheduler starts.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` under its own name, replacing any previous entry.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_string(), action);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, action: Arc<dyn Action>) -> Self {
        self.register(action);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Action for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn execute(&self, _session: &Session) {}
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ActionRegistry::new()
            .with(Arc::new(Named("enqueue")))
            .with(Arc::new(Named("allocate")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("allocate").unwrap().name(), "allocate");
        assert!(registry.get("preempt").is_none());
        assert_eq!(registry.names(), vec!["allocate", "enqueue"]);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(Named("allocate")));
        registry.register(Arc::new(Named("allocate")));

        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}
