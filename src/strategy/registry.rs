//! Strategy lookup by name and mode.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::Strategy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("no strategy registered for {name} ({mode})")]
    NotSupported { name: String, mode: String },
}

fn registry_key(name: &str, mode: &str) -> String {
    format!("{name}-{mode}")
}

/// Strategies keyed by `"{name}-{mode}"`.
#[derive(Default)]
pub struct Registry {
    strategies: HashMap<String, Arc<dyn Strategy>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `strategy`, returning the one it replaced, if any.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) -> Option<Arc<dyn Strategy>> {
        let key = strategy.key();
        let previous = self.strategies.insert(key.clone(), strategy);
        if previous.is_some() {
            log::warn!("[registry] replaced strategy {key}");
        }
        previous
    }

    pub fn get(&self, name: &str, mode: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.get(&registry_key(name, mode)).cloned()
    }

    pub fn contains(&self, name: &str, mode: &str) -> bool {
        self.strategies.contains_key(&registry_key(name, mode))
    }

    /// Registered keys, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.strategies.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Resolves the strategy a run was configured for.
pub struct Selector {
    registry: Registry,
}

impl Selector {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn select(&self, name: &str, mode: &str) -> Result<Arc<dyn Strategy>, SelectError> {
        match self.registry.get(name, mode) {
            Some(strategy) => {
                log::info!("[selector] selected strategy {}", strategy.key());
                Ok(strategy)
            }
            None => Err(SelectError::NotSupported {
                name: name.to_string(),
                mode: mode.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ScriptedStrategy;
    use crate::test_support::NoopPlaybook;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(Arc::new(ScriptedStrategy::new(NoopPlaybook::new("sheep", "hard"))));
        registry.register(Arc::new(ScriptedStrategy::new(NoopPlaybook::new("sheep", "normal"))));
        registry.register(Arc::new(ScriptedStrategy::new(NoopPlaybook::new("cave", "normal"))));
        registry
    }

    #[test]
    fn lists_keys_in_order() {
        assert_eq!(
            registry().list(),
            vec!["cave-normal", "sheep-hard", "sheep-normal"]
        );
    }

    #[test]
    fn re_registering_replaces() {
        let mut registry = registry();
        let previous =
            registry.register(Arc::new(ScriptedStrategy::new(NoopPlaybook::new("cave", "normal"))));
        assert!(previous.is_some());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn selector_reports_unknown_keys() {
        let selector = Selector::new(registry());
        let strategy = selector.select("sheep", "hard").unwrap();
        assert_eq!(strategy.mode(), "hard");

        let err = selector.select("sheep", "nightmare").err().unwrap();
        assert_eq!(
            err,
            SelectError::NotSupported {
                name: "sheep".into(),
                mode: "nightmare".into()
            }
        );
    }
}
