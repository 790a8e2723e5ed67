use super::chain::RuleChain;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Named chains, replaceable while evaluations are in flight.
///
/// Readers clone the `Arc` out and release the lock before running; a
/// publish swaps the pointer, so a running evaluation finishes on the chain
/// it started with.
#[derive(Debug, Default)]
pub struct ChainRegistry {
    chains: RwLock<HashMap<String, Arc<RuleChain>>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<RuleChain>> {
        self.chains.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// Install `chain` under its own name, returning the chain it replaced.
    pub fn publish(&self, chain: RuleChain) -> Option<Arc<RuleChain>> {
        let name = chain.name().to_string();
        let replaced = self.chains.write().unwrap_or_else(PoisonError::into_inner).insert(name.clone(), Arc::new(chain));
        tracing::debug!(chain = %name, replaced = replaced.is_some(), "published chain");
        replaced
    }

    pub fn remove(&self, name: &str) -> Option<Arc<RuleChain>> {
        self.chains.write().unwrap_or_else(PoisonError::into_inner).remove(name)
    }

    /// Drop every chain whose name fails `keep`, returning the dropped names.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let mut chains = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        let stale: Vec<String> = chains.keys().filter(|name| !keep(name)).cloned().collect();
        for name in &stale {
            chains.remove(name);
        }
        stale
    }

    /// Chain names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.chains.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.chains.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
