//! Versioned index of loaded types.
//!
//! Entries map `(qualified name, generation)` to a weak handle. The
//! registry never keeps a type alive: once every holder drops its handle
//! the entry resolves to nothing and [`TypeRegistry::prune`] removes it.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use super::LoadedType;

#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: RwLock<BTreeMap<(String, u64), Weak<LoadedType>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, handle: &Arc<LoadedType>) {
        let key = (handle.qualified_name().to_string(), handle.generation());
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::downgrade(handle));
    }

    /// The handle of one generation, if anyone still holds it.
    pub fn resolve(&self, qualified_name: &str, generation: u64) -> Option<Arc<LoadedType>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(qualified_name.to_string(), generation))
            .and_then(Weak::upgrade)
    }

    /// The newest live generation of a type.
    pub fn latest(&self, qualified_name: &str) -> Option<Arc<LoadedType>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .range((qualified_name.to_string(), 0)..=(qualified_name.to_string(), u64::MAX))
            .rev()
            .find_map(|(_, weak)| weak.upgrade())
    }

    /// Generations of a type still held somewhere, oldest first.
    pub fn live_generations(&self, qualified_name: &str) -> Vec<u64> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .range((qualified_name.to_string(), 0)..=(qualified_name.to_string(), u64::MAX))
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|((_, generation), _)| *generation)
            .collect()
    }

    /// Drop entries whose handles are gone; returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, weak| weak.strong_count() > 0);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
