//! Container-wide instance caches.
//!
//! Singletons are held strongly, weak singletons through a
//! [`WeakInstance`] whose liveness is checked on every read. Both are keyed
//! by the primary key of the producing definition. Graph-shared instances
//! live in the [`Resolution`](crate::resolution::Resolution) instead.

use dashmap::DashMap;
use tracing::trace;

use crate::instance::{Instance, WeakInstance};
use crate::key::DefinitionKey;
use crate::scope::Scope;

#[derive(Debug, Default)]
pub(crate) struct ScopeCache {
    singletons: DashMap<DefinitionKey, Instance>,
    weak_singletons: DashMap<DefinitionKey, WeakInstance>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached instance for `key`, if `scope` caches and it is still alive.
    pub fn get(&self, key: &DefinitionKey, scope: Scope) -> Option<Instance> {
        match scope {
            Scope::Singleton | Scope::EagerSingleton => {
                self.singletons.get(key).map(|entry| entry.value().clone())
            }
            Scope::WeakSingleton => {
                let alive = self.weak_singletons.get(key).and_then(|entry| entry.value().upgrade());
                if alive.is_none()
                    && self.weak_singletons.remove_if(key, |_, weak| !weak.is_alive()).is_some()
                {
                    trace!(key = %key, "Dropped expired weak singleton");
                }
                alive
            }
            Scope::Unique | Scope::Shared => None,
        }
    }

    /// Stores a freshly constructed instance according to `scope`.
    pub fn store(&self, key: &DefinitionKey, scope: Scope, instance: &Instance) {
        match scope {
            Scope::Singleton | Scope::EagerSingleton => {
                self.singletons.insert(key.clone(), instance.clone());
            }
            Scope::WeakSingleton => {
                self.purge_expired();
                self.weak_singletons.insert(key.clone(), instance.downgrade());
            }
            Scope::Unique | Scope::Shared => {}
        }
    }

    /// Drops weak singletons whose instance is gone, whatever their key.
    pub fn purge_expired(&self) {
        let before = self.weak_singletons.len();
        self.weak_singletons.retain(|_, weak| weak.is_alive());
        let purged = before.saturating_sub(self.weak_singletons.len());
        if purged > 0 {
            trace!(purged, "Dropped expired weak singletons");
        }
    }

    /// Drops whatever is cached for `key`.
    pub fn evict(&self, key: &DefinitionKey) {
        self.singletons.remove(key);
        self.weak_singletons.remove(key);
    }

    pub fn clear(&self) {
        self.singletons.clear();
        self.weak_singletons.clear();
    }

    /// Number of cached instances that are still alive.
    pub fn live_count(&self) -> usize {
        self.singletons.len()
            + self
                .weak_singletons
                .iter()
                .filter(|entry| entry.value().is_alive())
                .count()
    }
}
