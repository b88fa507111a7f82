//! Definition registry — owns every definition, the forwarding index and
//! the container-wide caches.
//!
//! The registry only stores and looks up. The lookup order and instance
//! reuse live in [`Resolution`](crate::resolution::Resolution).

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::cache::ScopeCache;
use crate::definition::{Callback, Definition};
use crate::forward::{ForwardKey, Forwarding, ForwardingIndex};
use crate::key::DefinitionKey;
use crate::scope::Scope;

/// Stores all definitions of a container.
///
/// Guards are never held while user code runs: lookups clone the
/// `Arc<Definition>` out of the map.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    definitions: DashMap<DefinitionKey, Arc<Definition>>,
    forwarding: ForwardingIndex,
    cache: ScopeCache,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            definitions: DashMap::new(),
            forwarding: ForwardingIndex::new(),
            cache: ScopeCache::new(),
        }
    }

    /// Stores `definition`, replacing whatever occupied its key.
    ///
    /// A replaced definition takes its forwarding entries and its cached
    /// instance with it.
    pub fn register(&self, definition: Definition) -> Arc<Definition> {
        let key = definition.key().clone();
        let definition = Arc::new(definition);

        if let Some(previous) = self.definitions.insert(key.clone(), Arc::clone(&definition)) {
            debug!(key = %key, scope = %previous.scope(), "Replacing existing definition");
            for forwarded in previous.forwarded() {
                self.forwarding.remove_if_target(&forwarded, &key);
            }
            self.cache.evict(&key);
        }

        debug!(key = %key, scope = %definition.scope(), "Registered definition");
        definition
    }

    /// Points the forwarding entry `key` at `owner`.
    ///
    /// Ignored when `owner` has since been replaced at its key.
    pub fn add_forwarding(&self, owner: &Arc<Definition>, key: ForwardKey, forwarding: Forwarding) {
        if !self.is_current(owner) {
            warn!(
                forwarded = %key,
                target = %owner.key(),
                "Ignoring forwarding added through a replaced definition"
            );
            return;
        }

        if let Some(previous) = self.forwarding.insert(key.clone(), forwarding) {
            if previous.target() != owner.key() {
                if let Some(previous_owner) = self.definition(previous.target()) {
                    previous_owner.forget_forward(&key);
                }
            }
        }
        owner.record_forward(key);
    }

    /// Sets the post-construction callback of `owner`.
    ///
    /// Ignored when `owner` has since been replaced at its key.
    pub fn set_on_resolved(&self, owner: &Arc<Definition>, callback: Callback) {
        if !self.is_current(owner) {
            warn!(key = %owner.key(), "Ignoring callback set through a replaced definition");
            return;
        }
        owner.set_on_resolved(callback);
    }

    fn is_current(&self, owner: &Arc<Definition>) -> bool {
        self.definition(owner.key())
            .is_some_and(|current| Arc::ptr_eq(&current, owner))
    }

    /// Definition registered at exactly `key`.
    pub fn definition(&self, key: &DefinitionKey) -> Option<Arc<Definition>> {
        self.definitions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Forwarding entry registered at exactly `key`.
    pub fn forwarding(&self, key: &ForwardKey) -> Option<Arc<Forwarding>> {
        self.forwarding.get(key)
    }

    pub fn cache(&self) -> &ScopeCache {
        &self.cache
    }

    /// Argument-less eager singletons, for bootstrapping.
    pub fn eager_singletons(&self) -> Vec<DefinitionKey> {
        self.definitions
            .iter()
            .filter(|entry| entry.scope() == Scope::EagerSingleton && entry.key().arguments().is_unit())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Every registered capability name, direct or forwarded.
    pub fn capability_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .definitions
            .iter()
            .map(|entry| entry.key().type_name())
            .collect();
        names.extend(self.forwarding.capability_names());
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Drops every definition, forwarding entry and cached instance.
    pub fn reset(&self) {
        debug!(
            definitions = self.definitions.len(),
            forwarded = self.forwarding.len(),
            cached = self.cache.live_count(),
            "Resetting registry"
        );
        self.definitions.clear();
        self.forwarding.clear();
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
