//! Type forwarding index.
//!
//! A definition registered for one capability can also satisfy others.
//! The [`ForwardingIndex`] maps each forwarded `(capability, tag)` pair back
//! to the primary key of the definition that serves it, so a request for
//! the forwarded capability reuses the same recipe and the same scoped
//! instance.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::definition::Callback;
use crate::error::{InvalidTypeError, Result, WaslaError};
use crate::instance::Instance;
use crate::key::{DefinitionKey, Tag, TypeIdentity};

/// Converts an instance of the owning definition into the forwarded
/// capability. Returns `None` if the instance does not provide it.
pub(crate) type ForwardCast = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// Address of a forwarding entry.
///
/// The argument shape is always the owning definition's, so forwarded
/// requests with runtime arguments reach a factory that accepts them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForwardKey {
    capability: TypeIdentity,
    arguments: TypeIdentity,
    tag: Option<Tag>,
}

impl ForwardKey {
    pub fn new(capability: TypeIdentity, arguments: TypeIdentity, tag: Option<Tag>) -> Self {
        Self { capability, arguments, tag }
    }

    /// Forwarding address a request for `key` would look up under `tag`.
    pub(crate) fn for_request(key: &DefinitionKey, tag: Option<&Tag>) -> Self {
        Self::new(key.capability(), key.arguments(), tag.cloned())
    }

    #[inline]
    pub fn capability(&self) -> TypeIdentity {
        self.capability
    }

    #[inline]
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }
}

impl fmt::Display for ForwardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = DefinitionKey::new(self.capability, self.arguments, self.tag.clone());
        fmt::Display::fmt(&key, f)
    }
}

/// One forwarding entry: where to redirect and how to convert.
pub(crate) struct Forwarding {
    target: DefinitionKey,
    capability: TypeIdentity,
    cast: ForwardCast,
    on_resolved: Option<Callback>,
}

impl Forwarding {
    pub fn new(
        target: DefinitionKey,
        capability: TypeIdentity,
        cast: ForwardCast,
        on_resolved: Option<Callback>,
    ) -> Self {
        Self { target, capability, cast, on_resolved }
    }

    /// Primary key of the owning definition.
    #[inline]
    pub fn target(&self) -> &DefinitionKey {
        &self.target
    }

    #[inline]
    pub fn on_resolved(&self) -> Option<&Callback> {
        self.on_resolved.as_ref()
    }

    /// Converts an instance of the owning definition for a request of `requested`.
    ///
    /// # Errors
    /// [`WaslaError::InvalidType`] when the instance does not provide the
    /// forwarded capability.
    pub fn cast(&self, requested: &DefinitionKey, instance: &Instance) -> Result<Instance> {
        (self.cast)(instance).ok_or_else(|| {
            WaslaError::InvalidType(InvalidTypeError {
                expected: self.capability.name(),
                produced: instance.type_name(),
                key: requested.clone(),
            })
        })
    }
}

impl fmt::Debug for Forwarding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forwarding")
            .field("capability", &self.capability)
            .field("target", &self.target)
            .field("has_callback", &self.on_resolved.is_some())
            .finish()
    }
}

/// Maps forwarded `(capability, tag)` pairs to owning definitions.
///
/// At most one entry exists per pair; the last registration wins.
#[derive(Debug, Default)]
pub(crate) struct ForwardingIndex {
    entries: DashMap<ForwardKey, Arc<Forwarding>>,
}

impl ForwardingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the entry at `key`, returning the previous one.
    pub fn insert(&self, key: ForwardKey, forwarding: Forwarding) -> Option<Arc<Forwarding>> {
        debug!(forwarded = %key, target = %forwarding.target, "Registered forwarding");
        let previous = self.entries.insert(key.clone(), Arc::new(forwarding));
        if let Some(ref prev) = previous {
            debug!(forwarded = %key, previous = %prev.target, "Forwarding overwritten");
        }
        previous
    }

    /// Entry registered for exactly `key`.
    pub fn get(&self, key: &ForwardKey) -> Option<Arc<Forwarding>> {
        let found = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        if let Some(ref forwarding) = found {
            trace!(forwarded = %key, target = %forwarding.target, "Forwarding hit");
        }
        found
    }

    /// Removes the entry at `key` if it still points at `target`.
    pub fn remove_if_target(&self, key: &ForwardKey, target: &DefinitionKey) -> bool {
        self.entries
            .remove_if(key, |_, forwarding| &forwarding.target == target)
            .is_some()
    }

    /// Forwarded capability names, for suggestions.
    pub fn capability_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.key().capability.name()).collect()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
