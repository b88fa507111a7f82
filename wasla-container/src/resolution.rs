//! Resolution context — one top-level resolve call and everything it
//! transitively triggers.
//!
//! The context owns the in-flight stack and the graph cache. Factories and
//! callbacks receive it as `&mut Resolution` and resolve their own
//! dependencies through it, which is what lets graph-shared instances and
//! cycles through callbacks work.
//!
//! # Lookup order
//! For a request `(capability, arguments, tag)`:
//! 1. the definition registered at exactly that key
//! 2. forwarding registered for the exact tag (tagged requests only)
//! 3. the untagged definition of the capability (tagged requests only)
//! 4. untagged forwarding
//!
//! A direct definition therefore always beats forwarding for the same tag,
//! and within forwarding the exact tag beats the untagged entry.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use wasla_support::rendering::suggest_similar;

use crate::container::ContainerConfig;
use crate::definition::Definition;
use crate::error::{
    CircularDependencyError, InvalidTypeError, NotRegisteredError, ResolutionStep, Result,
    WaslaError,
};
use crate::forward::{ForwardKey, Forwarding};
use crate::instance::Instance;
use crate::key::{DefinitionKey, Tag};
use crate::registry::Registry;
use crate::scope::Scope;

/// An in-flight construction.
#[derive(Debug)]
struct Frame {
    /// Owning definition's key under the requested tag
    key: DefinitionKey,
    scope: Scope,
    forwarded_from: Option<DefinitionKey>,
    /// Set as soon as the factory returns, before callbacks run
    instance: Option<Instance>,
}

impl Frame {
    fn step(&self) -> ResolutionStep {
        ResolutionStep {
            key: self.key.clone(),
            scope: self.scope,
            forwarded_from: self.forwarded_from.clone(),
        }
    }
}

/// What a request was matched to.
enum Selected {
    Direct(Arc<Definition>),
    Forwarded(Arc<Definition>, Arc<Forwarding>),
}

/// State of one top-level resolve call.
///
/// Created by the resolve methods of
/// [`Container`](crate::container::Container) and dropped when they return,
/// taking every graph-shared instance with it.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use wasla_container::prelude::*;
///
/// struct Config { url: String }
/// struct Database { url: String }
///
/// let container = Container::new();
/// container.register::<Config>(Scope::Singleton, |_| {
///     Ok(Arc::new(Config { url: "postgres://localhost".into() }))
/// });
/// container.register::<Database>(Scope::Shared, |resolution| {
///     let config: Arc<Config> = resolution.resolve()?;
///     Ok(Arc::new(Database { url: config.url.clone() }))
/// });
///
/// let db: Arc<Database> = container.resolve().unwrap();
/// assert_eq!(db.url, "postgres://localhost");
/// ```
pub struct Resolution<'c> {
    registry: &'c Registry,
    config: &'c ContainerConfig,
    stack: Vec<Frame>,
    shared: HashMap<DefinitionKey, Instance>,
}

impl<'c> Resolution<'c> {
    pub(crate) fn new(registry: &'c Registry, config: &'c ContainerConfig) -> Self {
        Self {
            registry,
            config,
            stack: Vec::new(),
            shared: HashMap::new(),
        }
    }

    // ── Typed resolution ──

    /// Resolves capability `T` with no tag.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        self.resolve_typed::<T, ()>(DefinitionKey::of::<T>(), ())
    }

    /// Resolves capability `T` under `tag`, falling back to untagged
    /// definitions and forwarding.
    pub fn resolve_tagged<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        tag: impl Into<Tag>,
    ) -> Result<Arc<T>> {
        self.resolve_typed::<T, ()>(DefinitionKey::tagged::<T>(tag), ())
    }

    /// Resolves `T`, or `None` if nothing is registered for it.
    ///
    /// Only a [`WaslaError::NotRegistered`] about `T` itself becomes `None`.
    /// A missing dependency deeper in the graph is still an error.
    pub fn resolve_optional<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Option<Arc<T>>> {
        let key = DefinitionKey::of::<T>();
        let result = self.resolve_typed::<T, ()>(key.clone(), ());
        optional(&key, result)
    }

    /// Resolves `T` under `tag`, or `None` if nothing is registered for it.
    pub fn resolve_optional_tagged<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        tag: impl Into<Tag>,
    ) -> Result<Option<Arc<T>>> {
        let key = DefinitionKey::tagged::<T>(tag);
        let result = self.resolve_typed::<T, ()>(key.clone(), ());
        optional(&key, result)
    }

    /// Resolves `T` from a definition whose factory takes `arguments`.
    pub fn resolve_with<T, A>(&mut self, tag: Option<Tag>, arguments: A) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        A: 'static,
    {
        self.resolve_typed::<T, A>(DefinitionKey::with_arguments::<T, A>(tag), arguments)
    }

    /// Resolves an argument-less key without a static type.
    ///
    /// Use [`extract`] or [`Instance::downcast`] to get the typed handle.
    pub fn resolve_key(&mut self, key: &DefinitionKey) -> Result<Instance> {
        self.resolve_instance(key, Box::new(()))
    }

    // ── Introspection ──

    /// Tag requested for the instance currently being constructed.
    pub fn tag(&self) -> Option<&Tag> {
        self.stack.last().and_then(|frame| frame.key.tag())
    }

    /// Number of constructions in flight.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// In-flight constructions, outermost first.
    pub fn path(&self) -> Vec<ResolutionStep> {
        self.stack.iter().map(Frame::step).collect()
    }

    // ── Internal ──

    fn resolve_typed<T, A>(&mut self, key: DefinitionKey, arguments: A) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        A: 'static,
    {
        let instance = self.resolve_instance(&key, Box::new(arguments))?;
        extract::<T>(&key, &instance)
    }

    fn resolve_instance(&mut self, requested: &DefinitionKey, arguments: Box<dyn Any>) -> Result<Instance> {
        let limit = self.config.max_depth;
        if self.stack.len() >= limit {
            warn!(key = %requested, limit, "Resolution too deep");
            return Err(WaslaError::ResolutionTooDeep {
                key: requested.clone(),
                limit,
                chain: self.path(),
            });
        }

        match self.select(requested)? {
            Selected::Direct(definition) => self.instantiate(&definition, requested, None, arguments),
            Selected::Forwarded(definition, forwarding) => {
                let instance = self.instantiate(&definition, requested, Some(&*forwarding), arguments)?;
                forwarding.cast(requested, &instance)
            }
        }
    }

    fn select(&self, requested: &DefinitionKey) -> Result<Selected> {
        if let Some(definition) = self.registry.definition(requested) {
            trace!(key = %requested, "Direct definition");
            return Ok(Selected::Direct(definition));
        }

        if let Some(tag) = requested.tag() {
            if let Some(selected) = self.forwarded(requested, Some(tag)) {
                return Ok(selected);
            }

            let untagged = requested.untagged();
            if let Some(definition) = self.registry.definition(&untagged) {
                trace!(key = %requested, fallback = %untagged, "Falling back to untagged definition");
                return Ok(Selected::Direct(definition));
            }
        }

        if let Some(selected) = self.forwarded(requested, None) {
            return Ok(selected);
        }

        Err(self.not_registered(requested))
    }

    fn forwarded(&self, requested: &DefinitionKey, tag: Option<&Tag>) -> Option<Selected> {
        let forwarding = self.registry.forwarding(&ForwardKey::for_request(requested, tag))?;
        let Some(definition) = self.registry.definition(forwarding.target()) else {
            trace!(key = %requested, target = %forwarding.target(), "Forwarding target is gone");
            return None;
        };
        trace!(key = %requested, target = %definition.key(), "Forwarding");
        Some(Selected::Forwarded(definition, forwarding))
    }

    /// Returns a reusable instance or constructs a new one.
    ///
    /// Always returns the instance as the definition produced it; the
    /// caller converts it for forwarded requests.
    fn instantiate(
        &mut self,
        definition: &Arc<Definition>,
        requested: &DefinitionKey,
        forwarding: Option<&Forwarding>,
        arguments: Box<dyn Any>,
    ) -> Result<Instance> {
        let scope = definition.scope();
        let owner = definition.key();

        if let Some(instance) = self.registry.cache().get(owner, scope) {
            trace!(key = %owner, scope = %scope, "Reusing cached instance");
            return Ok(instance);
        }

        let graph_key = owner.retagged(requested.tag().cloned());
        if scope.is_graph_shared() {
            if let Some(instance) = self.shared.get(&graph_key) {
                trace!(key = %graph_key, "Reusing graph-shared instance");
                return Ok(instance.clone());
            }
        }

        if let Some(position) = self.stack.iter().position(|frame| frame.key == graph_key) {
            if let Some(ref instance) = self.stack[position].instance {
                trace!(key = %graph_key, "Reusing in-flight instance");
                return Ok(instance.clone());
            }

            let mut chain: Vec<ResolutionStep> = self.stack[position..].iter().map(Frame::step).collect();
            chain.push(ResolutionStep {
                key: graph_key.clone(),
                scope,
                forwarded_from: forwarding.map(|_| requested.clone()),
            });
            warn!(key = %graph_key, depth = self.stack.len(), "Circular dependency in factory");
            return Err(WaslaError::CircularDependency(CircularDependencyError { chain }));
        }

        self.stack.push(Frame {
            key: graph_key.clone(),
            scope,
            forwarded_from: forwarding.map(|_| requested.clone()),
            instance: None,
        });
        debug!(key = %graph_key, scope = %scope, depth = self.stack.len(), "Constructing instance");

        let result = self.construct(definition, &graph_key, requested, forwarding, arguments);
        self.stack.pop();

        if result.is_err() {
            self.registry.cache().evict(owner);
            self.shared.remove(&graph_key);
        }
        result
    }

    /// Runs the factory, caches the instance, then runs the callbacks.
    fn construct(
        &mut self,
        definition: &Definition,
        graph_key: &DefinitionKey,
        requested: &DefinitionKey,
        forwarding: Option<&Forwarding>,
        arguments: Box<dyn Any>,
    ) -> Result<Instance> {
        let scope = definition.scope();
        let instance = definition
            .produce(self, arguments)
            .map_err(|e| e.attach(requested))?;

        if let Some(frame) = self.stack.last_mut() {
            frame.instance = Some(instance.clone());
        }
        self.registry.cache().store(definition.key(), scope, &instance);
        if scope.is_graph_shared() {
            self.shared.insert(graph_key.clone(), instance.clone());
        }

        if let Some(callback) = definition.on_resolved() {
            trace!(key = %graph_key, "Running on_resolved");
            callback(self, &instance).map_err(|e| e.attach(requested))?;
        }

        if let Some(forwarding) = forwarding {
            if let Some(callback) = forwarding.on_resolved() {
                trace!(key = %requested, "Running forwarded on_resolved");
                let forwarded = forwarding.cast(requested, &instance)?;
                callback(self, &forwarded).map_err(|e| e.attach(requested))?;
            }
        }

        Ok(instance)
    }

    fn not_registered(&self, requested: &DefinitionKey) -> WaslaError {
        let max = self.config.max_suggestions;
        let suggestions = if max == 0 {
            Vec::new()
        } else {
            let names = self.registry.capability_names();
            suggest_similar(requested.type_name(), &names, max)
        };

        WaslaError::NotRegistered(NotRegisteredError {
            requested: requested.clone(),
            required_by: self.stack.last().map(|frame| frame.key.clone()),
            suggestions,
        })
    }
}

impl std::fmt::Debug for Resolution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("stack", &self.stack)
            .field("shared", &self.shared.len())
            .finish()
    }
}

/// Extracts `Arc<T>` from an untyped instance resolved for `key`.
///
/// # Errors
/// [`WaslaError::InvalidType`] when the instance was not erased from `Arc<T>`.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use wasla_container::instance::Instance;
/// use wasla_container::key::DefinitionKey;
/// use wasla_container::resolution::extract;
///
/// let key = DefinitionKey::of::<u32>();
/// let instance = Instance::new(Arc::new(7u32));
/// assert_eq!(*extract::<u32>(&key, &instance).unwrap(), 7);
/// assert!(extract::<u64>(&key, &instance).is_err());
/// ```
pub fn extract<T: ?Sized + Send + Sync + 'static>(key: &DefinitionKey, instance: &Instance) -> Result<Arc<T>> {
    instance.downcast::<T>().ok_or_else(|| {
        WaslaError::InvalidType(InvalidTypeError {
            expected: type_name::<T>(),
            produced: instance.type_name(),
            key: key.clone(),
        })
    })
}

/// Maps "nothing registered for `key`" to `None`.
fn optional<T: ?Sized>(key: &DefinitionKey, result: Result<Arc<T>>) -> Result<Option<Arc<T>>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(WaslaError::NotRegistered(e)) if &e.requested == key => {
            trace!(key = %key, "Optional dependency absent");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
