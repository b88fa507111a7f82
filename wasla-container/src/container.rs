//! # The Container — entry point of Wasla
//!
//! Owns the registry and hands out a fresh
//! [`Resolution`](crate::resolution::Resolution) for every top-level
//! resolve call.
//!
//! # Architecture
//! ```text
//! ContainerBuilder  ──build()──>  Container ──register*()──> DefinitionHandle
//!                                    │                          │
//!                                 resolve*()              implements*()
//!                                    │                    on_resolved()
//!                                    ▼
//!                                Resolution  (one per top-level call)
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wasla_container::prelude::*;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str);
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) { println!("{msg}"); }
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! let container = Container::new();
//! container
//!     .register::<ConsoleLogger>(Scope::Singleton, |_| Ok(Arc::new(ConsoleLogger)))
//!     .implements::<dyn Logger>(|l| l as Arc<dyn Logger>);
//! container.register::<UserService>(Scope::Unique, |resolution| {
//!     let logger: Arc<dyn Logger> = resolution.resolve()?;
//!     Ok(Arc::new(UserService { logger }))
//! });
//!
//! let service: Arc<UserService> = container.resolve().expect("Failed to resolve");
//! service.logger.log("ready");
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::definition::{DefinitionHandle, Definition, erase_factory};
use crate::error::Result;
use crate::instance::Instance;
use crate::key::{DefinitionKey, Tag};
use crate::provider::Provider;
use crate::registry::Registry;
use crate::resolution::Resolution;
use crate::scope::Scope;

// ═══════════════════════════════════════════
// ContainerConfig
// ═══════════════════════════════════════════

/// Resolution limits of a [`Container`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Maximum number of constructions in flight at once
    pub max_depth: usize,
    /// Number of "did you mean" suggestions on a missing key (0 disables)
    pub max_suggestions: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_depth: 128,
            max_suggestions: 3,
        }
    }
}

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Configures a [`Container`] before it is created.
///
/// # Examples
/// ```rust
/// use wasla_container::prelude::*;
///
/// let container = Container::builder()
///     .max_depth(32)
///     .max_suggestions(0)
///     .build();
/// assert_eq!(container.config().max_depth, 32);
/// ```
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Limits how deep a resolution graph may grow.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Limits the suggestions attached to "not registered" errors.
    pub fn max_suggestions(mut self, count: usize) -> Self {
        self.config.max_suggestions = count;
        self
    }

    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Container {
        info!(
            max_depth = self.config.max_depth,
            max_suggestions = self.config.max_suggestions,
            "Building container"
        );
        Container {
            registry: Registry::new(),
            config: self.config,
        }
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Dependency container with tags, scopes and type forwarding.
///
/// Registration and resolution both take `&self`; the container can be
/// shared between threads. Registration is not atomic against concurrent
/// resolves, and two threads resolving an uncached singleton at the same
/// time may both construct it. Callers that need exactly one construction
/// serialize first use, or call [`bootstrap`](Container::bootstrap).
pub struct Container {
    registry: Registry,
    config: ContainerConfig,
}

impl Container {
    /// Container with default limits.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    // ── Registration ──

    /// Registers an argument-less factory for `T`.
    ///
    /// Replaces whatever was registered for `T` before.
    pub fn register<T: ?Sized + Send + Sync + 'static>(
        &self,
        scope: Scope,
        factory: impl Fn(&mut Resolution<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    ) -> DefinitionHandle<'_, T> {
        self.register_with::<T, (), _>(None, scope, move |resolution, ()| factory(resolution))
    }

    /// Registers an argument-less factory for `T` under `tag`.
    pub fn register_tagged<T: ?Sized + Send + Sync + 'static>(
        &self,
        tag: impl Into<Tag>,
        scope: Scope,
        factory: impl Fn(&mut Resolution<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    ) -> DefinitionHandle<'_, T> {
        self.register_with::<T, (), _>(Some(tag.into()), scope, move |resolution, ()| factory(resolution))
    }

    /// Registers a factory for `T` that takes runtime arguments of type `A`.
    ///
    /// Resolve it with [`resolve_with`](Container::resolve_with) and the
    /// same `A`. Definitions with different argument types never collide.
    pub fn register_with<T, A, F>(&self, tag: Option<Tag>, scope: Scope, factory: F) -> DefinitionHandle<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        A: 'static,
        F: Fn(&mut Resolution<'_>, A) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        let key = DefinitionKey::with_arguments::<T, A>(tag);
        let definition = Definition::new(key, scope, type_name::<T>(), erase_factory::<T, A, F>(factory));
        DefinitionHandle::new(&self.registry, self.registry.register(definition))
    }

    /// Registers an existing value as a singleton.
    pub fn register_instance<T: ?Sized + Send + Sync + 'static>(&self, instance: Arc<T>) -> DefinitionHandle<'_, T> {
        self.register::<T>(Scope::Singleton, move |_| Ok(Arc::clone(&instance)))
    }

    /// Registers an existing value as a singleton under `tag`.
    pub fn register_instance_tagged<T: ?Sized + Send + Sync + 'static>(
        &self,
        tag: impl Into<Tag>,
        instance: Arc<T>,
    ) -> DefinitionHandle<'_, T> {
        self.register_tagged::<T>(tag, Scope::Singleton, move |_| Ok(Arc::clone(&instance)))
    }

    /// Lets `provider` register its definitions.
    pub fn add_provider(&self, provider: &dyn Provider) -> &Self {
        debug!(provider = provider.name(), "Adding provider");
        provider.register(self);
        self
    }

    // ── Resolution ──

    /// Resolves capability `T`.
    ///
    /// ```rust,ignore
    /// let db: Arc<dyn Database> = container.resolve()?;
    /// ```
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.run(&DefinitionKey::of::<T>(), |resolution| resolution.resolve::<T>())
    }

    /// Resolves capability `T` under `tag`.
    pub fn resolve_tagged<T: ?Sized + Send + Sync + 'static>(&self, tag: impl Into<Tag>) -> Result<Arc<T>> {
        let tag = tag.into();
        let key = DefinitionKey::tagged::<T>(tag.clone());
        self.run(&key, |resolution| resolution.resolve_tagged::<T>(tag))
    }

    /// Resolves `T`, or `None` if nothing is registered for it.
    pub fn resolve_optional<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        self.run(&DefinitionKey::of::<T>(), |resolution| resolution.resolve_optional::<T>())
    }

    /// Resolves `T` under `tag`, or `None` if nothing is registered for it.
    pub fn resolve_optional_tagged<T: ?Sized + Send + Sync + 'static>(
        &self,
        tag: impl Into<Tag>,
    ) -> Result<Option<Arc<T>>> {
        let tag = tag.into();
        let key = DefinitionKey::tagged::<T>(tag.clone());
        self.run(&key, |resolution| resolution.resolve_optional_tagged::<T>(tag))
    }

    /// Resolves `T` from a definition registered with
    /// [`register_with`](Container::register_with).
    pub fn resolve_with<T, A>(&self, tag: Option<Tag>, arguments: A) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        A: 'static,
    {
        let key = DefinitionKey::with_arguments::<T, A>(tag.clone());
        self.run(&key, |resolution| resolution.resolve_with::<T, A>(tag, arguments))
    }

    /// Resolves an argument-less key without a static type.
    pub fn resolve_key(&self, key: &DefinitionKey) -> Result<Instance> {
        self.run(key, |resolution| resolution.resolve_key(key))
    }

    /// Constructs every argument-less eager singleton.
    ///
    /// # Errors
    /// The first construction failure.
    pub fn bootstrap(&self) -> Result<()> {
        let eager = self.registry.eager_singletons();
        debug!(count = eager.len(), "Bootstrapping eager singletons");
        for key in &eager {
            self.resolve_key(key)?;
        }
        Ok(())
    }

    /// Drops every definition, forwarding entry and cached instance.
    pub fn reset(&self) {
        self.registry.reset();
    }

    /// Number of registered definitions, not counting forwarding.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    // ── Internal ──

    pub(crate) fn resolution(&self) -> Resolution<'_> {
        Resolution::new(&self.registry, &self.config)
    }

    /// Runs one top-level resolve call in a fresh context.
    #[instrument(level = "debug", skip_all, fields(key = %key))]
    fn run<R>(&self, key: &DefinitionKey, resolve: impl FnOnce(&mut Resolution<'_>) -> Result<R>) -> Result<R> {
        let mut resolution = self.resolution();
        resolve(&mut resolution)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, ContainerConfig};
    pub use crate::definition::DefinitionHandle;
    pub use crate::error::{Result, WaslaError};
    pub use crate::instance::Instance;
    pub use crate::key::{DefinitionKey, Tag};
    pub use crate::provider::Provider;
    pub use crate::resolution::Resolution;
    pub use crate::scope::Scope;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
