//! Definitions — registered construction recipes.
//!
//! A [`Definition`] pairs a factory with a [`Scope`], an optional
//! post-construction callback and the set of capabilities it is forwarded
//! as. Callers never touch definitions directly: registration returns a
//! [`DefinitionHandle`] that adds forwarding and callbacks later.

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{InvalidTypeError, Result, WaslaError};
use crate::forward::{ForwardCast, ForwardKey, Forwarding};
use crate::instance::Instance;
use crate::key::{DefinitionKey, Tag, TypeIdentity};
use crate::registry::Registry;
use crate::resolution::Resolution;
use crate::scope::Scope;

/// Type-erased factory.
///
/// Receives the active [`Resolution`] (to resolve its own dependencies)
/// and the boxed runtime arguments, and returns the erased instance.
pub(crate) type Factory =
    Arc<dyn Fn(&mut Resolution<'_>, Box<dyn Any>) -> Result<Instance> + Send + Sync>;

/// Type-erased post-construction callback.
pub(crate) type Callback = Arc<dyn Fn(&mut Resolution<'_>, &Instance) -> Result<()> + Send + Sync>;

/// A registered recipe.
pub(crate) struct Definition {
    key: DefinitionKey,
    scope: Scope,
    produces: &'static str,
    factory: Factory,
    on_resolved: RwLock<Option<Callback>>,
    forwarded: Mutex<Vec<ForwardKey>>,
}

impl Definition {
    pub fn new(key: DefinitionKey, scope: Scope, produces: &'static str, factory: Factory) -> Self {
        Self {
            key,
            scope,
            produces,
            factory,
            on_resolved: RwLock::new(None),
            forwarded: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn key(&self) -> &DefinitionKey {
        &self.key
    }

    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Runs the factory.
    pub fn produce(&self, resolution: &mut Resolution<'_>, arguments: Box<dyn Any>) -> Result<Instance> {
        (self.factory)(resolution, arguments)
    }

    /// Current post-construction callback, cloned out of the lock.
    pub fn on_resolved(&self) -> Option<Callback> {
        self.on_resolved.read().clone()
    }

    pub fn set_on_resolved(&self, callback: Callback) {
        *self.on_resolved.write() = Some(callback);
    }

    pub fn forwarded(&self) -> Vec<ForwardKey> {
        self.forwarded.lock().clone()
    }

    pub fn record_forward(&self, key: ForwardKey) {
        let mut forwarded = self.forwarded.lock();
        if !forwarded.contains(&key) {
            forwarded.push(key);
        }
    }

    pub fn forget_forward(&self, key: &ForwardKey) {
        self.forwarded.lock().retain(|k| k != key);
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("produces", &self.produces)
            .field("forwarded", &*self.forwarded.lock())
            .field("has_callback", &self.on_resolved.read().is_some())
            .finish()
    }
}

/// Erases a typed factory taking arguments of type `A`.
pub(crate) fn erase_factory<T, A, F>(factory: F) -> Factory
where
    T: ?Sized + Send + Sync + 'static,
    A: 'static,
    F: Fn(&mut Resolution<'_>, A) -> Result<Arc<T>> + Send + Sync + 'static,
{
    Arc::new(move |resolution, arguments| {
        let arguments = arguments.downcast::<A>().map_err(|_| {
            WaslaError::custom(format!("expected arguments of type {}", type_name::<A>()))
        })?;
        factory(resolution, *arguments).map(Instance::new)
    })
}

/// Erases a typed callback; `key` names the definition in type errors.
fn erase_callback<T, F>(key: DefinitionKey, callback: F) -> Callback
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&mut Resolution<'_>, &Arc<T>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(move |resolution, instance| {
        let value = instance.downcast::<T>().ok_or_else(|| {
            WaslaError::InvalidType(InvalidTypeError {
                expected: type_name::<T>(),
                produced: instance.type_name(),
                key: key.clone(),
            })
        })?;
        callback(resolution, &value)
    })
}

/// Handle to a registered definition.
///
/// Returned by the `register*` methods of
/// [`Container`](crate::container::Container). All methods consume and
/// return the handle so calls chain; clone it to keep a copy.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use wasla_container::prelude::*;
///
/// trait Service: Send + Sync {}
/// trait Forwarded: Send + Sync {}
///
/// struct ServiceImp;
/// impl Service for ServiceImp {}
/// impl Forwarded for ServiceImp {}
///
/// let container = Container::new();
/// container
///     .register::<ServiceImp>(Scope::Shared, |_| Ok(Arc::new(ServiceImp)))
///     .implements::<dyn Service>(|s| s as Arc<dyn Service>)
///     .implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>);
///
/// let service: Arc<dyn Service> = container.resolve().unwrap();
/// let forwarded: Arc<dyn Forwarded> = container.resolve().unwrap();
/// ```
pub struct DefinitionHandle<'c, T: ?Sized> {
    registry: &'c Registry,
    definition: Arc<Definition>,
    _produces: PhantomData<fn() -> Arc<T>>,
}

impl<'c, T: ?Sized + Send + Sync + 'static> DefinitionHandle<'c, T> {
    pub(crate) fn new(registry: &'c Registry, definition: Arc<Definition>) -> Self {
        Self {
            registry,
            definition,
            _produces: PhantomData,
        }
    }

    /// Primary key of the definition.
    pub fn key(&self) -> &DefinitionKey {
        self.definition.key()
    }

    pub fn scope(&self) -> Scope {
        self.definition.scope()
    }

    /// Forwarding entries this definition currently owns.
    pub fn forwarded(&self) -> Vec<ForwardKey> {
        self.definition.forwarded()
    }

    /// Sets the post-construction callback, replacing any previous one.
    ///
    /// The callback runs after the instance has been cached, so it may
    /// resolve dependencies that point back at this instance. Ignored once
    /// the definition has been replaced at its key.
    pub fn on_resolved<F>(self, callback: F) -> Self
    where
        F: Fn(&mut Resolution<'_>, &Arc<T>) -> Result<()> + Send + Sync + 'static,
    {
        let callback = erase_callback::<T, F>(self.key().clone(), callback);
        self.registry.set_on_resolved(&self.definition, callback);
        self
    }

    /// Forwards capability `F` under the definition's own tag.
    ///
    /// `cast` converts the produced instance; with `T` concrete it is
    /// usually just an unsizing cast such as `|s| s as Arc<dyn F>`.
    pub fn implements<F>(self, cast: impl Fn(Arc<T>) -> Arc<F> + Send + Sync + 'static) -> Self
    where
        F: ?Sized + Send + Sync + 'static,
    {
        let tag = self.key().tag().cloned();
        self.forward::<F>(tag, typed_cast(cast), None)
    }

    /// Forwards capability `F` under `tag`.
    pub fn implements_tagged<F>(
        self,
        tag: impl Into<Tag>,
        cast: impl Fn(Arc<T>) -> Arc<F> + Send + Sync + 'static,
    ) -> Self
    where
        F: ?Sized + Send + Sync + 'static,
    {
        self.forward::<F>(Some(tag.into()), typed_cast(cast), None)
    }

    /// Forwards capability `F` with its own post-construction callback.
    ///
    /// When an instance is constructed for a request of `F`, the
    /// definition's callback runs first, then `on_resolved`. A `None` tag
    /// means the definition's own tag.
    pub fn implements_with<F, C>(
        self,
        tag: Option<Tag>,
        cast: impl Fn(Arc<T>) -> Arc<F> + Send + Sync + 'static,
        on_resolved: C,
    ) -> Self
    where
        F: ?Sized + Send + Sync + 'static,
        C: Fn(&mut Resolution<'_>, &Arc<F>) -> Result<()> + Send + Sync + 'static,
    {
        let tag = tag.or_else(|| self.key().tag().cloned());
        let requested = DefinitionKey::new(TypeIdentity::of::<F>(), self.key().arguments(), tag.clone());
        let callback = erase_callback::<F, C>(requested, on_resolved);
        self.forward::<F>(tag, typed_cast(cast), Some(callback))
    }

    fn forward<F>(self, tag: Option<Tag>, cast: ForwardCast, on_resolved: Option<Callback>) -> Self
    where
        F: ?Sized + Send + Sync + 'static,
    {
        let capability = TypeIdentity::of::<F>();
        let key = ForwardKey::new(capability, self.key().arguments(), tag);
        let forwarding = Forwarding::new(self.key().clone(), capability, cast, on_resolved);
        self.registry.add_forwarding(&self.definition, key, forwarding);
        self
    }
}

impl<'c, T: Send + Sync + 'static> DefinitionHandle<'c, T> {
    /// Forwards the concrete type `F`, checked by downcasting at resolve time.
    ///
    /// Resolving `F` fails with
    /// [`WaslaError::InvalidType`](crate::error::WaslaError::InvalidType)
    /// unless `T` and `F` are the same type. A `None` tag means the
    /// definition's own tag.
    pub fn implements_downcast<F>(self, tag: Option<Tag>) -> Self
    where
        F: Send + Sync + 'static,
    {
        let tag = tag.or_else(|| self.key().tag().cloned());
        let cast: ForwardCast = Arc::new(|instance: &Instance| {
            let value: Arc<dyn Any + Send + Sync> = instance.downcast::<T>()?;
            value.downcast::<F>().ok().map(Instance::new)
        });
        self.forward::<F>(tag, cast, None)
    }
}

impl<T: ?Sized> Clone for DefinitionHandle<'_, T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            definition: Arc::clone(&self.definition),
            _produces: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for DefinitionHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DefinitionHandle")
            .field(&*self.definition)
            .finish()
    }
}

fn typed_cast<T, F>(cast: impl Fn(Arc<T>) -> Arc<F> + Send + Sync + 'static) -> ForwardCast
where
    T: ?Sized + Send + Sync + 'static,
    F: ?Sized + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance| instance.downcast::<T>().map(|value| Instance::new(cast(value))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;

    trait Forwarded: Send + Sync {}
    struct ServiceImp;
    impl Forwarded for ServiceImp {}

    #[test]
    fn records_forwarded_keys_once() {
        let container = Container::new();
        let handle = container
            .register::<ServiceImp>(Scope::Shared, |_| Ok(Arc::new(ServiceImp)))
            .implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>)
            .implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>);

        let forwarded = handle.forwarded();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].capability(), TypeIdentity::of::<dyn Forwarded>());
        assert_eq!(forwarded[0].tag(), None);
    }

    #[test]
    fn forwarding_defaults_to_definition_tag() {
        let container = Container::new();
        let handle = container
            .register_tagged::<ServiceImp>("tag", Scope::Unique, |_| Ok(Arc::new(ServiceImp)))
            .implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>)
            .implements_tagged::<dyn Forwarded>("other", |s| s as Arc<dyn Forwarded>);

        let tags: Vec<Option<Tag>> = handle.forwarded().iter().map(|k| k.tag().cloned()).collect();
        assert_eq!(tags, vec![Some(Tag::from("tag")), Some(Tag::from("other"))]);
    }

    #[test]
    fn on_resolved_replaces_previous_callback() {
        let container = Container::new();
        let handle = container
            .register::<ServiceImp>(Scope::Unique, |_| Ok(Arc::new(ServiceImp)))
            .on_resolved(|_, _| Err(WaslaError::custom("first")))
            .on_resolved(|_, _| Ok(()));

        assert!(container.resolve::<ServiceImp>().is_ok());
        assert_eq!(handle.scope(), Scope::Unique);
    }

    #[test]
    fn on_resolved_through_replaced_handle_is_ignored() {
        let container = Container::new();
        let stale = container.register::<ServiceImp>(Scope::Unique, |_| Ok(Arc::new(ServiceImp)));
        container.register::<ServiceImp>(Scope::Unique, |_| Ok(Arc::new(ServiceImp)));

        stale.on_resolved(|_, _| Err(WaslaError::custom("stale")));
        assert!(container.resolve::<ServiceImp>().is_ok());
    }

    #[test]
    fn erased_factory_rejects_wrong_arguments() {
        let container = Container::new();
        let factory = erase_factory::<u8, u8, _>(|_, n| Ok(Arc::new(n)));
        let mut resolution = container.resolution();

        assert!(matches!(
            factory(&mut resolution, Box::new("nope")),
            Err(WaslaError::Custom(_))
        ));
        let made = factory(&mut resolution, Box::new(4u8)).unwrap();
        assert_eq!(made.downcast::<u8>().as_deref(), Some(&4));
    }
}
