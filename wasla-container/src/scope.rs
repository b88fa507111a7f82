//! Instance reuse scopes.
//!
//! Scopes determine how long a constructed instance is reused:
//! - [`Scope::Unique`] — a new instance for every request
//! - [`Scope::Shared`] — one instance per top-level resolve call (the default)
//! - [`Scope::Singleton`] / [`Scope::EagerSingleton`] — one instance for the
//!   container's lifetime
//! - [`Scope::WeakSingleton`] — one instance while anyone still holds it
use std::fmt;

/// Defines how a definition's instances are reused.
///
/// # Examples
/// ```
/// use wasla_container::scope::Scope;
///
/// assert_eq!(Scope::default(), Scope::Shared);
/// assert!(Scope::Singleton.is_registry_cached());
/// assert!(!Scope::Shared.is_registry_cached());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// A fresh instance every time the definition is requested.
    Unique,

    /// One instance per resolution graph.
    ///
    /// Every request for the same key made while a single top-level
    /// resolve call is in progress receives the same instance. The next
    /// top-level call builds a new one.
    #[default]
    Shared,

    /// One instance for the container's lifetime, created on first resolve.
    ///
    /// The container holds a strong reference until [`reset`] or until the
    /// definition is replaced.
    ///
    /// [`reset`]: crate::container::Container::reset
    Singleton,

    /// Like [`Scope::Singleton`], but created by
    /// [`Container::bootstrap`](crate::container::Container::bootstrap).
    EagerSingleton,

    /// One instance as long as something outside the container holds it.
    ///
    /// The container keeps only a weak reference; once every owner drops
    /// the instance the next resolve constructs a new one.
    WeakSingleton,
}

impl Scope {
    /// Returns `true` if instances are cached by the container itself.
    #[inline]
    pub fn is_registry_cached(&self) -> bool {
        matches!(self, Scope::Singleton | Scope::EagerSingleton | Scope::WeakSingleton)
    }

    /// Returns `true` if instances are reused within one resolution graph.
    #[inline]
    pub fn is_graph_shared(&self) -> bool {
        matches!(self, Scope::Shared)
    }

    #[inline]
    pub fn is_weak(&self) -> bool {
        matches!(self, Scope::WeakSingleton)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Unique => write!(f, "Unique"),
            Scope::Shared => write!(f, "Shared"),
            Scope::Singleton => write!(f, "Singleton"),
            Scope::EagerSingleton => write!(f, "EagerSingleton"),
            Scope::WeakSingleton => write!(f, "WeakSingleton"),
        }
    }
}
