//! Type-erased instances and weak instance handles.
//!
//! Every constructed value travels through the engine as an [`Instance`]:
//! an erased `Arc<T>` that remembers how to hand `T` back out and how to
//! build a [`WeakInstance`] for it.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, Weak};

/// Object-safe view of an `Arc<T>` for any capability `T`.
trait ErasedArc: Send + Sync {
    fn as_any(&self) -> &(dyn Any + Send + Sync);
    fn downgrade(&self) -> WeakInstance;
}

impl<T: ?Sized + Send + Sync + 'static> ErasedArc for Arc<T> {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            weak: Box::new(Arc::downgrade(self)),
        }
    }
}

trait ErasedWeak: Send + Sync {
    fn upgrade(&self) -> Option<Instance>;
}

impl<T: ?Sized + Send + Sync + 'static> ErasedWeak for Weak<T> {
    fn upgrade(&self) -> Option<Instance> {
        Weak::upgrade(self).map(Instance::new)
    }
}

/// A constructed value whose capability type is only known at runtime.
///
/// Cloning is cheap and never clones the underlying value.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn ErasedArc>,
    type_name: &'static str,
    address: usize,
}

impl Instance {
    /// Erases `value`.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use wasla_container::instance::Instance;
    ///
    /// let instance = Instance::new(Arc::new(7u32));
    /// assert_eq!(instance.downcast::<u32>().as_deref(), Some(&7));
    /// assert!(instance.downcast::<u64>().is_none());
    /// ```
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        let address = Arc::as_ptr(&value) as *const () as usize;
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
            address,
        }
    }

    /// Returns the value as `Arc<T>` if it was erased from exactly `Arc<T>`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        // Deref first: `Arc<dyn ErasedArc>` is itself an `ErasedArc`.
        (*self.value).as_any().downcast_ref::<Arc<T>>().cloned()
    }

    /// Name of the type the instance was erased from.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` when both instances point at the same allocation.
    ///
    /// Holds across forwarding: a concrete instance and the trait object
    /// it was forwarded as compare equal.
    #[inline]
    pub fn same_as(&self, other: &Instance) -> bool {
        self.address == other.address
    }

    /// Non-owning handle to the same value.
    pub fn downgrade(&self) -> WeakInstance {
        (*self.value).downgrade()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name)
            .field("address", &format_args!("{:#x}", self.address))
            .finish()
    }
}

/// A non-owning handle to an [`Instance`].
///
/// Liveness is checked on every [`upgrade`](WeakInstance::upgrade).
pub struct WeakInstance {
    weak: Box<dyn ErasedWeak>,
}

impl WeakInstance {
    /// Returns the instance if some owner still holds it.
    pub fn upgrade(&self) -> Option<Instance> {
        self.weak.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.upgrade().is_some()
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakInstance")
            .field("alive", &self.is_alive())
            .finish()
    }
}
