//! Definition identification keys.
//!
//! A [`DefinitionKey`] addresses exactly one definition in the container.
//! It combines the requested capability, the shape of the runtime
//! arguments its factory takes, and an optional [`Tag`].

use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a Rust type used as a capability or an argument shape.
///
/// Equality and hashing only look at the [`TypeId`]; the name is kept
/// for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeIdentity {
    id: TypeId,
    name: &'static str,
}

impl TypeIdentity {
    /// Identity of `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` for the `()` argument shape.
    #[inline]
    pub fn is_unit(&self) -> bool {
        self.id == TypeId::of::<()>()
    }
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeIdentity {}

impl Hash for TypeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Distinguishes several definitions of the same capability.
///
/// # Examples
/// ```
/// use wasla_container::key::Tag;
///
/// assert_eq!(Tag::from("primary"), Tag::Name("primary".into()));
/// assert_eq!(Tag::from(7i64), Tag::Index(7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Name(Cow<'static, str>),
    Index(i64),
}

impl From<&'static str> for Tag {
    fn from(name: &'static str) -> Self {
        Tag::Name(Cow::Borrowed(name))
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::Name(Cow::Owned(name))
    }
}

impl From<i64> for Tag {
    fn from(index: i64) -> Self {
        Tag::Index(index)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Name(name) => write!(f, "{name:?}"),
            Tag::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// Uniquely identifies a definition in the container.
///
/// Two keys are equal when capability, argument shape and tag all match.
///
/// # Examples
/// ```
/// use wasla_container::key::DefinitionKey;
///
/// let plain = DefinitionKey::of::<String>();
/// assert_eq!(plain.tag(), None);
///
/// let tagged = DefinitionKey::tagged::<String>("replica");
/// assert_ne!(plain, tagged);
/// assert_eq!(tagged.untagged(), plain);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DefinitionKey {
    capability: TypeIdentity,
    arguments: TypeIdentity,
    tag: Option<Tag>,
}

impl DefinitionKey {
    /// Key for capability `T` with no arguments and no tag.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeIdentity::of::<T>(), TypeIdentity::of::<()>(), None)
    }

    /// Key for capability `T` with no arguments under `tag`.
    #[inline]
    pub fn tagged<T: ?Sized + 'static>(tag: impl Into<Tag>) -> Self {
        Self::new(TypeIdentity::of::<T>(), TypeIdentity::of::<()>(), Some(tag.into()))
    }

    /// Key for capability `T` whose factory takes arguments of type `A`.
    #[inline]
    pub fn with_arguments<T: ?Sized + 'static, A: 'static>(tag: Option<Tag>) -> Self {
        Self::new(TypeIdentity::of::<T>(), TypeIdentity::of::<A>(), tag)
    }

    /// Builds a key from raw identities.
    pub fn new(capability: TypeIdentity, arguments: TypeIdentity, tag: Option<Tag>) -> Self {
        Self { capability, arguments, tag }
    }

    #[inline]
    pub fn capability(&self) -> TypeIdentity {
        self.capability
    }

    #[inline]
    pub fn arguments(&self) -> TypeIdentity {
        self.arguments
    }

    #[inline]
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// Human-readable name of the capability.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.capability.name()
    }

    /// Same capability and arguments under another tag.
    pub fn retagged(&self, tag: Option<Tag>) -> Self {
        Self {
            capability: self.capability,
            arguments: self.arguments,
            tag,
        }
    }

    pub fn untagged(&self) -> Self {
        self.retagged(None)
    }
}

impl fmt::Debug for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefinitionKey({}", self.capability.name())?;
        if !self.arguments.is_unit() {
            write!(f, ", arguments={}", self.arguments.name())?;
        }
        if let Some(ref tag) = self.tag {
            write!(f, ", tag={tag}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.capability.name())?;
        if !self.arguments.is_unit() {
            write!(f, " (arguments={})", self.arguments.name())?;
        }
        if let Some(ref tag) = self.tag {
            write!(f, " (tag={tag})")?;
        }
        Ok(())
    }
}
