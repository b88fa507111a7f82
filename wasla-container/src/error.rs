//! Error types for resolution.
//!
//! Every failure carries the key that could not be resolved, and the
//! rendered messages say what to change.

use std::fmt;

use wasla_support::rendering::{ChainEntry, render_chain, render_chain_vertical, shorten_type_name};

use crate::key::DefinitionKey;
use crate::scope::Scope;

/// Boxed error reported by a factory or a callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Wasla operations.
#[derive(Debug, thiserror::Error)]
pub enum WaslaError {
    /// No definition or forwarding entry satisfies the key.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// A definition was found, but its instance is not the requested type.
    #[error("{}", .0)]
    InvalidType(InvalidTypeError),

    /// A factory or post-construction callback reported a failure.
    #[error("Failed to construct {key}: {source}")]
    FactoryFailed {
        key: DefinitionKey,
        #[source]
        source: BoxError,
    },

    /// A factory requested the key it is currently constructing.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// The resolution stack grew past the configured limit.
    #[error("Resolution of {key} exceeded the maximum depth of {limit}: {}", render_steps(.chain))]
    ResolutionTooDeep {
        key: DefinitionKey,
        limit: usize,
        chain: Vec<ResolutionStep>,
    },

    /// Failure reported from inside a factory before the resolver attached
    /// the definition key. Surfaces to callers as [`WaslaError::FactoryFailed`].
    #[error("{0}")]
    Custom(BoxError),
}

impl WaslaError {
    /// Reports a failure from inside a factory or callback.
    ///
    /// ```
    /// use wasla_container::error::WaslaError;
    ///
    /// let err = WaslaError::custom("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn custom(source: impl Into<BoxError>) -> Self {
        WaslaError::Custom(source.into())
    }

    /// The key this error is about, if any.
    pub fn key(&self) -> Option<&DefinitionKey> {
        match self {
            WaslaError::NotRegistered(e) => Some(&e.requested),
            WaslaError::InvalidType(e) => Some(&e.key),
            WaslaError::FactoryFailed { key, .. } => Some(key),
            WaslaError::CircularDependency(e) => e.chain.last().map(|s| &s.key),
            WaslaError::ResolutionTooDeep { key, .. } => Some(key),
            WaslaError::Custom(_) => None,
        }
    }

    #[inline]
    pub fn is_not_registered(&self) -> bool {
        matches!(self, WaslaError::NotRegistered(_))
    }

    /// Binds an unkeyed factory failure to the definition that raised it.
    /// Errors that already carry a key pass through unchanged.
    pub(crate) fn attach(self, key: &DefinitionKey) -> Self {
        match self {
            WaslaError::Custom(source) => WaslaError::FactoryFailed {
                key: key.clone(),
                source,
            },
            other => other,
        }
    }
}

/// One in-flight step of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionStep {
    /// Key of the definition being constructed, under the requested tag
    pub key: DefinitionKey,
    pub scope: Scope,
    /// Key originally requested when reached through forwarding
    pub forwarded_from: Option<DefinitionKey>,
}

impl ResolutionStep {
    fn chain_entry(&self) -> ChainEntry {
        ChainEntry {
            type_name: shorten_type_name(&self.key.to_string()),
            scope: self.scope.to_string(),
            forwarded_from: self
                .forwarded_from
                .as_ref()
                .map(|k| shorten_type_name(&k.to_string())),
        }
    }
}

fn render_steps(chain: &[ResolutionStep]) -> String {
    let names: Vec<String> = chain
        .iter()
        .map(|s| shorten_type_name(s.key.type_name()))
        .collect();
    render_chain(&names)
}

/// Error when nothing is registered for a key.
#[derive(Debug)]
pub struct NotRegisteredError {
    /// The key that was requested
    pub requested: DefinitionKey,
    /// What was being constructed when it was requested (if anything)
    pub required_by: Option<DefinitionKey>,
    /// Registered capabilities with similar names
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dependency not registered: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register {0} or forward it from an existing definition with .implements::<{0}>()",
            shorten_type_name(self.requested.type_name())
        )
    }
}

/// Error when the resolved instance does not have the requested type.
///
/// Raised when a definition forwards a capability its instances do not
/// actually provide.
#[derive(Debug)]
pub struct InvalidTypeError {
    /// Type the caller asked for
    pub expected: &'static str,
    /// Type the definition actually produced
    pub produced: &'static str,
    /// Key as it was requested
    pub key: DefinitionKey,
}

impl fmt::Display for InvalidTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resolved instance of {} cannot be used as {} (requested {})",
            self.produced, self.expected, self.key,
        )?;
        write!(
            f,
            "\n  Hint: only forward capabilities that {} implements",
            shorten_type_name(self.produced)
        )
    }
}

/// Error when a factory re-enters the key it is constructing.
///
/// Cycles are only supported through post-construction callbacks, which
/// run after the instance exists.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// In-flight steps from the first occurrence of the key to its repeat
    pub chain: Vec<ResolutionStep>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<ChainEntry> = self.chain.iter().map(ResolutionStep::chain_entry).collect();
        writeln!(f, "Circular dependency detected:")?;
        write!(f, "{}", render_chain_vertical(&entries))?;
        write!(
            f,
            "  Hint: resolve the back-reference in .on_resolved() instead of inside the factory"
        )
    }
}

/// Convenient Result type for Wasla operations.
pub type Result<T> = std::result::Result<T, WaslaError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn step(key: DefinitionKey, scope: Scope) -> ResolutionStep {
        ResolutionStep {
            key,
            scope,
            forwarded_from: None,
        }
    }

    #[test]
    fn not_registered_error_display() {
        let err = WaslaError::NotRegistered(NotRegisteredError {
            requested: DefinitionKey::tagged::<String>("db"),
            required_by: Some(DefinitionKey::of::<Vec<u8>>()),
            suggestions: vec!["alloc::string::Strings".into()],
        });

        let msg = err.to_string();
        assert!(msg.contains("not registered"));
        assert!(msg.contains("tag=\"db\""));
        assert!(msg.contains("Required by"));
        assert!(msg.contains("Did you mean"));
        assert!(msg.contains(".implements::<String>()"));
    }

    #[test]
    fn invalid_type_display_names_both_types() {
        let err = WaslaError::InvalidType(InvalidTypeError {
            expected: "app::ServiceImp2",
            produced: "app::ServiceImp1",
            key: DefinitionKey::of::<u8>(),
        });

        let msg = err.to_string();
        assert!(msg.contains("app::ServiceImp1 cannot be used as app::ServiceImp2"));
        assert!(msg.contains("ServiceImp1 implements"));
    }

    #[test]
    fn circular_dependency_renders_chain() {
        let err = WaslaError::CircularDependency(CircularDependencyError {
            chain: vec![
                step(DefinitionKey::of::<String>(), Scope::Shared),
                step(DefinitionKey::of::<i32>(), Scope::Unique),
                step(DefinitionKey::of::<String>(), Scope::Shared),
            ],
        });

        let msg = err.to_string();
        assert!(msg.contains("Circular"));
        assert!(msg.contains("↓"));
        assert!(msg.contains("[Unique] i32"));
        assert_eq!(err.key(), Some(&DefinitionKey::of::<String>()));
    }

    #[test]
    fn too_deep_renders_inline_chain() {
        let err = WaslaError::ResolutionTooDeep {
            key: DefinitionKey::of::<u8>(),
            limit: 2,
            chain: vec![
                step(DefinitionKey::of::<String>(), Scope::Shared),
                step(DefinitionKey::of::<i32>(), Scope::Shared),
            ],
        };

        assert!(err.to_string().contains("String → i32"));
    }

    #[test]
    fn attach_turns_custom_into_factory_failed() {
        let key = DefinitionKey::of::<String>();
        let err = WaslaError::custom("boom").attach(&key);

        match err {
            WaslaError::FactoryFailed { key: k, source } => {
                assert_eq!(k, key);
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("Expected FactoryFailed, got: {other:?}"),
        }
    }

    #[test]
    fn attach_keeps_keyed_errors() {
        let inner = DefinitionKey::of::<u8>();
        let err = WaslaError::NotRegistered(NotRegisteredError {
            requested: inner.clone(),
            required_by: None,
            suggestions: vec![],
        })
        .attach(&DefinitionKey::of::<String>());

        assert!(err.is_not_registered());
        assert_eq!(err.key(), Some(&inner));
    }
}
