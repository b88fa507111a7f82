//! Core resolution engine for Wasla.

mod cache;
pub mod container;
pub mod definition;
pub mod error;
pub mod forward;
pub mod instance;
pub mod key;
pub mod provider;
mod registry;
pub mod resolution;
pub mod scope;

pub use container::{Container, ContainerBuilder, ContainerConfig, prelude};
pub use definition::DefinitionHandle;
pub use error::{Result, WaslaError};
pub use instance::{Instance, WeakInstance};
pub use key::{DefinitionKey, Tag, TypeIdentity};
pub use resolution::Resolution;
pub use scope::Scope;
