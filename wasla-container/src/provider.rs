//! Provider trait — a module of related registrations.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wasla_container::prelude::*;
//!
//! trait Repository: Send + Sync {}
//! struct PostgresRepository;
//! impl Repository for PostgresRepository {}
//!
//! struct StorageProvider;
//!
//! impl Provider for StorageProvider {
//!     fn register(&self, container: &Container) {
//!         container
//!             .register::<PostgresRepository>(Scope::Singleton, |_| Ok(Arc::new(PostgresRepository)))
//!             .implements::<dyn Repository>(|r| r as Arc<dyn Repository>);
//!     }
//! }
//!
//! let container = Container::new();
//! container.add_provider(&StorageProvider);
//! assert!(container.resolve::<dyn Repository>().is_ok());
//! ```

use crate::container::Container;

/// A module that registers related definitions into a container.
///
/// Split registrations by concern instead of keeping one long block:
///
/// ```rust,ignore
/// container
///     .add_provider(&DatabaseProvider)
///     .add_provider(&AuthProvider)
///     .add_provider(&EmailProvider);
/// ```
pub trait Provider: Send + Sync {
    /// Registers definitions into `container`.
    fn register(&self, container: &Container);

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
