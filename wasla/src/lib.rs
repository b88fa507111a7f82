//! # Wasla — dependency resolution with scopes, tags and type forwarding
//!
//! Register construction recipes for capabilities (usually `dyn Trait`
//! types), forward them as the other capabilities they satisfy, and
//! resolve whole object graphs with per-graph, singleton and weak
//! singleton reuse.
//!
//! ```rust
//! use std::sync::Arc;
//! use wasla::prelude::*;
//!
//! trait Service: Send + Sync {}
//! trait Forwarded: Send + Sync {}
//!
//! struct ServiceImp;
//! impl Service for ServiceImp {}
//! impl Forwarded for ServiceImp {}
//!
//! let container = Container::new();
//! container
//!     .register::<ServiceImp>(Scope::Singleton, |_| Ok(Arc::new(ServiceImp)))
//!     .implements::<dyn Service>(|s| s as Arc<dyn Service>)
//!     .implements::<dyn Forwarded>(|s| s as Arc<dyn Forwarded>);
//!
//! let service: Arc<dyn Service> = container.resolve().unwrap();
//! let forwarded: Arc<dyn Forwarded> = container.resolve().unwrap();
//! assert!(std::ptr::addr_eq(Arc::as_ptr(&service), Arc::as_ptr(&forwarded)));
//! ```

pub use wasla_container::*;
pub use wasla_support::*;
