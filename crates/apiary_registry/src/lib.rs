//! The resource catalog and registry of Apiary.
//!
//! `apiary_registry` maps resource types to their metadata and persistence
//! hooks:
//!
//! - [`class`] - Domain classes and their declared lineage
//! - [`object`] - Shared, type-erased domain objects
//! - [`lazy`] - Lazily resolved relationship values
//! - [`field`] - Field descriptors and the accessor table
//! - [`information`] - Resource type metadata and its typed builder
//! - [`entry`] - Catalog entries and the repository collaborator
//! - [`part`] - Registry parts and change listeners
//! - [`registry`] - The registry façade
//! - [`url`] - Base URL providers
//!
//! # Example
//!
//! ```
//! use apiary_registry::prelude::*;
//!
//! #[derive(Default)]
//! struct Task { id: u32 }
//! impl ResourceModel for Task {}
//!
//! #[derive(Default)]
//! struct Chore { id: u32 }
//! impl ResourceModel for Chore {}
//!
//! let registry = ResourceRegistry::local(ConstantUrlProvider::new("http://localhost/api"));
//! registry
//!     .add_entry(RegistryEntry::new(ResourceInformation::builder::<Task>("tasks").build()))
//!     .unwrap();
//! registry
//!     .add_entry(RegistryEntry::new(
//!         ResourceInformation::builder::<Chore>("chores").super_type("tasks").build(),
//!     ))
//!     .unwrap();
//!
//! let base = registry.base_resource_information("chores").unwrap();
//! assert_eq!(base.resource_type(), "tasks");
//! ```

/// Domain classes and lineage.
pub mod class;

/// Catalog entries and repositories.
pub mod entry;

/// Registry errors.
pub mod error;

/// Field descriptors.
pub mod field;

/// Resource type metadata.
pub mod information;

/// Lazily resolved values.
pub mod lazy;

/// Type-erased domain objects.
pub mod object;

/// Registry parts.
pub mod part;

/// The registry façade.
pub mod registry;

/// Base URL providers.
pub mod url;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::class::{ResourceClass, ResourceModel};
    pub use crate::entry::{RegistryEntry, RepositoryError, ResourceRepository};
    pub use crate::error::RegistryError;
    pub use crate::field::{
        Cardinality, FieldAccess, FieldError, FieldWrite, FieldWrites, IdField, RelationIds,
        RelationValue, RelationshipField, ValueField,
    };
    pub use crate::information::{ResourceInformation, ResourceInformationBuilder, SuperType};
    pub use crate::lazy::{Lazy, LazyState, LoadError, Loader, Relation, RelationList};
    pub use crate::object::{ResourceObject, WeakResourceObject};
    pub use crate::part::{
        CompositeRegistryPart, DefaultRegistryPart, ListenerSet, RegistryPart, RegistryPartEvent,
        RegistryPartListener,
    };
    pub use crate::registry::ResourceRegistry;
    pub use crate::url::{
        ConstantUrlProvider, QueryContext, ScopedUrlProvider, ServiceUrlProvider,
    };
}
