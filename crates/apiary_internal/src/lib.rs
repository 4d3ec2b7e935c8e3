//! # Apiary Internal Library
//!
//! Re-exports the core Apiary crates for convenience.

/// Layer 0: Tracing setup and shared infrastructure.
pub use apiary_core;

/// Layer 1: Wire-level document model.
pub use apiary_document;

/// Layer 2: Resource catalog and registry.
pub use apiary_registry;

/// Layer 3: Upsert engine.
pub use apiary_upsert;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use apiary_core::{TracingFormat, TracingSetup};
    pub use apiary_document::{Data, Document, Relationship, Resource, ResourceIdentifier};
    pub use apiary_registry::prelude::*;
    pub use apiary_upsert::prelude::*;
}
