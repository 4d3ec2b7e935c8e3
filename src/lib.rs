//! A JSON:API resource registry and upsert engine for building object graphs
//! from resource documents.
//!

pub use apiary_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use apiary_internal::prelude::*;
}
