//! The upsert engine of Apiary.
//!
//! `apiary_upsert` turns wire documents into graphs of domain objects. Both
//! deployment modes share one engine and differ only in their
//! [`RelationStrategy`](strategy::RelationStrategy):
//!
//! - [`engine`] - Allocation, field assignment and relationship resolution
//! - [`strategy`] - Mode-specific relationship policy
//! - [`map`] - The per-batch resource map
//! - [`client`] - Hydration of response documents
//! - [`server`] - Create and update requests against repositories
//! - [`proxy`] - Lazy placeholders for resources outside the batch
//! - [`path`] - Request paths and methods
//! - [`error`] - Upsert errors

/// Client-side hydration.
pub mod client;

/// The shared upsert core.
pub mod engine;

/// Upsert errors.
pub mod error;

/// The per-batch resource map.
pub mod map;

/// Request paths and methods.
pub mod path;

/// Lazy placeholders.
pub mod proxy;

/// Server-side create and update.
pub mod server;

/// Relationship policy.
pub mod strategy;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::client::{
        ClientBatch, ClientRelationStrategy, ClientResourceUpsert, ResourceGraph,
    };
    pub use crate::engine::ResourceUpsert;
    pub use crate::error::UpsertError;
    pub use crate::map::ResourceMap;
    pub use crate::path::{HttpMethod, ResourcePath};
    pub use crate::proxy::{FetchingProxyFactory, ProxyFactory, ResourceFetcher};
    pub use crate::server::{
        ImmutableWriteBehavior, ServerRelationStrategy, ServerResourceUpsert, ServerUpsertOptions,
    };
    pub use crate::strategy::{RelationStrategy, UpsertOperation};
}
