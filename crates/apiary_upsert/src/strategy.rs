//! Deployment-specific relationship policy.
//!
//! The shared engine delegates every mode-dependent decision to a
//! [`RelationStrategy`]: how to obtain a related resource missing from the
//! batch, whether to assign a relationship value, whether a field may be
//! written, and what to do with relationships that only carry navigation
//! links.

use crate::error::UpsertError;
use apiary_document::Relationship;
use apiary_registry::entry::RegistryEntry;
use apiary_registry::field::{FieldAccess, RelationValue, RelationshipField};
use apiary_registry::information::ResourceInformation;
use apiary_registry::lazy::Relation;
use async_trait::async_trait;
use std::sync::Arc;

/// The kind of write an upsert performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOperation {
    /// A new resource is created (`POST`).
    Create,
    /// An existing resource is updated (`PATCH`).
    Update,
    /// Objects are hydrated from a response document.
    Hydrate,
}

impl UpsertOperation {
    /// Returns `true` if `access` permits writes for this operation.
    ///
    /// Hydration writes every field.
    #[must_use]
    pub fn permits(self, access: FieldAccess) -> bool {
        match self {
            Self::Create => access.postable,
            Self::Update => access.patchable,
            Self::Hydrate => true,
        }
    }
}

/// Mode-specific decisions of the upsert engine.
#[async_trait]
pub trait RelationStrategy: Send + Sync + 'static {
    /// Produces the related resource `id` of `entry`, which is not part of the
    /// current batch.
    async fn fetch_related(
        &self,
        entry: &Arc<RegistryEntry>,
        id: &str,
    ) -> Result<Relation, UpsertError>;

    /// Decides whether a to-one relationship receives an object.
    ///
    /// `in_batch` tells whether the related resource was materialized in the
    /// current batch.
    fn decide_set_relation_object_field(&self, field: &RelationshipField, in_batch: bool) -> bool;

    /// Decides whether a to-many relationship receives a collection.
    fn decide_set_relation_objects_field(&self, field: &RelationshipField) -> bool;

    /// Decides whether `field` may be written by `operation`.
    ///
    /// Returns `Ok(false)` to skip the write.
    ///
    /// # Errors
    ///
    /// Returns [`UpsertError::ImmutableField`] to reject the whole upsert.
    fn can_modify_field(
        &self,
        information: &ResourceInformation,
        field: &str,
        access: FieldAccess,
        operation: UpsertOperation,
    ) -> Result<bool, UpsertError>;

    /// Resolves a relationship that carries no linkage.
    ///
    /// Returns `None` to leave the field untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder cannot be built.
    fn resolve_without_linkage(
        &self,
        field: &RelationshipField,
        target: &Arc<RegistryEntry>,
        relationship: &Relationship,
    ) -> Result<Option<RelationValue>, UpsertError>;
}
