//! Server-side upsert of write requests.
//!
//! [`ServerResourceUpsert`] handles `POST` and `PATCH` requests: it resolves
//! the target entry from the request path, creates or loads the domain object
//! through the entry's [`ResourceRepository`](apiary_registry::entry::ResourceRepository),
//! applies the payload with field-access enforcement and persists the result.
//!
//! An update decodes every attribute and resolves every relationship before
//! it writes to the loaded object, so a rejected `PATCH` leaves the object as
//! the repository returned it, even when that is a shared handle.

use crate::client::ResourceGraph;
use crate::engine::{ResourceUpsert, describe};
use crate::error::UpsertError;
use crate::map::ResourceMap;
use crate::path::{HttpMethod, ResourcePath};
use crate::strategy::{RelationStrategy, UpsertOperation};
use apiary_document::{Data, Document, Relationship, Resource, uid};
use apiary_registry::entry::{RegistryEntry, ResourceRepository};
use apiary_registry::error::RegistryError;
use apiary_registry::field::{FieldAccess, RelationValue, RelationshipField};
use apiary_registry::information::ResourceInformation;
use apiary_registry::lazy::Relation;
use apiary_registry::object::ResourceObject;
use apiary_registry::part::RegistryPart;
use apiary_registry::registry::ResourceRegistry;
use async_trait::async_trait;
use std::sync::Arc;

/// What happens when a payload writes a field the operation may not modify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImmutableWriteBehavior {
    /// Skip the field and log a warning.
    #[default]
    Ignore,
    /// Reject the request with [`UpsertError::ImmutableField`].
    Fail,
}

/// Options of [`ServerResourceUpsert`].
#[derive(Debug, Clone, Default)]
pub struct ServerUpsertOptions {
    immutable_writes: ImmutableWriteBehavior,
}

impl ServerUpsertOptions {
    /// Default options: immutable writes are ignored.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the behavior for writes to immutable fields.
    #[must_use]
    pub fn with_immutable_writes(mut self, behavior: ImmutableWriteBehavior) -> Self {
        self.immutable_writes = behavior;
        self
    }

    /// The behavior for writes to immutable fields.
    #[must_use]
    pub fn immutable_writes(&self) -> ImmutableWriteBehavior {
        self.immutable_writes
    }
}

/// Relationship policy of the server: related resources come from their
/// repositories.
#[derive(Debug, Clone, Default)]
pub struct ServerRelationStrategy {
    options: ServerUpsertOptions,
}

impl ServerRelationStrategy {
    /// Creates a strategy with `options`.
    #[must_use]
    pub fn new(options: ServerUpsertOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl RelationStrategy for ServerRelationStrategy {
    async fn fetch_related(
        &self,
        entry: &Arc<RegistryEntry>,
        id: &str,
    ) -> Result<Relation, UpsertError> {
        let repository = entry.repository()?;
        match repository.find_one(id).await? {
            Some(object) => Ok(Relation::loaded(object)),
            None => Err(UpsertError::RelatedNotFound(uid(entry.resource_type(), id))),
        }
    }

    fn decide_set_relation_object_field(&self, _field: &RelationshipField, _in_batch: bool) -> bool {
        true
    }

    fn decide_set_relation_objects_field(&self, _field: &RelationshipField) -> bool {
        true
    }

    fn can_modify_field(
        &self,
        information: &ResourceInformation,
        field: &str,
        access: FieldAccess,
        operation: UpsertOperation,
    ) -> Result<bool, UpsertError> {
        if operation.permits(access) {
            return Ok(true);
        }
        match self.options.immutable_writes() {
            ImmutableWriteBehavior::Ignore => {
                tracing::warn!(
                    resource_type = information.resource_type(),
                    field,
                    ?operation,
                    "ignoring write to immutable field"
                );
                Ok(false)
            }
            ImmutableWriteBehavior::Fail => Err(UpsertError::ImmutableField {
                resource_type: information.resource_type().to_string(),
                field: field.to_string(),
            }),
        }
    }

    fn resolve_without_linkage(
        &self,
        _field: &RelationshipField,
        _target: &Arc<RegistryEntry>,
        _relationship: &Relationship,
    ) -> Result<Option<RelationValue>, UpsertError> {
        Ok(None)
    }
}

/// Applies write requests to domain objects and persists them.
pub struct ServerResourceUpsert {
    upsert: ResourceUpsert<ServerRelationStrategy>,
}

impl ServerResourceUpsert {
    /// Creates a server engine.
    pub fn new(registry: Arc<ResourceRegistry>, options: ServerUpsertOptions) -> Self {
        Self {
            upsert: ResourceUpsert::new(registry, ServerRelationStrategy::new(options)),
        }
    }

    /// Returns `true` for `POST` on a collection path and `PATCH` on a
    /// resource path of a registered type.
    ///
    /// # Errors
    ///
    /// Never fails on the server.
    pub fn is_acceptable(&self, path: &ResourcePath, method: HttpMethod) -> Result<bool, UpsertError> {
        let shape = matches!(
            (method, path.is_collection()),
            (HttpMethod::Post, true) | (HttpMethod::Patch, false)
        );
        Ok(shape && self.upsert.registry().entry_by_path(path.resource_path()).is_some())
    }

    /// Creates (`POST`) or updates (`PATCH`) the resource in `document` and
    /// returns the persisted object.
    ///
    /// # Errors
    ///
    /// Returns [`UpsertError::UnsupportedOperation`] for other methods or
    /// path shapes, [`RegistryError::NotFound`] for unknown paths,
    /// [`UpsertError::MalformedPayload`] unless the document holds exactly
    /// one resource, [`UpsertError::ResourceNotFound`] if the resource to
    /// update does not exist, and any assignment, resolution or repository
    /// failure.
    pub async fn handle(
        &self,
        path: &ResourcePath,
        method: HttpMethod,
        document: &Document,
    ) -> Result<ResourceObject, UpsertError> {
        let entry = self
            .upsert
            .registry()
            .entry_by_path(path.resource_path())
            .ok_or_else(|| RegistryError::not_found(path.resource_path()))?;
        let Data::One(resource) = &document.data else {
            return Err(UpsertError::malformed(format!(
                "{method} {path} expects a single resource"
            )));
        };
        self.upsert
            .check_hierarchy(entry.resource_type(), &resource.resource_type)?;
        let resource_entry = self.upsert.resolve_entry(&resource.resource_type)?;
        let repository = entry.repository()?;

        match (method, path.id()) {
            (HttpMethod::Post, None) => {
                let mut map = ResourceMap::new();
                let object = self
                    .upsert
                    .allocate(resource, &mut map, UpsertOperation::Create)?;
                self.upsert
                    .set_relations(&resource_entry, &object, resource, &map, UpsertOperation::Create)
                    .await?;
                let created = repository.create(object).await?;
                tracing::debug!(resource = %describe(resource), "created resource");
                Ok(created)
            }
            (HttpMethod::Patch, Some(id)) => {
                if resource.id.as_deref() != Some(id) {
                    return Err(UpsertError::malformed_identifier(format!(
                        "{} does not match path {path}",
                        describe(resource)
                    )));
                }
                let object = repository
                    .find_one(id)
                    .await?
                    .ok_or_else(|| UpsertError::ResourceNotFound(uid(entry.resource_type(), id)))?;
                self.update(&resource_entry, repository, object, resource)
                    .await
            }
            _ => Err(UpsertError::UnsupportedOperation(
                "only POST on collections and PATCH on resources are handled",
            )),
        }
    }

    async fn update(
        &self,
        entry: &RegistryEntry,
        repository: &Arc<dyn ResourceRepository>,
        object: ResourceObject,
        resource: &Resource,
    ) -> Result<ResourceObject, UpsertError> {
        let mut writes = self
            .upsert
            .stage_fields(entry, resource, UpsertOperation::Update)?;
        let mut map = ResourceMap::new();
        if let Some(uid) = resource.uid() {
            map.insert(uid, object.clone());
        }
        writes.append(
            self.upsert
                .stage_relations(entry, resource, &map, UpsertOperation::Update)
                .await?,
        );
        writes
            .apply(&object)
            .map_err(|source| UpsertError::field(describe(resource), source))?;
        let saved = repository.save(object).await?;
        tracing::debug!(resource = %describe(resource), "updated resource");
        Ok(saved)
    }

    /// Not available on the server.
    ///
    /// # Errors
    ///
    /// Always returns [`UpsertError::UnsupportedOperation`].
    pub async fn hydrate(&self, _document: &Document) -> Result<ResourceGraph, UpsertError> {
        Err(UpsertError::UnsupportedOperation(
            "document hydration is not available on the server",
        ))
    }
}

impl core::fmt::Debug for ServerResourceUpsert {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServerResourceUpsert")
            .field("upsert", &self.upsert)
            .field("options", &self.upsert.strategy().options)
            .finish()
    }
}
