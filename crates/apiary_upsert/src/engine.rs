//! The mode-independent upsert core.
//!
//! [`ResourceUpsert`] turns wire resources into domain objects. Allocation
//! assigns identity, attributes, links and meta and registers the object in
//! the batch's [`ResourceMap`]; relationship resolution runs afterwards, so
//! references between resources of the same batch (including cycles and self
//! references) resolve to the materialized objects.
//!
//! Links to batch objects are non-owning ([`Relation::batch`]); the map, or
//! whoever it hands the objects to, owns them. Every write is staged as
//! [`FieldWrites`] first: values are decoded and relationships resolved before
//! the first field of an object changes.

use crate::error::UpsertError;
use crate::map::ResourceMap;
use crate::strategy::{RelationStrategy, UpsertOperation};
use apiary_document::{Data, Relationship, Resource, ResourceIdentifier};
use apiary_registry::entry::RegistryEntry;
use apiary_registry::error::RegistryError;
use apiary_registry::field::{
    Cardinality, FieldError, FieldWrite, FieldWrites, RelationIds, RelationValue,
    RelationshipField, ValueField,
};
use apiary_registry::information::ResourceInformation;
use apiary_registry::lazy::{Lazy, Relation};
use apiary_registry::object::ResourceObject;
use apiary_registry::part::RegistryPart;
use apiary_registry::registry::ResourceRegistry;
use std::sync::Arc;

/// Upsert engine parameterized by a [`RelationStrategy`].
pub struct ResourceUpsert<S> {
    registry: Arc<ResourceRegistry>,
    strategy: S,
}

impl<S: RelationStrategy> ResourceUpsert<S> {
    /// Creates an engine over `registry`.
    pub fn new(registry: Arc<ResourceRegistry>, strategy: S) -> Self {
        Self { registry, strategy }
    }

    /// The registry used for type lookups.
    #[must_use]
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// The relationship strategy.
    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Looks up the entry of `resource_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the type is not registered.
    pub fn resolve_entry(&self, resource_type: &str) -> Result<Arc<RegistryEntry>, UpsertError> {
        self.registry
            .entry(resource_type)
            .ok_or_else(|| RegistryError::not_found(resource_type).into())
    }

    /// Verifies that `actual` belongs to the type hierarchy of `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`UpsertError::TypeConflict`] if both types have different base
    /// types, or a registry error if either chain cannot be resolved.
    pub fn check_hierarchy(&self, expected: &str, actual: &str) -> Result<(), UpsertError> {
        if expected == actual {
            return Ok(());
        }
        let expected_base = self.registry.base_resource_information(expected)?;
        let actual_base = self.registry.base_resource_information(actual)?;
        if expected_base.resource_type() == actual_base.resource_type() {
            Ok(())
        } else {
            Err(UpsertError::TypeConflict {
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    /// Returns the batch object for `resource`, materializing it if needed.
    ///
    /// A resource whose uid is already in `map` yields the registered object
    /// unchanged. Otherwise a new object is instantiated and populated, and
    /// registered only once every assignment succeeded. Resources without an
    /// id are never registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown, the identifier is malformed or
    /// a field cannot be assigned.
    pub fn allocate(
        &self,
        resource: &Resource,
        map: &mut ResourceMap,
        operation: UpsertOperation,
    ) -> Result<ResourceObject, UpsertError> {
        let entry = self.resolve_entry(&resource.resource_type)?;
        let uid = resource_uid(resource)?;
        if let Some(existing) = uid.as_deref().and_then(|uid| map.get(uid)) {
            tracing::debug!(uid = uid.as_deref(), "reusing batch object");
            return Ok(existing.clone());
        }

        let object = entry.resource_information().instantiate();
        self.apply_fields(&entry, &object, resource, operation)?;

        Ok(match uid {
            Some(uid) => {
                tracing::debug!(uid = %uid, "allocated resource");
                map.insert(uid, object)
            }
            None => {
                tracing::debug!(resource_type = %resource.resource_type, "allocated transient resource");
                object
            }
        })
    }

    /// Assigns id, attributes, links and meta of `resource` to `object`.
    ///
    /// Nothing is written unless every value decodes and every write is
    /// permitted.
    ///
    /// # Errors
    ///
    /// Returns an error if a value does not decode or a write is rejected.
    pub fn apply_fields(
        &self,
        entry: &RegistryEntry,
        object: &ResourceObject,
        resource: &Resource,
        operation: UpsertOperation,
    ) -> Result<(), UpsertError> {
        self.stage_fields(entry, resource, operation)?
            .apply(object)
            .map_err(|source| UpsertError::field(describe(resource), source))
    }

    /// Decodes id, attributes, links and meta of `resource` into pending
    /// writes.
    ///
    /// # Errors
    ///
    /// Returns an error if a value does not decode or a write is rejected.
    pub fn stage_fields(
        &self,
        entry: &RegistryEntry,
        resource: &Resource,
        operation: UpsertOperation,
    ) -> Result<FieldWrites, UpsertError> {
        let information = entry.resource_information();
        let field_error = |source: FieldError| UpsertError::field(describe(resource), source);
        let mut writes = FieldWrites::new();

        if let (Some(id), Some(field)) = (resource.id.as_deref(), information.id_field()) {
            writes.push(field.prepare(id).map_err(field_error)?);
        }
        self.stage_attributes(information, resource, operation, &mut writes)?;
        for (field, value) in [
            (information.links_field(), resource.links.as_ref()),
            (information.meta_field(), resource.meta.as_ref()),
        ] {
            if let Some(write) = prepare_value(field, value).map_err(field_error)? {
                writes.push(write);
            }
        }
        Ok(writes)
    }

    fn stage_attributes(
        &self,
        information: &ResourceInformation,
        resource: &Resource,
        operation: UpsertOperation,
        writes: &mut FieldWrites,
    ) -> Result<(), UpsertError> {
        let Some(attributes) = &resource.attributes else {
            return Ok(());
        };
        for (name, value) in attributes {
            if let Some(field) = information.attribute(name) {
                if self
                    .strategy
                    .can_modify_field(information, name, field.access(), operation)?
                {
                    writes.push(
                        field
                            .prepare(value.clone())
                            .map_err(|source| UpsertError::field(describe(resource), source))?,
                    );
                }
            } else if let Some(write) = information.prepare_any_attribute(name, value.clone()) {
                writes.push(write);
            } else {
                tracing::debug!(
                    resource_type = information.resource_type(),
                    attribute = %name,
                    "ignoring undeclared attribute"
                );
            }
        }
        Ok(())
    }

    /// Resolves the relationships of `resource` and assigns them to `object`.
    ///
    /// # Errors
    ///
    /// Returns an error if a relationship is unknown, its linkage does not
    /// match the field, or a related resource cannot be produced. Nothing is
    /// assigned in that case.
    pub async fn set_relations(
        &self,
        entry: &RegistryEntry,
        object: &ResourceObject,
        resource: &Resource,
        map: &ResourceMap,
        operation: UpsertOperation,
    ) -> Result<(), UpsertError> {
        self.stage_relations(entry, resource, map, operation)
            .await?
            .apply(object)
            .map_err(|source| UpsertError::field(describe(resource), source))
    }

    /// Resolves the relationships of `resource` into pending writes.
    ///
    /// Related resources found in `map` are linked without taking ownership;
    /// the others come from the strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if a relationship is unknown, its linkage does not
    /// match the field, or a related resource cannot be produced.
    pub async fn stage_relations(
        &self,
        entry: &RegistryEntry,
        resource: &Resource,
        map: &ResourceMap,
        operation: UpsertOperation,
    ) -> Result<FieldWrites, UpsertError> {
        let mut writes = FieldWrites::new();
        let Some(relationships) = &resource.relationships else {
            return Ok(writes);
        };
        let information = entry.resource_information();
        for (name, relationship) in relationships {
            let field =
                information
                    .relationship(name)
                    .ok_or_else(|| UpsertError::UnknownRelationship {
                        resource_type: information.resource_type().to_string(),
                        relationship: name.clone(),
                    })?;
            if !self
                .strategy
                .can_modify_field(information, name, field.access(), operation)?
            {
                continue;
            }
            self.stage_relation(field, resource, relationship, map, &mut writes)
                .await?;
        }
        Ok(writes)
    }

    async fn stage_relation(
        &self,
        field: &RelationshipField,
        resource: &Resource,
        relationship: &Relationship,
        map: &ResourceMap,
        writes: &mut FieldWrites,
    ) -> Result<(), UpsertError> {
        let field_error = |source: FieldError| UpsertError::field(describe(resource), source);
        let push_ids = |writes: &mut FieldWrites, ids: RelationIds| -> Result<(), UpsertError> {
            if let Some(write) = field.prepare_ids(ids).map_err(field_error)? {
                writes.push(write);
            }
            Ok(())
        };

        match (field.cardinality(), &relationship.data) {
            (_, Data::Absent) => {
                let target = self.resolve_entry(field.target_type())?;
                if let Some(value) =
                    self.strategy
                        .resolve_without_linkage(field, &target, relationship)?
                {
                    tracing::debug!(relationship = field.name(), "assigning deferred relationship");
                    writes.push(field.prepare(value).map_err(field_error)?);
                }
            }
            (Cardinality::One, Data::Null) => {
                push_ids(writes, RelationIds::One(None))?;
                writes.push(
                    field
                        .prepare(RelationValue::One(None))
                        .map_err(field_error)?,
                );
            }
            (Cardinality::One, Data::One(identifier)) => {
                let target = self.target_entry(field, identifier)?;
                push_ids(writes, RelationIds::One(Some(identifier.id.clone())))?;
                let known = map.get(&identifier.uid());
                if self
                    .strategy
                    .decide_set_relation_object_field(field, known.is_some())
                {
                    let relation = self.related(&target, identifier, known).await?;
                    writes.push(
                        field
                            .prepare(RelationValue::One(Some(relation)))
                            .map_err(field_error)?,
                    );
                } else {
                    tracing::debug!(
                        relationship = field.name(),
                        uid = %identifier.uid(),
                        "skipping relationship object"
                    );
                }
            }
            (Cardinality::Many, Data::Many(identifiers)) => {
                let mut relations = Vec::with_capacity(identifiers.len());
                for identifier in identifiers {
                    let target = self.target_entry(field, identifier)?;
                    let known = map.get(&identifier.uid());
                    relations.push(self.related(&target, identifier, known).await?);
                }
                let ids = identifiers
                    .iter()
                    .map(|identifier| identifier.id.clone())
                    .collect();
                push_ids(writes, RelationIds::Many(ids))?;
                if self.strategy.decide_set_relation_objects_field(field) {
                    writes.push(
                        field
                            .prepare(RelationValue::Many(Lazy::loaded(relations)))
                            .map_err(field_error)?,
                    );
                }
            }
            (cardinality, _) => {
                return Err(UpsertError::malformed(format!(
                    "linkage of '{}' on {} does not match its {cardinality} field",
                    field.name(),
                    describe(resource)
                )));
            }
        }
        Ok(())
    }

    async fn related(
        &self,
        target: &Arc<RegistryEntry>,
        identifier: &ResourceIdentifier,
        known: Option<&ResourceObject>,
    ) -> Result<Relation, UpsertError> {
        match known {
            Some(object) => Ok(Relation::batch(object)),
            None => {
                tracing::debug!(uid = %identifier.uid(), "related resource not in batch");
                self.strategy.fetch_related(target, &identifier.id).await
            }
        }
    }

    fn target_entry(
        &self,
        field: &RelationshipField,
        identifier: &ResourceIdentifier,
    ) -> Result<Arc<RegistryEntry>, UpsertError> {
        if identifier.resource_type.is_empty() || identifier.id.is_empty() {
            return Err(UpsertError::malformed_identifier(format!(
                "relationship '{}' has an identifier without type or id",
                field.name()
            )));
        }
        let entry = self.resolve_entry(&identifier.resource_type)?;
        self.check_hierarchy(field.target_type(), &identifier.resource_type)?;
        Ok(entry)
    }
}

impl<S> core::fmt::Debug for ResourceUpsert<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceUpsert")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// The uid of `resource`, or `None` for resources without id.
pub(crate) fn resource_uid(resource: &Resource) -> Result<Option<String>, UpsertError> {
    if resource.resource_type.is_empty() {
        return Err(UpsertError::malformed_identifier("resource without type"));
    }
    match resource.id.as_deref() {
        Some("") => Err(UpsertError::malformed_identifier(format!(
            "resource of type '{}' has an empty id",
            resource.resource_type
        ))),
        _ => Ok(resource.uid()),
    }
}

/// Uid of `resource`, or its type for transient resources.
pub(crate) fn describe(resource: &Resource) -> String {
    resource
        .uid()
        .unwrap_or_else(|| resource.resource_type.clone())
}

fn prepare_value(
    field: Option<&ValueField>,
    value: Option<&serde_json::Value>,
) -> Result<Option<FieldWrite>, FieldError> {
    let (Some(field), Some(value)) = (field, value) else {
        return Ok(None);
    };
    field.prepare(value.clone()).map(Some)
}
