//! Client-side hydration of response documents.
//!
//! [`ClientResourceUpsert`] materializes the primary and included resources of
//! a response into domain objects. Related resources that were not included
//! become lazy proxies, and relationships that only carry navigation links
//! become lazy placeholders bound to their `related` URL. Hydration never
//! performs I/O.
//!
//! The returned [`ResourceGraph`] owns every object of the document. Keep it
//! alive while walking relationships between those objects; links into a
//! dropped graph fail with [`LoadError::Released`](apiary_registry::lazy::LoadError::Released).
//!
//! # Example
//!
//! ```
//! use apiary_document::{Document, Relationship, Resource, ResourceIdentifier};
//! use apiary_registry::prelude::*;
//! use apiary_upsert::client::ClientResourceUpsert;
//! use apiary_upsert::proxy::{FetchingProxyFactory, ResourceFetcher};
//! use async_trait::async_trait;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Post { id: String, title: String, author: Option<Relation> }
//! impl ResourceModel for Post {}
//!
//! #[derive(Default)]
//! struct User { id: String, name: String }
//! impl ResourceModel for User {}
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl ResourceFetcher for Offline {
//!     async fn find_one(&self, _: &str, _: &str) -> Result<Option<ResourceObject>, LoadError> {
//!         Ok(None)
//!     }
//!     async fn find_related(&self, _: &str) -> Result<Option<ResourceObject>, LoadError> {
//!         Ok(None)
//!     }
//!     async fn find_collection(&self, _: &str) -> Result<Vec<ResourceObject>, LoadError> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let registry = Arc::new(ResourceRegistry::local(ConstantUrlProvider::none()));
//! registry.add_entry(RegistryEntry::new(
//!     ResourceInformation::builder::<Post>("posts")
//!         .id("id", |post: &Post| Some(post.id.clone()), |post, id| post.id = id)
//!         .attribute("title", |post: &mut Post, title: String| post.title = title)
//!         .to_one("author", "users", |post: &mut Post, author| post.author = author)
//!         .build(),
//! )).unwrap();
//! registry.add_entry(RegistryEntry::new(
//!     ResourceInformation::builder::<User>("users")
//!         .id("id", |user: &User| Some(user.id.clone()), |user, id| user.id = id)
//!         .attribute("name", |user: &mut User, name: String| user.name = name)
//!         .build(),
//! )).unwrap();
//!
//! let document = Document::single(
//!     Resource::new("posts", "1")
//!         .with_attribute("title", json!("Hello"))
//!         .with_relationship("author", Relationship::to_one(ResourceIdentifier::new("users", "9"))),
//! )
//! .with_included([Resource::new("users", "9").with_attribute("name", json!("Ann"))]);
//!
//! let upsert = ClientResourceUpsert::new(registry, FetchingProxyFactory::new(Offline));
//! let graph = upsert.hydrate(&document).await.unwrap();
//!
//! let post = graph[0].read::<Post>().unwrap();
//! let author = post.author.as_ref().unwrap().try_get().unwrap();
//! assert_eq!(author.read::<User>().unwrap().name, "Ann");
//! # });
//! ```

use crate::engine::{ResourceUpsert, describe};
use crate::error::UpsertError;
use crate::map::ResourceMap;
use crate::path::{HttpMethod, ResourcePath};
use crate::proxy::ProxyFactory;
use crate::strategy::{RelationStrategy, UpsertOperation};
use apiary_document::{Document, Relationship, Resource};
use apiary_registry::entry::RegistryEntry;
use apiary_registry::field::{Cardinality, FieldAccess, RelationValue, RelationshipField};
use apiary_registry::information::ResourceInformation;
use apiary_registry::lazy::Relation;
use apiary_registry::object::ResourceObject;
use apiary_registry::registry::ResourceRegistry;
use async_trait::async_trait;
use core::ops::Index;
use hashbrown::HashSet;
use std::sync::Arc;

/// Relationship policy of the client: missing resources become proxies.
pub struct ClientRelationStrategy {
    proxies: Arc<dyn ProxyFactory>,
}

impl ClientRelationStrategy {
    /// Creates a strategy building placeholders with `proxies`.
    pub fn new(proxies: impl ProxyFactory) -> Self {
        Self {
            proxies: Arc::new(proxies),
        }
    }
}

#[async_trait]
impl RelationStrategy for ClientRelationStrategy {
    async fn fetch_related(
        &self,
        entry: &Arc<RegistryEntry>,
        id: &str,
    ) -> Result<Relation, UpsertError> {
        Ok(self.proxies.create_resource_proxy(entry, id))
    }

    fn decide_set_relation_object_field(&self, field: &RelationshipField, in_batch: bool) -> bool {
        !field.has_id_field() || in_batch
    }

    fn decide_set_relation_objects_field(&self, _field: &RelationshipField) -> bool {
        true
    }

    fn can_modify_field(
        &self,
        _information: &ResourceInformation,
        _field: &str,
        _access: FieldAccess,
        _operation: UpsertOperation,
    ) -> Result<bool, UpsertError> {
        Ok(true)
    }

    fn resolve_without_linkage(
        &self,
        field: &RelationshipField,
        target: &Arc<RegistryEntry>,
        relationship: &Relationship,
    ) -> Result<Option<RelationValue>, UpsertError> {
        let Some(url) = relationship.related_url() else {
            return Ok(None);
        };
        Ok(Some(match field.cardinality() {
            Cardinality::One => {
                RelationValue::One(Some(self.proxies.create_related_proxy(target, &url)))
            }
            Cardinality::Many => {
                RelationValue::Many(self.proxies.create_collection_proxy(target, &url))
            }
        }))
    }
}

/// Hydrates response documents into domain objects.
pub struct ClientResourceUpsert {
    upsert: ResourceUpsert<ClientRelationStrategy>,
}

impl ClientResourceUpsert {
    /// Creates a client engine.
    pub fn new(registry: Arc<ResourceRegistry>, proxies: impl ProxyFactory) -> Self {
        Self {
            upsert: ResourceUpsert::new(registry, ClientRelationStrategy::new(proxies)),
        }
    }

    /// Starts a batch with an empty resource map.
    #[must_use]
    pub fn batch(&self) -> ClientBatch<'_> {
        ClientBatch {
            upsert: &self.upsert,
            map: ResourceMap::new(),
        }
    }

    /// Hydrates `document` into a graph whose primary objects follow document
    /// order.
    ///
    /// Primary and included resources are allocated first, then their
    /// relationships are resolved against the batch.
    ///
    /// # Errors
    ///
    /// Returns the first allocation or resolution failure. No object of a
    /// failed batch is returned.
    pub async fn hydrate(&self, document: &Document) -> Result<ResourceGraph, UpsertError> {
        let primary = document.primary_resources().len();
        let resources = document.all_resources();

        let mut batch = self.batch();
        let objects = batch.allocate_resources(resources.iter().copied())?;

        let mut resolved = HashSet::new();
        for (resource, object) in resources.iter().zip(&objects) {
            if let Some(uid) = resource.uid()
                && !resolved.insert(uid)
            {
                continue;
            }
            batch.set_object_relations(resource, object).await?;
        }

        tracing::debug!(
            primary,
            materialized = batch.resource_map().len(),
            "hydrated document"
        );
        Ok(ResourceGraph {
            primary: objects.into_iter().take(primary).collect(),
            map: batch.into_resource_map(),
        })
    }

    /// Not available on the client.
    ///
    /// # Errors
    ///
    /// Always returns [`UpsertError::UnsupportedOperation`].
    pub fn is_acceptable(
        &self,
        _path: &ResourcePath,
        _method: HttpMethod,
    ) -> Result<bool, UpsertError> {
        Err(UpsertError::UnsupportedOperation(
            "request dispatch is not available on the client",
        ))
    }

    /// Not available on the client.
    ///
    /// # Errors
    ///
    /// Always returns [`UpsertError::UnsupportedOperation`].
    pub async fn handle(
        &self,
        _path: &ResourcePath,
        _method: HttpMethod,
        _document: &Document,
    ) -> Result<ResourceObject, UpsertError> {
        Err(UpsertError::UnsupportedOperation(
            "request handling is not available on the client",
        ))
    }
}

impl core::fmt::Debug for ClientResourceUpsert {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientResourceUpsert")
            .field("upsert", &self.upsert)
            .finish()
    }
}

/// Objects hydrated from one document.
///
/// Indexing and iteration yield the primary objects; [`get`](Self::get) finds
/// any object of the document, included ones too. The graph owns all of them.
/// Dropping it frees the document's objects, cyclic ones included, unless a
/// handle was cloned out of it.
#[derive(Debug)]
pub struct ResourceGraph {
    primary: Vec<ResourceObject>,
    map: ResourceMap,
}

impl ResourceGraph {
    /// Primary objects in document order.
    #[must_use]
    pub fn primary(&self) -> &[ResourceObject] {
        &self.primary
    }

    /// Number of primary objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    /// Returns `true` if the document had no primary data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Iterates over the primary objects.
    pub fn iter(&self) -> core::slice::Iter<'_, ResourceObject> {
        self.primary.iter()
    }

    /// Looks up any object of the document by uid.
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<&ResourceObject> {
        self.map.get(uid)
    }

    /// Every object with an id, in allocation order.
    #[must_use]
    pub fn resource_map(&self) -> &ResourceMap {
        &self.map
    }
}

impl Index<usize> for ResourceGraph {
    type Output = ResourceObject;

    fn index(&self, index: usize) -> &ResourceObject {
        &self.primary[index]
    }
}

impl<'a> IntoIterator for &'a ResourceGraph {
    type Item = &'a ResourceObject;
    type IntoIter = core::slice::Iter<'a, ResourceObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.primary.iter()
    }
}

/// One hydration batch.
///
/// Resources allocated in the batch share one [`ResourceMap`], so repeated
/// uids resolve to the same object. The batch owns them until it ends.
pub struct ClientBatch<'a> {
    upsert: &'a ResourceUpsert<ClientRelationStrategy>,
    map: ResourceMap,
}

impl ClientBatch<'_> {
    /// Allocates objects for `resources`, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first resource that fails. Objects allocated before it
    /// stay registered in the batch.
    pub fn allocate_resources<'r>(
        &mut self,
        resources: impl IntoIterator<Item = &'r Resource>,
    ) -> Result<Vec<ResourceObject>, UpsertError> {
        resources
            .into_iter()
            .map(|resource| {
                self.upsert
                    .allocate(resource, &mut self.map, UpsertOperation::Hydrate)
            })
            .collect()
    }

    /// Resolves the relationships of previously allocated `resources`.
    ///
    /// # Errors
    ///
    /// Returns [`UpsertError::MalformedIdentifier`] for a resource without id
    /// or one that was not allocated in this batch, or the first resolution
    /// failure.
    pub async fn set_relations<'r>(
        &self,
        resources: impl IntoIterator<Item = &'r Resource>,
    ) -> Result<(), UpsertError> {
        for resource in resources {
            let object = resource
                .uid()
                .and_then(|uid| self.map.get(&uid).cloned())
                .ok_or_else(|| {
                    UpsertError::malformed_identifier(format!(
                        "{} was not allocated in this batch",
                        describe(resource)
                    ))
                })?;
            self.set_object_relations(resource, &object).await?;
        }
        Ok(())
    }

    async fn set_object_relations(
        &self,
        resource: &Resource,
        object: &ResourceObject,
    ) -> Result<(), UpsertError> {
        let entry = self.upsert.resolve_entry(&resource.resource_type)?;
        self.upsert
            .set_relations(&entry, object, resource, &self.map, UpsertOperation::Hydrate)
            .await
    }

    /// The batch's resource map.
    #[must_use]
    pub fn resource_map(&self) -> &ResourceMap {
        &self.map
    }

    /// Objects registered in the batch, in allocation order.
    pub fn objects(&self) -> impl Iterator<Item = &ResourceObject> {
        self.map.objects()
    }

    /// Ends the batch, keeping its objects.
    #[must_use]
    pub fn into_resource_map(self) -> ResourceMap {
        self.map
    }
}

impl core::fmt::Debug for ClientBatch<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientBatch")
            .field("map", &self.map)
            .finish_non_exhaustive()
    }
}
