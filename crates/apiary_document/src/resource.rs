//! Resources, identifiers and relationships.

use crate::data::Data;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Builds the batch-scoped key `type#id` for a resource.
#[must_use]
pub fn uid(resource_type: &str, id: &str) -> String {
    format!("{resource_type}#{id}")
}

/// A `type`/`id` pair referencing a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// The resource type name.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// The resource id.
    pub id: String,
}

impl ResourceIdentifier {
    /// Creates an identifier.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Returns the batch key of the referenced resource.
    #[must_use]
    pub fn uid(&self) -> String {
        uid(&self.resource_type, &self.id)
    }
}

/// A named link from one resource to others.
///
/// `data` carries the linkage. When it is [`Data::Absent`] the relationship
/// only offers navigation `links`, typically a `related` URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Resource linkage.
    #[serde(default, skip_serializing_if = "Data::is_absent")]
    pub data: Data<ResourceIdentifier>,
    /// Navigation links (`self`, `related`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Map<String, Value>>,
    /// Non-standard meta information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Relationship {
    /// A to-one relationship linking a single resource.
    #[must_use]
    pub fn to_one(id: ResourceIdentifier) -> Self {
        Self {
            data: Data::One(id),
            ..Self::default()
        }
    }

    /// A to-many relationship linking the given resources.
    #[must_use]
    pub fn to_many(ids: impl IntoIterator<Item = ResourceIdentifier>) -> Self {
        Self {
            data: Data::Many(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    /// A to-one relationship explicitly linking nothing.
    #[must_use]
    pub fn null() -> Self {
        Self {
            data: Data::Null,
            ..Self::default()
        }
    }

    /// A relationship without linkage, only offering a `related` link.
    #[must_use]
    pub fn related(url: impl Into<String>) -> Self {
        let mut links = Map::new();
        links.insert("related".to_string(), Value::String(url.into()));
        Self {
            data: Data::Absent,
            links: Some(links),
            meta: None,
        }
    }

    /// Returns `true` if linkage is present (even if empty).
    #[must_use]
    pub fn has_linkage(&self) -> bool {
        self.data.is_present()
    }

    /// Returns the `related` navigation URL.
    ///
    /// Accepts both the string form and the link-object form
    /// (`{"href": "..."}`). Surrounding whitespace is trimmed.
    #[must_use]
    pub fn related_url(&self) -> Option<String> {
        let related = self.links.as_ref()?.get("related")?;
        let url = match related {
            Value::String(url) => url,
            Value::Object(link) => link.get("href")?.as_str()?,
            _ => return None,
        };
        Some(url.trim().to_string())
    }
}

/// A single wire-level entity.
///
/// `relationships` is `None` when the block is missing and `Some(empty)` when
/// it is present without members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// The resource type name.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// The resource id. Missing for resources yet to be created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Attribute values keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    /// Relationships keyed by field name, in document order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<IndexMap<String, Relationship>>,
    /// Resource links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    /// Resource meta information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Resource {
    /// Creates a resource with the given type and id.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Creates a resource without an id.
    pub fn transient(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    /// Returns the batch key, if the resource has an id.
    #[must_use]
    pub fn uid(&self) -> Option<String> {
        self.id.as_deref().map(|id| uid(&self.resource_type, id))
    }

    /// Returns the identifier of this resource, if it has an id.
    #[must_use]
    pub fn identifier(&self) -> Option<ResourceIdentifier> {
        self.id
            .as_ref()
            .map(|id| ResourceIdentifier::new(self.resource_type.clone(), id.clone()))
    }

    /// Sets an attribute value.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
        self
    }

    /// Sets a relationship.
    #[must_use]
    pub fn with_relationship(mut self, name: impl Into<String>, relationship: Relationship) -> Self {
        self.relationships
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), relationship);
        self
    }

    /// Sets the resource links.
    #[must_use]
    pub fn with_links(mut self, links: Value) -> Self {
        self.links = Some(links);
        self
    }

    /// Sets the resource meta information.
    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}
