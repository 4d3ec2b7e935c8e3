//! Top-level document.

use crate::data::Data;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed JSON:API payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Primary data: a single resource, a collection, or `null`.
    #[serde(default, skip_serializing_if = "Data::is_absent")]
    pub data: Data<Resource>,
    /// Resources included alongside the primary data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Resource>>,
    /// Top-level links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    /// Top-level meta information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Document {
    /// A document whose primary data is a single resource.
    #[must_use]
    pub fn single(resource: Resource) -> Self {
        Self {
            data: Data::One(resource),
            ..Self::default()
        }
    }

    /// A document whose primary data is a collection.
    #[must_use]
    pub fn collection(resources: impl IntoIterator<Item = Resource>) -> Self {
        Self {
            data: Data::Many(resources.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Adds included resources.
    #[must_use]
    pub fn with_included(mut self, resources: impl IntoIterator<Item = Resource>) -> Self {
        self.included
            .get_or_insert_with(Vec::new)
            .extend(resources);
        self
    }

    /// Returns the primary resources, in document order.
    #[must_use]
    pub fn primary_resources(&self) -> Vec<&Resource> {
        self.data.iter().collect()
    }

    /// Returns the included resources.
    #[must_use]
    pub fn included_resources(&self) -> &[Resource] {
        self.included.as_deref().unwrap_or_default()
    }

    /// Returns the primary resources followed by the included ones.
    #[must_use]
    pub fn all_resources(&self) -> Vec<&Resource> {
        self.data
            .iter()
            .chain(self.included_resources().iter())
            .collect()
    }
}
