//! The per-batch resource map.

use apiary_registry::object::ResourceObject;
use indexmap::IndexMap;
use indexmap::map::Entry;

/// Objects materialized in one batch, keyed by uid (`type#id`).
///
/// Each uid maps to at most one object for the lifetime of the batch. The map
/// owns its objects: relations between them are non-owning links, so once the
/// map and every handle taken from it are dropped the batch is freed, cycles
/// included.
#[derive(Debug, Default)]
pub struct ResourceMap {
    objects: IndexMap<String, ResourceObject>,
}

impl ResourceMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the object registered under `uid`.
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<&ResourceObject> {
        self.objects.get(uid)
    }

    /// Returns `true` if an object is registered under `uid`.
    #[must_use]
    pub fn contains(&self, uid: &str) -> bool {
        self.objects.contains_key(uid)
    }

    /// Registers `object` under `uid` unless the uid is taken, and returns
    /// the object registered under `uid` afterwards.
    pub fn insert(&mut self, uid: String, object: ResourceObject) -> ResourceObject {
        match self.objects.entry(uid) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => slot.insert(object).clone(),
        }
    }

    /// Number of registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over uids and objects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceObject)> {
        self.objects.iter().map(|(uid, object)| (uid.as_str(), object))
    }

    /// Registered objects in registration order.
    pub fn objects(&self) -> impl Iterator<Item = &ResourceObject> {
        self.objects.values()
    }
}
