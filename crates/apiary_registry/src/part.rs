//! Registry parts: pluggable sources of catalog entries.
//!
//! A [`RegistryPart`] stores [`RegistryEntry`] values and notifies listeners
//! of every successful mutation. [`DefaultRegistryPart`] holds locally
//! defined entries; [`CompositeRegistryPart`] merges several parts behind one
//! interface and re-emits their events.

use crate::class::ResourceClass;
use crate::entry::RegistryEntry;
use crate::error::RegistryError;
use core::any::TypeId;
use hashbrown::HashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// A change to the contents of a registry part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryPartEvent {
    /// An entry for the resource type was added.
    Added(String),
    /// The entry for the resource type was removed.
    Removed(String),
}

impl RegistryPartEvent {
    /// The resource type the event concerns.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        match self {
            Self::Added(resource_type) | Self::Removed(resource_type) => resource_type,
        }
    }
}

/// Receives registry part events.
///
/// Listeners run synchronously on the mutating thread, after the part has
/// released its internal lock.
pub trait RegistryPartListener: Send + Sync + 'static {
    /// Called after the part changed.
    fn on_changed(&self, event: &RegistryPartEvent);
}

impl<F> RegistryPartListener for F
where
    F: Fn(&RegistryPartEvent) + Send + Sync + 'static,
{
    fn on_changed(&self, event: &RegistryPartEvent) {
        self(event);
    }
}

/// A set of listeners notified on a snapshot.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn RegistryPartListener>>>,
}

impl ListenerSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    pub fn add(&self, listener: Arc<dyn RegistryPartListener>) {
        self.listeners.write().push(listener);
    }

    /// Removes a listener by identity. Returns `true` if it was present.
    pub fn remove(&self, listener: &Arc<dyn RegistryPartListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|registered| !Arc::ptr_eq(registered, listener));
        listeners.len() != before
    }

    /// Notifies every listener registered at the time of the call.
    pub fn notify(&self, event: &RegistryPartEvent) {
        let snapshot = self.listeners.read().clone();
        for listener in snapshot {
            listener.on_changed(event);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl core::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

/// A source of catalog entries.
pub trait RegistryPart: Send + Sync + 'static {
    /// Registers an entry.
    ///
    /// # Errors
    ///
    /// Returns a `Duplicate*` error if the type, URL path or class is already
    /// registered; the existing entry is left untouched.
    fn add_entry(&self, entry: RegistryEntry) -> Result<Arc<RegistryEntry>, RegistryError>;

    /// Removes the entry for `resource_type`, returning it if present.
    fn remove_entry(&self, resource_type: &str) -> Option<Arc<RegistryEntry>>;

    /// Looks up an entry by resource type.
    fn entry(&self, resource_type: &str) -> Option<Arc<RegistryEntry>>;

    /// Looks up the entry backed by exactly `class`.
    fn entry_for_class(&self, class: ResourceClass) -> Option<Arc<RegistryEntry>>;

    /// Looks up an entry by URL path.
    fn entry_by_path(&self, path: &str) -> Option<Arc<RegistryEntry>>;

    /// Returns a snapshot of all entries.
    fn resources(&self) -> Vec<Arc<RegistryEntry>>;

    /// The listeners of this part.
    fn listeners(&self) -> &ListenerSet;

    /// Returns `true` if an entry for `resource_type` exists.
    fn has_entry(&self, resource_type: &str) -> bool {
        self.entry(resource_type).is_some()
    }

    /// Returns `true` if an entry backed by exactly `class` exists.
    fn has_entry_for_class(&self, class: ResourceClass) -> bool {
        self.entry_for_class(class).is_some()
    }

    /// Registers a listener.
    fn add_listener(&self, listener: Arc<dyn RegistryPartListener>) {
        self.listeners().add(listener);
    }

    /// Unregisters a listener. Returns `true` if it was registered.
    fn remove_listener(&self, listener: &Arc<dyn RegistryPartListener>) -> bool {
        self.listeners().remove(listener)
    }
}

#[derive(Default)]
struct PartState {
    by_type: IndexMap<String, Arc<RegistryEntry>>,
    by_path: HashMap<String, Arc<RegistryEntry>>,
    by_class: HashMap<TypeId, Arc<RegistryEntry>>,
}

/// A registry part holding locally defined entries.
///
/// # Example
///
/// ```
/// use apiary_registry::class::ResourceModel;
/// use apiary_registry::entry::RegistryEntry;
/// use apiary_registry::information::ResourceInformation;
/// use apiary_registry::part::{DefaultRegistryPart, RegistryPart};
///
/// #[derive(Default)]
/// struct Tag;
/// impl ResourceModel for Tag {}
///
/// let part = DefaultRegistryPart::new();
/// part.add_entry(RegistryEntry::new(ResourceInformation::builder::<Tag>("tags").build()))
///     .unwrap();
/// assert!(part.has_entry("tags"));
/// assert!(part.add_entry(RegistryEntry::new(ResourceInformation::builder::<Tag>("tags").build())).is_err());
/// ```
#[derive(Default)]
pub struct DefaultRegistryPart {
    state: RwLock<PartState>,
    listeners: ListenerSet,
}

impl DefaultRegistryPart {
    /// Creates an empty part.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryPart for DefaultRegistryPart {
    fn add_entry(&self, entry: RegistryEntry) -> Result<Arc<RegistryEntry>, RegistryError> {
        let entry = Arc::new(entry);
        let information = entry.resource_information();
        let resource_type = information.resource_type().to_string();
        {
            let mut state = self.state.write();
            if state.by_type.contains_key(&resource_type) {
                return Err(RegistryError::DuplicateResourceType(resource_type));
            }
            if state.by_path.contains_key(information.resource_path()) {
                return Err(RegistryError::DuplicateResourcePath(
                    information.resource_path().to_string(),
                ));
            }
            let class = information.class();
            if state.by_class.contains_key(&class.type_id()) {
                return Err(RegistryError::DuplicateResourceClass(class.name()));
            }
            state.by_type.insert(resource_type.clone(), Arc::clone(&entry));
            state.by_path.insert(
                information.resource_path().to_string(),
                Arc::clone(&entry),
            );
            state.by_class.insert(class.type_id(), Arc::clone(&entry));
        }
        tracing::debug!(resource_type = %resource_type, "registered resource");
        self.listeners.notify(&RegistryPartEvent::Added(resource_type));
        Ok(entry)
    }

    fn remove_entry(&self, resource_type: &str) -> Option<Arc<RegistryEntry>> {
        let removed = {
            let mut state = self.state.write();
            let entry = state.by_type.shift_remove(resource_type)?;
            let information = entry.resource_information();
            state.by_path.remove(information.resource_path());
            state.by_class.remove(&information.class().type_id());
            entry
        };
        tracing::debug!(resource_type, "removed resource");
        self.listeners
            .notify(&RegistryPartEvent::Removed(resource_type.to_string()));
        Some(removed)
    }

    fn entry(&self, resource_type: &str) -> Option<Arc<RegistryEntry>> {
        self.state.read().by_type.get(resource_type).cloned()
    }

    fn entry_for_class(&self, class: ResourceClass) -> Option<Arc<RegistryEntry>> {
        self.state.read().by_class.get(&class.type_id()).cloned()
    }

    fn entry_by_path(&self, path: &str) -> Option<Arc<RegistryEntry>> {
        self.state.read().by_path.get(path).cloned()
    }

    fn resources(&self) -> Vec<Arc<RegistryEntry>> {
        self.state.read().by_type.values().cloned().collect()
    }

    fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }
}

impl core::fmt::Debug for DefaultRegistryPart {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let types: Vec<String> = self.state.read().by_type.keys().cloned().collect();
        f.debug_struct("DefaultRegistryPart")
            .field("resources", &types)
            .field("listeners", &self.listeners)
            .finish()
    }
}

/// Re-emits constituent events on the composite's own listener set.
struct Forwarder(Arc<ListenerSet>);

impl RegistryPartListener for Forwarder {
    fn on_changed(&self, event: &RegistryPartEvent) {
        self.0.notify(event);
    }
}

/// Merges several parts behind one interface.
///
/// Lookups search the constituents in order. New entries go to the first
/// constituent after a duplicate check across all of them.
///
/// Registrations through the composite are serialized, so the check and the
/// write happen as one step. Entries added to a constituent directly, or
/// through another composite sharing it, bypass that check: constituents
/// must only be written through a single composite.
pub struct CompositeRegistryPart {
    parts: Vec<Arc<dyn RegistryPart>>,
    listeners: Arc<ListenerSet>,
    forwarder: Arc<dyn RegistryPartListener>,
    write: Mutex<()>,
}

impl CompositeRegistryPart {
    /// Creates a composite over `parts` and subscribes to their events.
    #[must_use]
    pub fn new(parts: Vec<Arc<dyn RegistryPart>>) -> Self {
        let listeners = Arc::new(ListenerSet::new());
        let forwarder: Arc<dyn RegistryPartListener> =
            Arc::new(Forwarder(Arc::clone(&listeners)));
        for part in &parts {
            part.add_listener(Arc::clone(&forwarder));
        }
        Self {
            parts,
            listeners,
            forwarder,
            write: Mutex::new(()),
        }
    }

    /// The constituent parts, in lookup order.
    #[must_use]
    pub fn parts(&self) -> &[Arc<dyn RegistryPart>] {
        &self.parts
    }
}

impl Drop for CompositeRegistryPart {
    fn drop(&mut self) {
        for part in &self.parts {
            part.remove_listener(&self.forwarder);
        }
    }
}

impl RegistryPart for CompositeRegistryPart {
    fn add_entry(&self, entry: RegistryEntry) -> Result<Arc<RegistryEntry>, RegistryError> {
        let _write = self.write.lock();
        let information = entry.resource_information();
        if self.has_entry(information.resource_type()) {
            return Err(RegistryError::DuplicateResourceType(
                information.resource_type().to_string(),
            ));
        }
        if self.entry_by_path(information.resource_path()).is_some() {
            return Err(RegistryError::DuplicateResourcePath(
                information.resource_path().to_string(),
            ));
        }
        if self.has_entry_for_class(information.class()) {
            return Err(RegistryError::DuplicateResourceClass(information.class().name()));
        }
        let first = self.parts.first().ok_or(RegistryError::NoWritablePart)?;
        first.add_entry(entry)
    }

    fn remove_entry(&self, resource_type: &str) -> Option<Arc<RegistryEntry>> {
        self.parts
            .iter()
            .find_map(|part| part.remove_entry(resource_type))
    }

    fn entry(&self, resource_type: &str) -> Option<Arc<RegistryEntry>> {
        self.parts.iter().find_map(|part| part.entry(resource_type))
    }

    fn entry_for_class(&self, class: ResourceClass) -> Option<Arc<RegistryEntry>> {
        self.parts.iter().find_map(|part| part.entry_for_class(class))
    }

    fn entry_by_path(&self, path: &str) -> Option<Arc<RegistryEntry>> {
        self.parts.iter().find_map(|part| part.entry_by_path(path))
    }

    fn resources(&self) -> Vec<Arc<RegistryEntry>> {
        self.parts.iter().flat_map(|part| part.resources()).collect()
    }

    fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }
}

impl core::fmt::Debug for CompositeRegistryPart {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompositeRegistryPart")
            .field("parts", &self.parts.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}
