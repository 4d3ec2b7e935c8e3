//! The resource registry façade.
//!
//! [`ResourceRegistry`] resolves classes and type names to catalog entries,
//! computes base types with a cache, builds canonical resource URLs and
//! forwards change notifications of its root part.
//!
//! # Base-type cache
//!
//! Base types are memoized per type name. Any change reported by the root part
//! clears the cache and bumps its generation; a computation that started
//! before the change never writes its result back. Concurrent computations of
//! the same type are allowed, and the first insert wins so that every caller
//! observes the same `Arc`.

use crate::class::ResourceClass;
use crate::entry::RegistryEntry;
use crate::error::RegistryError;
use crate::information::ResourceInformation;
use crate::object::ResourceObject;
use crate::part::{
    DefaultRegistryPart, ListenerSet, RegistryPart, RegistryPartEvent, RegistryPartListener,
};
use crate::url::{QueryContext, ServiceUrlProvider, join};
use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<String, Arc<ResourceInformation>>,
}

#[derive(Default)]
struct BaseTypeCache {
    state: RwLock<CacheState>,
}

impl BaseTypeCache {
    /// Returns the cached value, or the generation to stamp a new one with.
    fn lookup(&self, resource_type: &str) -> Result<Arc<ResourceInformation>, u64> {
        let state = self.state.read();
        match state.entries.get(resource_type) {
            Some(information) => Ok(Arc::clone(information)),
            None => Err(state.generation),
        }
    }

    fn insert(
        &self,
        resource_type: &str,
        information: Arc<ResourceInformation>,
        generation: u64,
    ) -> Arc<ResourceInformation> {
        let mut state = self.state.write();
        if state.generation != generation {
            return information;
        }
        Arc::clone(
            state
                .entries
                .entry(resource_type.to_string())
                .or_insert(information),
        )
    }

    fn invalidate(&self) {
        let mut state = self.state.write();
        state.generation = state.generation.wrapping_add(1);
        state.entries.clear();
    }
}

struct InvalidatingListener {
    cache: Arc<BaseTypeCache>,
    listeners: Arc<ListenerSet>,
}

impl RegistryPartListener for InvalidatingListener {
    fn on_changed(&self, event: &RegistryPartEvent) {
        self.cache.invalidate();
        tracing::debug!(resource_type = event.resource_type(), "base-type cache invalidated");
        self.listeners.notify(event);
    }
}

/// Resolves classes and type names to catalog entries.
///
/// # Example
///
/// ```
/// use apiary_registry::class::ResourceModel;
/// use apiary_registry::entry::RegistryEntry;
/// use apiary_registry::information::ResourceInformation;
/// use apiary_registry::part::RegistryPart;
/// use apiary_registry::registry::ResourceRegistry;
/// use apiary_registry::url::ConstantUrlProvider;
///
/// #[derive(Default)]
/// struct Post { id: u64 }
/// impl ResourceModel for Post {}
///
/// let registry = ResourceRegistry::local(ConstantUrlProvider::new("http://x/api/"));
/// let information = ResourceInformation::builder::<Post>("posts")
///     .id("id", |post: &Post| Some(post.id), |post, id| post.id = id)
///     .build();
/// registry.add_entry(RegistryEntry::new(information)).unwrap();
///
/// let entry = registry.entry("posts").unwrap();
/// assert_eq!(
///     registry.resource_url(entry.resource_information()).as_deref(),
///     Some("http://x/api/posts")
/// );
/// ```
pub struct ResourceRegistry {
    root: RwLock<Arc<dyn RegistryPart>>,
    base_types: Arc<BaseTypeCache>,
    listeners: Arc<ListenerSet>,
    root_listener: Arc<dyn RegistryPartListener>,
    url_provider: Arc<dyn ServiceUrlProvider>,
}

impl ResourceRegistry {
    /// Creates a registry over `root`.
    pub fn new(root: Arc<dyn RegistryPart>, url_provider: impl ServiceUrlProvider) -> Self {
        let base_types = Arc::new(BaseTypeCache::default());
        let listeners = Arc::new(ListenerSet::new());
        let root_listener: Arc<dyn RegistryPartListener> = Arc::new(InvalidatingListener {
            cache: Arc::clone(&base_types),
            listeners: Arc::clone(&listeners),
        });
        root.add_listener(Arc::clone(&root_listener));
        Self {
            root: RwLock::new(root),
            base_types,
            listeners,
            root_listener,
            url_provider: Arc::new(url_provider),
        }
    }

    /// Creates a registry over a fresh [`DefaultRegistryPart`].
    pub fn local(url_provider: impl ServiceUrlProvider) -> Self {
        Self::new(Arc::new(DefaultRegistryPart::new()), url_provider)
    }

    /// The current root part.
    #[must_use]
    pub fn root_part(&self) -> Arc<dyn RegistryPart> {
        Arc::clone(&self.root.read())
    }

    /// Replaces the root part, moving the change subscription to it.
    pub fn set_root_part(&self, part: Arc<dyn RegistryPart>) {
        part.add_listener(Arc::clone(&self.root_listener));
        let previous = core::mem::replace(&mut *self.root.write(), part);
        previous.remove_listener(&self.root_listener);
        self.base_types.invalidate();
        tracing::debug!("registry root part replaced");
    }

    /// The base URL provider.
    #[must_use]
    pub fn url_provider(&self) -> &Arc<dyn ServiceUrlProvider> {
        &self.url_provider
    }

    /// Finds the entry of `class` or of its nearest registered ancestor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no class in the lineage is
    /// registered.
    pub fn find_entry(&self, class: ResourceClass) -> Result<Arc<RegistryEntry>, RegistryError> {
        self.try_find_entry(class)
            .ok_or_else(|| RegistryError::not_found(class.name()))
    }

    /// Like [`find_entry`](Self::find_entry), returning `None` when nothing is
    /// registered.
    #[must_use]
    pub fn try_find_entry(&self, class: ResourceClass) -> Option<Arc<RegistryEntry>> {
        let root = self.root_part();
        class.lineage().find_map(|candidate| root.entry_for_class(candidate))
    }

    /// Returns the nearest registered class in the lineage of `class`.
    #[must_use]
    pub fn resource_class(&self, class: ResourceClass) -> Option<ResourceClass> {
        let root = self.root_part();
        class
            .lineage()
            .find(|candidate| root.has_entry_for_class(*candidate))
    }

    /// Returns the nearest registered class of `object`.
    #[must_use]
    pub fn resource_class_of(&self, object: &ResourceObject) -> Option<ResourceClass> {
        self.resource_class(object.class())
    }

    /// Returns the root of the super-type chain of `resource_type`.
    ///
    /// Repeated calls return the same `Arc` until the registry changes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `resource_type` is not
    /// registered, [`RegistryError::MissingSuperType`] if a declared super-type
    /// is not registered and [`RegistryError::SuperTypeCycle`] if the chain
    /// loops.
    pub fn base_resource_information(
        &self,
        resource_type: &str,
    ) -> Result<Arc<ResourceInformation>, RegistryError> {
        let generation = match self.base_types.lookup(resource_type) {
            Ok(cached) => return Ok(cached),
            Err(generation) => generation,
        };

        let root = self.root_part();
        let mut current = root
            .entry(resource_type)
            .ok_or_else(|| RegistryError::not_found(resource_type))?;
        let mut visited = HashSet::new();
        visited.insert(resource_type.to_string());

        while let Some(super_type) = current
            .resource_information()
            .super_resource_type()
            .map(str::to_string)
        {
            if !visited.insert(super_type.clone()) {
                return Err(RegistryError::SuperTypeCycle(resource_type.to_string()));
            }
            current = root
                .entry(&super_type)
                .ok_or_else(|| RegistryError::MissingSuperType {
                    resource_type: current.resource_type().to_string(),
                    super_type,
                })?;
        }

        let base = Arc::clone(current.resource_information());
        Ok(self.base_types.insert(resource_type, base, generation))
    }

    /// URL of the collection of `information`, from the provider's base URL.
    #[must_use]
    pub fn resource_url(&self, information: &ResourceInformation) -> Option<String> {
        let base = self.url_provider.url()?;
        Some(join(&base, information.resource_path()))
    }

    /// URL of the collection of `information`, from the query's base URL.
    #[must_use]
    pub fn resource_url_in(
        &self,
        context: &QueryContext,
        information: &ResourceInformation,
    ) -> Option<String> {
        let base = context.base_url()?;
        Some(join(base, information.resource_path()))
    }

    /// URL of `object`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidResource`] if `object` is not a
    /// registered resource or has no id.
    pub fn resource_url_of(&self, object: &ResourceObject) -> Result<Option<String>, RegistryError> {
        let (entry, id) = self.addressable(object)?;
        Ok(self
            .resource_url(entry.resource_information())
            .map(|url| join(&url, &id)))
    }

    /// URL of `object`, from the query's base URL.
    ///
    /// # Errors
    ///
    /// See [`resource_url_of`](Self::resource_url_of).
    pub fn resource_url_of_in(
        &self,
        context: &QueryContext,
        object: &ResourceObject,
    ) -> Result<Option<String>, RegistryError> {
        let (entry, id) = self.addressable(object)?;
        Ok(self
            .resource_url_in(context, entry.resource_information())
            .map(|url| join(&url, &id)))
    }

    /// URL of the collection of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `class` is not registered.
    pub fn resource_url_for(&self, class: ResourceClass) -> Result<Option<String>, RegistryError> {
        let entry = self.find_entry(class)?;
        Ok(self.resource_url(entry.resource_information()))
    }

    /// URL of the collection of `class`, from the query's base URL.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `class` is not registered.
    pub fn resource_url_for_in(
        &self,
        context: &QueryContext,
        class: ResourceClass,
    ) -> Result<Option<String>, RegistryError> {
        let entry = self.find_entry(class)?;
        Ok(self.resource_url_in(context, entry.resource_information()))
    }

    /// URL of the resource of `class` with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `class` is not registered.
    pub fn resource_url_for_id(
        &self,
        class: ResourceClass,
        id: &str,
    ) -> Result<Option<String>, RegistryError> {
        Ok(self.resource_url_for(class)?.map(|url| join(&url, id)))
    }

    /// URL of the resource of `class` with `id`, from the query's base URL.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `class` is not registered.
    pub fn resource_url_for_id_in(
        &self,
        context: &QueryContext,
        class: ResourceClass,
        id: &str,
    ) -> Result<Option<String>, RegistryError> {
        Ok(self
            .resource_url_for_in(context, class)?
            .map(|url| join(&url, id)))
    }

    fn addressable(
        &self,
        object: &ResourceObject,
    ) -> Result<(Arc<RegistryEntry>, String), RegistryError> {
        let entry = self.try_find_entry(object.class()).ok_or_else(|| {
            RegistryError::invalid_resource(format!(
                "{} is not a registered resource",
                object.class().name()
            ))
        })?;
        let id = entry.resource_information().id_of(object).ok_or_else(|| {
            RegistryError::invalid_resource(format!(
                "{} instance has no id",
                entry.resource_type()
            ))
        })?;
        Ok((entry, id))
    }
}

impl RegistryPart for ResourceRegistry {
    fn add_entry(&self, entry: RegistryEntry) -> Result<Arc<RegistryEntry>, RegistryError> {
        self.root_part().add_entry(entry)
    }

    fn remove_entry(&self, resource_type: &str) -> Option<Arc<RegistryEntry>> {
        self.root_part().remove_entry(resource_type)
    }

    fn entry(&self, resource_type: &str) -> Option<Arc<RegistryEntry>> {
        self.root_part().entry(resource_type)
    }

    fn entry_for_class(&self, class: ResourceClass) -> Option<Arc<RegistryEntry>> {
        self.root_part().entry_for_class(class)
    }

    fn entry_by_path(&self, path: &str) -> Option<Arc<RegistryEntry>> {
        self.root_part().entry_by_path(path)
    }

    fn resources(&self) -> Vec<Arc<RegistryEntry>> {
        self.root_part().resources()
    }

    fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }
}

impl Drop for ResourceRegistry {
    fn drop(&mut self) {
        self.root.read().remove_listener(&self.root_listener);
    }
}

impl core::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let types: Vec<String> = self
            .resources()
            .iter()
            .map(|entry| entry.resource_type().to_string())
            .collect();
        f.debug_struct("ResourceRegistry")
            .field("resources", &types)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ResourceModel;
    use crate::url::ConstantUrlProvider;

    #[derive(Default)]
    struct Task {
        id: Option<u32>,
    }
    impl ResourceModel for Task {}

    #[derive(Default)]
    struct SpecialTask {
        id: Option<u32>,
    }
    impl ResourceModel for SpecialTask {
        fn superclass() -> Option<ResourceClass> {
            Some(ResourceClass::of::<Task>())
        }
    }

    #[derive(Default)]
    struct Unregistered;
    impl ResourceModel for Unregistered {}

    fn registry(base: &str) -> ResourceRegistry {
        let registry = ResourceRegistry::local(ConstantUrlProvider::new(base));
        registry
            .add_entry(RegistryEntry::new(
                ResourceInformation::builder::<Task>("tasks")
                    .id("id", |task: &Task| task.id, |task, id| task.id = Some(id))
                    .build(),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn class_lookup_walks_declared_lineage() {
        let registry = registry("http://x/api");
        let entry = registry
            .find_entry(ResourceClass::of::<SpecialTask>())
            .unwrap();
        assert_eq!(entry.resource_type(), "tasks");
        assert_eq!(
            registry.resource_class(ResourceClass::of::<SpecialTask>()),
            Some(ResourceClass::of::<Task>())
        );
        assert!(matches!(
            registry.find_entry(ResourceClass::of::<Unregistered>()),
            Err(RegistryError::NotFound(_))
        ));
        assert!(
            registry
                .try_find_entry(ResourceClass::of::<Unregistered>())
                .is_none()
        );
    }

    #[test]
    fn object_urls_require_registration_and_id() {
        let registry = registry("http://x/api/");
        let task = ResourceObject::new(Task { id: Some(3) });
        assert_eq!(
            registry.resource_url_of(&task).unwrap().as_deref(),
            Some("http://x/api/tasks/3")
        );

        let transient = ResourceObject::new(Task { id: None });
        assert!(matches!(
            registry.resource_url_of(&transient),
            Err(RegistryError::InvalidResource(_))
        ));
        let foreign = ResourceObject::new(Unregistered);
        assert!(matches!(
            registry.resource_url_of(&foreign),
            Err(RegistryError::InvalidResource(_))
        ));
    }

    #[test]
    fn query_context_overrides_base() {
        let registry = registry("http://x/api");
        let context = QueryContext::new().with_base_url("http://tenant/");
        assert_eq!(
            registry
                .resource_url_for_id_in(&context, ResourceClass::of::<Task>(), "5")
                .unwrap()
                .as_deref(),
            Some("http://tenant/tasks/5")
        );
        assert_eq!(
            registry
                .resource_url_for_in(&QueryContext::new(), ResourceClass::of::<Task>())
                .unwrap(),
            None
        );
    }

    #[test]
    fn absent_base_url_gives_no_url() {
        let registry = ResourceRegistry::local(ConstantUrlProvider::none());
        let information = ResourceInformation::builder::<Task>("tasks").build();
        assert_eq!(registry.resource_url(&information), None);
    }

    #[test]
    fn stale_generation_is_not_cached() {
        let cache = BaseTypeCache::default();
        let information = Arc::new(ResourceInformation::builder::<Task>("tasks").build());
        let Err(generation) = cache.lookup("tasks") else {
            panic!("cache should start empty");
        };
        cache.invalidate();
        cache.insert("tasks", Arc::clone(&information), generation);
        assert!(cache.lookup("tasks").is_err());
    }

    #[test]
    fn first_insert_wins() {
        let cache = BaseTypeCache::default();
        let first = Arc::new(ResourceInformation::builder::<Task>("tasks").build());
        let second = Arc::new(ResourceInformation::builder::<Task>("tasks").build());
        let stored = cache.insert("tasks", Arc::clone(&first), 0);
        let raced = cache.insert("tasks", second, 0);
        assert!(Arc::ptr_eq(&stored, &first));
        assert!(Arc::ptr_eq(&raced, &first));
    }
}
