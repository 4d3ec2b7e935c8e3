//! Lazy placeholders for resources that are not part of a batch.
//!
//! A [`ProxyFactory`] builds deferred [`Relation`] and [`RelationList`] values.
//! Building one never performs I/O; the fetch runs on first access through
//! [`Relation::get`] or [`Lazy::get`]. Fetched objects are owned by the
//! relation that loaded them.

use apiary_document::uid;
use apiary_registry::entry::RegistryEntry;
use apiary_registry::lazy::{Lazy, LoadError, Loader, Relation, RelationList};
use apiary_registry::object::ResourceObject;
use async_trait::async_trait;
use std::sync::Arc;

/// Builds lazy placeholders.
pub trait ProxyFactory: Send + Sync + 'static {
    /// A placeholder for resource `id` of `entry`.
    fn create_resource_proxy(&self, entry: &RegistryEntry, id: &str) -> Relation;

    /// A placeholder for the single resource behind the navigation `url`.
    fn create_related_proxy(&self, entry: &RegistryEntry, url: &str) -> Relation;

    /// A placeholder for the collection behind the navigation `url`, whose
    /// elements are resources of `entry`.
    fn create_collection_proxy(&self, entry: &RegistryEntry, url: &str) -> RelationList;
}

/// Client transport used by [`FetchingProxyFactory`].
#[async_trait]
pub trait ResourceFetcher: Send + Sync + 'static {
    /// Fetches resource `id` of `resource_type`, or `None` if it does not
    /// exist.
    async fn find_one(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<ResourceObject>, LoadError>;

    /// Fetches the single resource behind `url`, or `None` if the relationship
    /// is empty.
    async fn find_related(&self, url: &str) -> Result<Option<ResourceObject>, LoadError>;

    /// Fetches the collection behind `url`.
    async fn find_collection(&self, url: &str) -> Result<Vec<ResourceObject>, LoadError>;
}

/// A [`ProxyFactory`] whose placeholders load through a [`ResourceFetcher`].
pub struct FetchingProxyFactory<F> {
    fetcher: Arc<F>,
}

impl<F: ResourceFetcher> FetchingProxyFactory<F> {
    /// Creates a factory over `fetcher`.
    pub fn new(fetcher: F) -> Self {
        Self::shared(Arc::new(fetcher))
    }

    /// Creates a factory over an already shared `fetcher`.
    pub fn shared(fetcher: Arc<F>) -> Self {
        Self { fetcher }
    }

    /// The underlying fetcher.
    #[must_use]
    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }
}

impl<F: ResourceFetcher> ProxyFactory for FetchingProxyFactory<F> {
    fn create_resource_proxy(&self, entry: &RegistryEntry, id: &str) -> Relation {
        Relation::deferred(Arc::new(ReferenceLoader {
            fetcher: Arc::clone(&self.fetcher),
            resource_type: entry.resource_type().to_string(),
            id: id.to_string(),
        }))
    }

    fn create_related_proxy(&self, _entry: &RegistryEntry, url: &str) -> Relation {
        Relation::deferred(Arc::new(RelatedLoader {
            fetcher: Arc::clone(&self.fetcher),
            url: url.to_string(),
        }))
    }

    fn create_collection_proxy(&self, _entry: &RegistryEntry, url: &str) -> RelationList {
        Lazy::deferred(Arc::new(CollectionLoader {
            fetcher: Arc::clone(&self.fetcher),
            url: url.to_string(),
        }))
    }
}

impl<F> core::fmt::Debug for FetchingProxyFactory<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FetchingProxyFactory").finish_non_exhaustive()
    }
}

struct ReferenceLoader<F> {
    fetcher: Arc<F>,
    resource_type: String,
    id: String,
}

#[async_trait]
impl<F: ResourceFetcher> Loader<ResourceObject> for ReferenceLoader<F> {
    async fn load(&self) -> Result<ResourceObject, LoadError> {
        self.fetcher
            .find_one(&self.resource_type, &self.id)
            .await?
            .ok_or_else(|| LoadError::NotFound(self.describe()))
    }

    fn describe(&self) -> String {
        uid(&self.resource_type, &self.id)
    }
}

struct RelatedLoader<F> {
    fetcher: Arc<F>,
    url: String,
}

#[async_trait]
impl<F: ResourceFetcher> Loader<ResourceObject> for RelatedLoader<F> {
    async fn load(&self) -> Result<ResourceObject, LoadError> {
        self.fetcher
            .find_related(&self.url)
            .await?
            .ok_or_else(|| LoadError::NotFound(self.url.clone()))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

struct CollectionLoader<F> {
    fetcher: Arc<F>,
    url: String,
}

#[async_trait]
impl<F: ResourceFetcher> Loader<Vec<Relation>> for CollectionLoader<F> {
    async fn load(&self) -> Result<Vec<Relation>, LoadError> {
        let objects = self.fetcher.find_collection(&self.url).await?;
        Ok(objects.into_iter().map(Relation::loaded).collect())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_registry::class::ResourceModel;
    use apiary_registry::information::ResourceInformation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct User;
    impl ResourceModel for User {}

    #[derive(Default)]
    struct Fetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResourceFetcher for Fetcher {
        async fn find_one(
            &self,
            _resource_type: &str,
            id: &str,
        ) -> Result<Option<ResourceObject>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((id == "9").then(|| ResourceObject::new(User)))
        }

        async fn find_related(&self, _url: &str) -> Result<Option<ResourceObject>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn find_collection(&self, _url: &str) -> Result<Vec<ResourceObject>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ResourceObject::new(User), ResourceObject::new(User)])
        }
    }

    fn users() -> RegistryEntry {
        RegistryEntry::new(ResourceInformation::builder::<User>("users").build())
    }

    #[tokio::test]
    async fn proxies_defer_until_accessed() {
        let factory = FetchingProxyFactory::new(Fetcher::default());
        let entry = users();

        let reference = factory.create_resource_proxy(&entry, "9");
        let collection = factory.create_collection_proxy(&entry, "http://x/api/posts/1/tags");
        assert_eq!(factory.fetcher().calls.load(Ordering::SeqCst), 0);
        assert!(!reference.is_loaded());

        assert!(reference.get().await.unwrap().is::<User>());
        assert_eq!(collection.get().await.unwrap().len(), 2);
        assert_eq!(factory.fetcher().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_targets_load_as_not_found() {
        let factory = FetchingProxyFactory::new(Fetcher::default());
        let entry = users();

        let reference = factory.create_resource_proxy(&entry, "404");
        assert!(matches!(
            reference.get().await,
            Err(LoadError::NotFound(ref target)) if target == "users#404"
        ));

        let related = factory.create_related_proxy(&entry, "http://x/api/posts/1/author");
        assert!(matches!(related.get().await, Err(LoadError::NotFound(_))));
    }
}
