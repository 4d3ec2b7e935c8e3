//! Lazily resolved values.
//!
//! A [`Lazy`] is either loaded or deferred. Accessing a deferred value through
//! [`Lazy::get`] runs its [`Loader`] once, memoizes the result and from then on
//! behaves as loaded. Construction never performs I/O, so a deferred value can
//! be assigned into a domain object without triggering a fetch.
//!
//! Relationship fields hold [`Relation`] (to-one) and [`RelationList`]
//! (to-many) values. A relation owns the objects it loads but only links
//! objects that belong to the batch it was resolved in: the batch's owner
//! keeps those alive.

use crate::object::{ResourceObject, WeakResourceObject};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A to-many relationship value. Elements are relations themselves, so a list
/// may mix objects known in the batch with deferred references.
pub type RelationList = Lazy<Vec<Relation>>;

/// Error raised while resolving a deferred value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// The loader ran but could not produce the value.
    #[error("failed to load {target}: {message}")]
    Failed {
        /// What was being loaded (e.g. `users#9` or a URL).
        target: String,
        /// Failure description.
        message: String,
    },

    /// The loader ran but the value does not exist.
    #[error("{0} does not exist")]
    NotFound(String),

    /// The linked object was dropped together with the graph owning it.
    #[error("linked {0} was released with its graph")]
    Released(&'static str),
}

impl LoadError {
    /// Creates a [`Failed`](Self::Failed) error.
    pub fn failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Produces a deferred value on first access.
#[async_trait]
pub trait Loader<T>: Send + Sync {
    /// Loads the value.
    async fn load(&self) -> Result<T, LoadError>;

    /// Describes what this loader fetches, for diagnostics.
    fn describe(&self) -> String {
        "deferred value".to_string()
    }
}

/// Borrowed view of a [`Lazy`] value's state.
#[derive(Debug)]
pub enum LazyState<'a, T> {
    /// The value is available.
    Loaded(&'a T),
    /// The value will be fetched on first access.
    Deferred,
}

/// A value that is either loaded or fetched on first access.
///
/// Clones share state: once any clone resolves, all clones observe the loaded
/// value and the loader never runs again.
pub struct Lazy<T>(Arc<LazyInner<T>>);

struct LazyInner<T> {
    cell: OnceCell<T>,
    loader: Option<Arc<dyn Loader<T>>>,
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Send + Sync> Lazy<T> {
    /// Creates a loaded value.
    pub fn loaded(value: T) -> Self {
        Self(Arc::new(LazyInner {
            cell: OnceCell::new_with(Some(value)),
            loader: None,
        }))
    }

    /// Creates a deferred value resolved by `loader`.
    pub fn deferred(loader: Arc<dyn Loader<T>>) -> Self {
        Self(Arc::new(LazyInner {
            cell: OnceCell::new(),
            loader: Some(loader),
        }))
    }

    /// Returns the current state without loading.
    #[must_use]
    pub fn state(&self) -> LazyState<'_, T> {
        match self.0.cell.get() {
            Some(value) => LazyState::Loaded(value),
            None => LazyState::Deferred,
        }
    }

    /// Returns `true` if the value is available without loading.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.0.cell.initialized()
    }

    /// Returns the value if it is already loaded.
    #[must_use]
    pub fn try_get(&self) -> Option<&T> {
        self.0.cell.get()
    }

    /// Returns the value, running the loader on first access.
    ///
    /// Concurrent first accesses wait for a single load. A failed load is not
    /// memoized; the next access retries.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if the value could not be produced.
    pub async fn get(&self) -> Result<&T, LoadError> {
        if let Some(value) = self.0.cell.get() {
            return Ok(value);
        }
        let Some(loader) = self.0.loader.as_ref() else {
            return Err(LoadError::failed("lazy value", "no loader configured"));
        };
        tracing::debug!(loader = %loader.describe(), "resolving deferred value");
        self.0.cell.get_or_try_init(|| loader.load()).await
    }

    /// Returns `true` if both handles share state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: core::fmt::Debug + Send + Sync> core::fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0.cell.get() {
            Some(value) => f.debug_tuple("Loaded").field(value).finish(),
            None => {
                let target = self
                    .0
                    .loader
                    .as_ref()
                    .map_or_else(String::new, |loader| loader.describe());
                f.debug_tuple("Deferred").field(&target).finish()
            }
        }
    }
}

/// A to-one relationship value.
///
/// Loaded and deferred relations own their object. A batch relation, created
/// with [`batch`](Self::batch), only links an object owned elsewhere; it
/// resolves for as long as that owner is alive and fails with
/// [`LoadError::Released`] afterwards. Clones share state.
#[derive(Clone)]
pub struct Relation(Link);

#[derive(Clone)]
enum Link {
    Owned(Lazy<ResourceObject>),
    Batch(WeakResourceObject),
}

impl Relation {
    /// Creates a relation owning `object`.
    #[must_use]
    pub fn loaded(object: ResourceObject) -> Self {
        Self(Link::Owned(Lazy::loaded(object)))
    }

    /// Creates a relation resolved by `loader` on first access.
    #[must_use]
    pub fn deferred(loader: Arc<dyn Loader<ResourceObject>>) -> Self {
        Self(Link::Owned(Lazy::deferred(loader)))
    }

    /// Creates a non-owning link to `object`.
    #[must_use]
    pub fn batch(object: &ResourceObject) -> Self {
        Self(Link::Batch(object.downgrade()))
    }

    /// Returns `true` for links created with [`batch`](Self::batch).
    #[must_use]
    pub fn is_batch(&self) -> bool {
        matches!(self.0, Link::Batch(_))
    }

    /// Returns `true` if the object is available without loading.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        match &self.0 {
            Link::Owned(lazy) => lazy.is_loaded(),
            Link::Batch(weak) => weak.is_live(),
        }
    }

    /// Returns the object if it is available without loading.
    #[must_use]
    pub fn try_get(&self) -> Option<ResourceObject> {
        match &self.0 {
            Link::Owned(lazy) => lazy.try_get().cloned(),
            Link::Batch(weak) => weak.upgrade(),
        }
    }

    /// Returns the object, running the loader on first access.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, or [`LoadError::Released`] if a batch link
    /// outlived the object.
    pub async fn get(&self) -> Result<ResourceObject, LoadError> {
        match &self.0 {
            Link::Owned(lazy) => lazy.get().await.cloned(),
            Link::Batch(weak) => weak
                .upgrade()
                .ok_or_else(|| LoadError::Released(weak.class().name())),
        }
    }
}

impl core::fmt::Debug for Relation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.0 {
            Link::Owned(lazy) => core::fmt::Debug::fmt(lazy, f),
            Link::Batch(weak) => f.debug_tuple("Batch").field(weak).finish(),
        }
    }
}
