//! Registry entries and the persistence collaborator.

use crate::error::RegistryError;
use crate::information::ResourceInformation;
use crate::object::ResourceObject;
use async_trait::async_trait;
use std::sync::Arc;

/// Error raised by a [`ResourceRepository`].
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The backend failed.
    #[error("repository error: {message}")]
    Backend {
        /// Failure description.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend rejected the object.
    #[error("repository rejected {resource}: {message}")]
    Rejected {
        /// Uid or type of the rejected resource.
        resource: String,
        /// Rejection reason.
        message: String,
    },
}

impl RepositoryError {
    /// Creates a [`Backend`](Self::Backend) error without a source.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`Backend`](Self::Backend) error wrapping `source`.
    pub fn backend_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a [`Rejected`](Self::Rejected) error.
    pub fn rejected(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Persistence for one resource type.
///
/// Implementations live outside the framework; the upsert engine only calls
/// them in server mode.
#[async_trait]
pub trait ResourceRepository: Send + Sync + 'static {
    /// Loads the resource with `id`, or `None` if it does not exist.
    ///
    /// The returned handle may be shared with other readers. An update stages
    /// every change before writing to it and only writes once nothing can
    /// fail before [`save`](Self::save).
    async fn find_one(&self, id: &str) -> Result<Option<ResourceObject>, RepositoryError>;

    /// Persists a new resource and returns the stored object.
    async fn create(&self, object: ResourceObject) -> Result<ResourceObject, RepositoryError>;

    /// Persists changes to an existing resource and returns the stored object.
    async fn save(&self, object: ResourceObject) -> Result<ResourceObject, RepositoryError>;
}

/// A catalog record: resource metadata plus its persistence hooks.
#[derive(Clone)]
pub struct RegistryEntry {
    information: Arc<ResourceInformation>,
    repository: Option<Arc<dyn ResourceRepository>>,
}

impl RegistryEntry {
    /// Creates an entry without a repository.
    #[must_use]
    pub fn new(information: ResourceInformation) -> Self {
        Self {
            information: Arc::new(information),
            repository: None,
        }
    }

    /// Attaches a repository.
    #[must_use]
    pub fn with_repository(mut self, repository: impl ResourceRepository) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    /// The resource metadata.
    #[must_use]
    pub fn resource_information(&self) -> &Arc<ResourceInformation> {
        &self.information
    }

    /// Shorthand for the resource type name.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.information.resource_type()
    }

    /// Returns `true` if a repository is attached.
    #[must_use]
    pub fn has_repository(&self) -> bool {
        self.repository.is_some()
    }

    /// The attached repository.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MissingRepository`] if none is attached.
    pub fn repository(&self) -> Result<&Arc<dyn ResourceRepository>, RegistryError> {
        self.repository
            .as_ref()
            .ok_or_else(|| RegistryError::MissingRepository(self.resource_type().to_string()))
    }
}

impl core::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("resource_type", &self.resource_type())
            .field("resource_path", &self.information.resource_path())
            .field("has_repository", &self.has_repository())
            .finish()
    }
}
