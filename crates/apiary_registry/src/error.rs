//! Registry error types.

/// Errors raised by registry parts and the resource registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No entry is registered for the type name or class.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The object is not a registered or addressable resource.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// An entry with the same resource type is already registered.
    #[error("resource type '{0}' is already registered")]
    DuplicateResourceType(String),

    /// An entry with the same URL path is already registered.
    #[error("resource path '{0}' is already registered")]
    DuplicateResourcePath(String),

    /// An entry backed by the same class is already registered.
    #[error("resource class {0} is already registered")]
    DuplicateResourceClass(&'static str),

    /// A declared super-type is not registered.
    #[error("super-type '{super_type}' of '{resource_type}' is not registered")]
    MissingSuperType {
        /// The type declaring the super-type.
        resource_type: String,
        /// The missing super-type.
        super_type: String,
    },

    /// The super-type chain loops back on itself.
    #[error("super-type chain of '{0}' contains a cycle")]
    SuperTypeCycle(String),

    /// The entry has no repository attached.
    #[error("resource type '{0}' has no repository")]
    MissingRepository(String),

    /// A composite part has no constituent to write to.
    #[error("registry part has no writable constituent")]
    NoWritablePart,
}

impl RegistryError {
    /// Creates a [`NotFound`](Self::NotFound) error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates an [`InvalidResource`](Self::InvalidResource) error.
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource(message.into())
    }
}
