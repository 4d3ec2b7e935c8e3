//! Error types for the upsert engine.

use apiary_registry::entry::RepositoryError;
use apiary_registry::error::RegistryError;
use apiary_registry::field::FieldError;
use apiary_registry::lazy::LoadError;
use thiserror::Error;

/// Errors raised while upserting a document.
#[derive(Debug, Error)]
pub enum UpsertError {
    /// A type, path or class lookup failed, or an object is not addressable.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The payload does not have the expected shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// A field value could not be assigned.
    #[error("Malformed payload for {resource}: {source}")]
    Field {
        /// Uid or type of the resource being assigned.
        resource: String,
        /// The assignment failure.
        #[source]
        source: FieldError,
    },

    /// A resource identifier is missing or incomplete.
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// The request path is not a resource or collection path.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The payload names a relationship the type does not declare.
    #[error("Unknown relationship '{relationship}' on '{resource_type}'")]
    UnknownRelationship {
        /// Resource type.
        resource_type: String,
        /// Relationship name from the payload.
        relationship: String,
    },

    /// The payload writes a field that is not writable for the operation.
    #[error("Field '{field}' of '{resource_type}' is not writable")]
    ImmutableField {
        /// Resource type.
        resource_type: String,
        /// Field name.
        field: String,
    },

    /// The payload type does not belong to the expected type hierarchy.
    #[error("Type conflict: expected '{expected}', found '{actual}'")]
    TypeConflict {
        /// The expected type.
        expected: String,
        /// The type found in the payload.
        actual: String,
    },

    /// The resource to update does not exist.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// A related resource does not exist.
    #[error("Related resource not found: {0}")]
    RelatedNotFound(String),

    /// The operation is not available in this deployment mode.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// The repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A deferred value failed to load.
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl UpsertError {
    /// Creates a [`MalformedPayload`](Self::MalformedPayload).
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    /// Creates a [`MalformedIdentifier`](Self::MalformedIdentifier).
    pub fn malformed_identifier(message: impl Into<String>) -> Self {
        Self::MalformedIdentifier(message.into())
    }

    /// Creates a [`Field`](Self::Field) error for `resource`.
    pub fn field(resource: impl Into<String>, source: FieldError) -> Self {
        Self::Field {
            resource: resource.into(),
            source,
        }
    }

    /// Returns `true` for errors caused by the payload rather than by lookups
    /// or collaborators.
    #[must_use]
    pub fn is_malformed_payload(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload(_)
                | Self::Field { .. }
                | Self::MalformedIdentifier(_)
                | Self::UnknownRelationship { .. }
                | Self::TypeConflict { .. }
        )
    }
}
