//! Request targets: HTTP methods and resource paths.

use crate::error::UpsertError;
use core::fmt;
use core::str::FromStr;

/// HTTP methods relevant to resource writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// The method name in upper case.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = UpsertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UpsertError::UnsupportedOperation("unknown HTTP method")),
        }
    }
}

/// A collection path (`/posts`) or a resource path (`/posts/1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    resource_path: String,
    id: Option<String>,
}

impl ResourcePath {
    /// Parses a path relative to the API root.
    ///
    /// # Errors
    ///
    /// Returns [`UpsertError::InvalidPath`] unless the path has one or two
    /// non-empty segments.
    ///
    /// # Example
    ///
    /// ```
    /// use apiary_upsert::path::ResourcePath;
    ///
    /// let path = ResourcePath::parse("/posts/1/").unwrap();
    /// assert_eq!(path.resource_path(), "posts");
    /// assert_eq!(path.id(), Some("1"));
    /// assert!(ResourcePath::parse("/posts/1/relationships/author").is_err());
    /// ```
    pub fn parse(path: &str) -> Result<Self, UpsertError> {
        let segments: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect();
        match segments.as_slice() {
            [resource_path] => Ok(Self::collection(*resource_path)),
            [resource_path, id] => Ok(Self::resource(*resource_path, *id)),
            _ => Err(UpsertError::InvalidPath(path.to_string())),
        }
    }

    /// A collection path.
    pub fn collection(resource_path: impl Into<String>) -> Self {
        Self {
            resource_path: resource_path.into(),
            id: None,
        }
    }

    /// A path to the resource `id`.
    pub fn resource(resource_path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_path: resource_path.into(),
            id: Some(id.into()),
        }
    }

    /// The resource path segment.
    #[must_use]
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// The resource id, for resource paths.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns `true` for collection paths.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.id.is_none()
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "/{}/{id}", self.resource_path),
            None => write!(f, "/{}", self.resource_path),
        }
    }
}
