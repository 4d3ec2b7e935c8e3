//! Base URL providers.
//!
//! Resource URLs are composed as `{base}/{path}[/{id}]`. The base comes from a
//! [`ServiceUrlProvider`]; a provider returning `None` makes every URL absent.

use core::future::Future;

tokio::task_local! {
    static REQUEST_BASE_URL: String;
}

/// Supplies the service base URL.
pub trait ServiceUrlProvider: Send + Sync + 'static {
    /// The base URL, or `None` if unknown.
    fn url(&self) -> Option<String>;
}

impl<F> ServiceUrlProvider for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn url(&self) -> Option<String> {
        self()
    }
}

/// Always returns the same base URL.
#[derive(Debug, Clone, Default)]
pub struct ConstantUrlProvider {
    url: Option<String>,
}

impl ConstantUrlProvider {
    /// Creates a provider for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// Creates a provider without a base URL.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

impl ServiceUrlProvider for ConstantUrlProvider {
    fn url(&self) -> Option<String> {
        self.url.clone()
    }
}

/// Returns the base URL of the current request.
///
/// Request handling runs inside [`ScopedUrlProvider::scope`]; outside a scope
/// the provider falls back to its configured default.
///
/// # Example
///
/// ```
/// use apiary_registry::url::{ScopedUrlProvider, ServiceUrlProvider};
///
/// let provider = ScopedUrlProvider::new();
/// assert_eq!(provider.url(), None);
///
/// let inside = ScopedUrlProvider::sync_scope("http://tenant-a/api", || provider.url());
/// assert_eq!(inside.as_deref(), Some("http://tenant-a/api"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScopedUrlProvider {
    fallback: Option<String>,
}

impl ScopedUrlProvider {
    /// Creates a provider without fallback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL used outside any request scope.
    #[must_use]
    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback = Some(url.into());
        self
    }

    /// Runs `future` with `url` as the request base URL.
    pub async fn scope<F: Future>(url: impl Into<String>, future: F) -> F::Output {
        REQUEST_BASE_URL.scope(url.into(), future).await
    }

    /// Runs `f` with `url` as the request base URL.
    pub fn sync_scope<R>(url: impl Into<String>, f: impl FnOnce() -> R) -> R {
        REQUEST_BASE_URL.sync_scope(url.into(), f)
    }
}

impl ServiceUrlProvider for ScopedUrlProvider {
    fn url(&self) -> Option<String> {
        REQUEST_BASE_URL
            .try_with(Clone::clone)
            .ok()
            .or_else(|| self.fallback.clone())
    }
}

/// Per-query settings for URL computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    base_url: Option<String>,
}

impl QueryContext {
    /// Creates a context without base URL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// The base URL of the query.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }
}

/// Joins `base` and `path`, dropping trailing slashes from `base`.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}
