//! Example blog client built with Apiary.
//!
//! Registers a small blog model (articles, people, comments), hydrates a
//! response document into domain objects and walks the resulting graph.
//! Authors missing from the document's `included` section become lazy
//! references that are fetched on first access; comments are only linked
//! through a `related` URL and load as a collection.
//!
//! ```text
//! articles#1 ──author──▶ people#9   (included)
//!     │
//!     └──comments──▶ /articles/1/comments   (deferred collection)
//!
//! articles#2 ──author──▶ people#12  (deferred reference)
//! ```

use apiary_document::Document;
use apiary_registry::prelude::*;
use apiary_upsert::error::UpsertError;
use apiary_upsert::proxy::ResourceFetcher;
use async_trait::async_trait;
use std::sync::Arc;

/// A sample response for `GET /articles?include=author`.
pub const SAMPLE_DOCUMENT: &str = r#"{
    "data": [
        {
            "type": "articles",
            "id": "1",
            "attributes": { "title": "Hydrating graphs", "body": "Objects first, links later." },
            "relationships": {
                "author": { "data": { "type": "people", "id": "9" } },
                "comments": { "links": { "related": { "href": "http://localhost:8080/api/articles/1/comments" } } }
            }
        },
        {
            "type": "articles",
            "id": "2",
            "attributes": { "title": "Lazy references" },
            "relationships": {
                "author": { "data": { "type": "people", "id": "12" } }
            }
        }
    ],
    "included": [
        { "type": "people", "id": "9", "attributes": { "name": "Ann" } }
    ]
}"#;

/// Errors raised by the example.
#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    /// The document is not valid JSON:API.
    #[error("invalid document: {0}")]
    Json(#[from] serde_json::Error),

    /// Hydration failed.
    #[error(transparent)]
    Upsert(#[from] UpsertError),

    /// A registry lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A deferred relationship failed to load.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// A blog article.
#[derive(Debug, Default)]
pub struct Article {
    /// Article id.
    pub id: u64,
    /// Headline.
    pub title: String,
    /// Body text.
    pub body: String,
    /// The author.
    pub author: Option<Relation>,
    /// Comments on the article.
    pub comments: Option<RelationList>,
}
impl ResourceModel for Article {}

/// An article or comment author.
#[derive(Debug, Default)]
pub struct Person {
    /// Person id.
    pub id: u64,
    /// Display name.
    pub name: String,
}
impl ResourceModel for Person {}

/// A comment on an article.
#[derive(Debug, Default)]
pub struct Comment {
    /// Comment id.
    pub id: u64,
    /// Comment text.
    pub body: String,
}
impl ResourceModel for Comment {}

fn id_of(id: u64) -> Option<u64> {
    (id != 0).then_some(id)
}

/// Creates the blog registry.
///
/// URLs are built from the request-scoped base URL, falling back to
/// `base_url`.
///
/// # Errors
///
/// Returns an error if a type cannot be registered.
pub fn blog_registry(base_url: Option<String>) -> Result<Arc<ResourceRegistry>, RegistryError> {
    let provider = match base_url {
        Some(url) => ScopedUrlProvider::new().with_fallback(url),
        None => ScopedUrlProvider::new(),
    };
    let registry = ResourceRegistry::local(provider);

    registry.add_entry(RegistryEntry::new(
        ResourceInformation::builder::<Article>("articles")
            .id("id", |article: &Article| id_of(article.id), |article, id| {
                article.id = id;
            })
            .attribute("title", |article: &mut Article, title: String| {
                article.title = title;
            })
            .attribute("body", |article: &mut Article, body: String| {
                article.body = body;
            })
            .to_one("author", "people", |article: &mut Article, author| {
                article.author = author;
            })
            .to_many("comments", "comments", |article: &mut Article, comments| {
                article.comments = Some(comments);
            })
            .build(),
    ))?;
    registry.add_entry(RegistryEntry::new(
        ResourceInformation::builder::<Person>("people")
            .id("id", |person: &Person| id_of(person.id), |person, id| {
                person.id = id;
            })
            .attribute("name", |person: &mut Person, name: String| person.name = name)
            .build(),
    ))?;
    registry.add_entry(RegistryEntry::new(
        ResourceInformation::builder::<Comment>("comments")
            .id("id", |comment: &Comment| id_of(comment.id), |comment, id| {
                comment.id = id;
            })
            .attribute("body", |comment: &mut Comment, body: String| {
                comment.body = body;
            })
            .build(),
    ))?;

    Ok(Arc::new(registry))
}

/// Parses a JSON:API document.
///
/// # Errors
///
/// Returns [`BlogError::Json`] if `json` is not a valid document.
pub fn parse_document(json: &str) -> Result<Document, BlogError> {
    Ok(serde_json::from_str(json)?)
}

/// An offline transport answering with canned people and comments.
#[derive(Debug, Default)]
pub struct CannedFetcher;

#[async_trait]
impl ResourceFetcher for CannedFetcher {
    async fn find_one(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<ResourceObject>, LoadError> {
        tracing::info!(resource_type, id, "fetching resource");
        if resource_type != "people" {
            return Ok(None);
        }
        let id = id
            .parse()
            .map_err(|_| LoadError::failed(format!("people#{id}"), "non-numeric id"))?;
        Ok(Some(ResourceObject::new(Person {
            id,
            name: format!("Guest {id}"),
        })))
    }

    async fn find_related(&self, url: &str) -> Result<Option<ResourceObject>, LoadError> {
        tracing::info!(url, "fetching related resource");
        Ok(None)
    }

    async fn find_collection(&self, url: &str) -> Result<Vec<ResourceObject>, LoadError> {
        tracing::info!(url, "fetching related collection");
        Ok(vec![ResourceObject::new(Comment {
            id: 1,
            body: "Nice write-up".into(),
        })])
    }
}

/// Describes an article, loading its author and comments if needed.
///
/// # Errors
///
/// Returns an error if the object is not an article or a deferred
/// relationship fails to load.
pub async fn describe_article(
    registry: &ResourceRegistry,
    article: &ResourceObject,
) -> Result<String, BlogError> {
    let (title, author, comments) = {
        let data = article
            .read::<Article>()
            .ok_or_else(|| RegistryError::invalid_resource("not an article"))?;
        (data.title.clone(), data.author.clone(), data.comments.clone())
    };

    let author = match author {
        Some(author) => author
            .get()
            .await?
            .read::<Person>()
            .map(|person| person.name.clone())
            .unwrap_or_default(),
        None => "anonymous".to_string(),
    };
    let comments = match comments {
        Some(comments) => comments.get().await?.len(),
        None => 0,
    };
    let url = registry
        .resource_url_of(article)?
        .unwrap_or_else(|| "<no base url>".to_string());

    Ok(format!("{title} by {author} ({comments} comments) <{url}>"))
}
