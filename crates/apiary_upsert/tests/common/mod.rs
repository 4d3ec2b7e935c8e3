//! Shared models, registries and collaborators for upsert integration tests.

#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

use apiary_document::uid;
use apiary_registry::prelude::*;
use apiary_upsert::client::ClientResourceUpsert;
use apiary_upsert::proxy::{FetchingProxyFactory, ResourceFetcher};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════════
// MODELS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author: Option<Relation>,
    pub author_id: Option<String>,
    pub editor: Option<Relation>,
    pub parent: Option<Relation>,
    pub tags: Option<RelationList>,
    pub tag_ids: Vec<String>,
    pub links: Option<PostLinks>,
    pub meta: Option<Value>,
    pub extras: IndexMap<String, Value>,
}
impl ResourceModel for Post {}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub posts: Option<RelationList>,
}
impl ResourceModel for User {}

#[derive(Debug, Clone, Default)]
pub struct Tag {
    pub id: String,
    pub label: String,
}
impl ResourceModel for Tag {}

#[derive(Debug, Clone, Default)]
pub struct Task {
    pub id: Option<u64>,
    pub title: String,
}
impl ResourceModel for Task {}

#[derive(Debug, Clone, Default)]
pub struct SpecialTask {
    pub id: Option<u64>,
    pub title: String,
}
impl ResourceModel for SpecialTask {
    fn superclass() -> Option<ResourceClass> {
        Some(ResourceClass::of::<Task>())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Project {
    pub id: String,
    pub lead: Option<Relation>,
}
impl ResourceModel for Project {}

fn non_empty(id: &str) -> Option<String> {
    (!id.is_empty()).then(|| id.to_string())
}

pub fn posts() -> ResourceInformation {
    ResourceInformation::builder::<Post>("posts")
        .id("id", |post: &Post| non_empty(&post.id), |post, id| post.id = id)
        .attribute("title", |post: &mut Post, title: String| post.title = title)
        .attribute_with(
            "slug",
            FieldAccess::CREATE_ONLY,
            |post: &mut Post, slug: String| post.slug = slug,
        )
        .any_attribute(|post: &mut Post, name, value| {
            post.extras.insert(name.to_string(), value);
        })
        .to_one("author", "users", |post: &mut Post, author| post.author = author)
        .to_one_id("author", |post: &mut Post, id| post.author_id = id)
        .to_one("editor", "users", |post: &mut Post, editor| post.editor = editor)
        .to_one("parent", "posts", |post: &mut Post, parent| post.parent = parent)
        .to_many("tags", "tags", |post: &mut Post, tags| post.tags = Some(tags))
        .to_many_ids("tags", |post: &mut Post, ids| post.tag_ids = ids)
        .links("links", |post: &mut Post, links: PostLinks| post.links = Some(links))
        .meta("meta", |post: &mut Post, meta: Value| post.meta = Some(meta))
        .build()
}

pub fn users() -> ResourceInformation {
    ResourceInformation::builder::<User>("users")
        .id("id", |user: &User| non_empty(&user.id), |user, id| user.id = id)
        .attribute("name", |user: &mut User, name: String| user.name = name)
        .to_many("posts", "posts", |user: &mut User, posts| user.posts = Some(posts))
        .build()
}

pub fn tags() -> ResourceInformation {
    ResourceInformation::builder::<Tag>("tags")
        .id("id", |tag: &Tag| non_empty(&tag.id), |tag, id| tag.id = id)
        .attribute("label", |tag: &mut Tag, label: String| tag.label = label)
        .build()
}

pub fn tasks() -> ResourceInformation {
    ResourceInformation::builder::<Task>("tasks")
        .id("id", |task: &Task| task.id, |task, id| task.id = Some(id))
        .attribute("title", |task: &mut Task, title: String| task.title = title)
        .build()
}

pub fn special_tasks() -> ResourceInformation {
    ResourceInformation::builder::<SpecialTask>("specialTasks")
        .path("special-tasks")
        .super_type("tasks")
        .id(
            "id",
            |task: &SpecialTask| task.id,
            |task, id| task.id = Some(id),
        )
        .attribute("title", |task: &mut SpecialTask, title: String| {
            task.title = title;
        })
        .build()
}

pub fn projects() -> ResourceInformation {
    ResourceInformation::builder::<Project>("projects")
        .id("id", |project: &Project| non_empty(&project.id), |project, id| {
            project.id = id;
        })
        .to_one("lead", "tasks", |project: &mut Project, lead| project.lead = lead)
        .build()
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

/// A [`ResourceFetcher`] that records every request.
///
/// `find_one` only knows users; related and collection requests return a fixed
/// user and two tags.
#[derive(Default)]
pub struct RecordingFetcher {
    requests: Mutex<Vec<String>>,
}

impl RecordingFetcher {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn record(&self, request: String) {
        self.requests.lock().push(request);
    }
}

#[async_trait]
impl ResourceFetcher for RecordingFetcher {
    async fn find_one(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<ResourceObject>, LoadError> {
        self.record(uid(resource_type, id));
        Ok((resource_type == "users").then(|| {
            ResourceObject::new(User {
                id: id.to_string(),
                name: format!("fetched {id}"),
                posts: None,
            })
        }))
    }

    async fn find_related(&self, url: &str) -> Result<Option<ResourceObject>, LoadError> {
        self.record(url.to_string());
        Ok(Some(ResourceObject::new(User {
            id: "42".into(),
            name: "related".into(),
            posts: None,
        })))
    }

    async fn find_collection(&self, url: &str) -> Result<Vec<ResourceObject>, LoadError> {
        self.record(url.to_string());
        Ok(["a", "b"]
            .into_iter()
            .map(|id| {
                ResourceObject::new(Tag {
                    id: id.into(),
                    label: id.to_uppercase(),
                })
            })
            .collect())
    }
}

/// A registry with every test type and no repositories.
pub fn client_registry() -> Arc<ResourceRegistry> {
    let registry = ResourceRegistry::local(ConstantUrlProvider::new("http://localhost/api"));
    for information in [posts(), users(), tags(), tasks(), special_tasks(), projects()] {
        registry.add_entry(RegistryEntry::new(information)).unwrap();
    }
    Arc::new(registry)
}

/// A client engine and the fetcher behind its proxies.
pub fn client() -> (ClientResourceUpsert, Arc<RecordingFetcher>) {
    let fetcher = Arc::new(RecordingFetcher::default());
    let upsert = ClientResourceUpsert::new(
        client_registry(),
        FetchingProxyFactory::shared(Arc::clone(&fetcher)),
    );
    (upsert, fetcher)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

/// An in-memory repository.
///
/// Rows are stored by value; `find_one` hands out a fresh object per call, so
/// a failed update never touches stored state.
pub struct MemoryRepository<T> {
    state: Arc<RepositoryState<T>>,
}

struct RepositoryState<T> {
    rows: Mutex<IndexMap<String, T>>,
    calls: Mutex<Vec<String>>,
    id_of: fn(&T) -> String,
}

impl<T> Clone for MemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: ResourceModel + Clone> MemoryRepository<T> {
    pub fn new(id_of: fn(&T) -> String) -> Self {
        Self {
            state: Arc::new(RepositoryState {
                rows: Mutex::new(IndexMap::new()),
                calls: Mutex::new(Vec::new()),
                id_of,
            }),
        }
    }

    pub fn seed(&self, row: T) {
        let id = (self.state.id_of)(&row);
        self.state.rows.lock().insert(id, row);
    }

    pub fn row(&self, id: &str) -> Option<T> {
        self.state.rows.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.rows.lock().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().clone()
    }

    fn store(&self, call: &str, object: &ResourceObject) -> Result<String, RepositoryError> {
        let row = object
            .read::<T>()
            .map(|row| row.clone())
            .ok_or_else(|| RepositoryError::rejected(call, "unexpected class"))?;
        let id = (self.state.id_of)(&row);
        self.state.calls.lock().push(format!("{call} {id}"));
        self.state.rows.lock().insert(id.clone(), row);
        Ok(id)
    }
}

#[async_trait]
impl<T: ResourceModel + Clone> ResourceRepository for MemoryRepository<T> {
    async fn find_one(&self, id: &str) -> Result<Option<ResourceObject>, RepositoryError> {
        self.state.calls.lock().push(format!("find_one {id}"));
        Ok(self.row(id).map(ResourceObject::new))
    }

    async fn create(&self, object: ResourceObject) -> Result<ResourceObject, RepositoryError> {
        self.store("create", &object)?;
        Ok(object)
    }

    async fn save(&self, object: ResourceObject) -> Result<ResourceObject, RepositoryError> {
        self.store("save", &object)?;
        Ok(object)
    }
}

/// A repository handing out its stored handles.
///
/// Unlike [`MemoryRepository`], `find_one` returns the live object: any write
/// to it is visible to every other reader at once.
#[derive(Clone, Default)]
pub struct SharedRepository {
    rows: Arc<Mutex<IndexMap<String, ResourceObject>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl SharedRepository {
    pub fn seed(&self, id: &str, object: ResourceObject) -> ResourceObject {
        self.rows.lock().insert(id.to_string(), object.clone());
        object
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ResourceRepository for SharedRepository {
    async fn find_one(&self, id: &str) -> Result<Option<ResourceObject>, RepositoryError> {
        self.calls.lock().push(format!("find_one {id}"));
        Ok(self.rows.lock().get(id).cloned())
    }

    async fn create(&self, object: ResourceObject) -> Result<ResourceObject, RepositoryError> {
        self.calls.lock().push("create".to_string());
        Ok(object)
    }

    async fn save(&self, object: ResourceObject) -> Result<ResourceObject, RepositoryError> {
        self.calls.lock().push("save".to_string());
        Ok(object)
    }
}

/// Repositories behind [`server_registry`].
pub struct Store {
    pub posts: MemoryRepository<Post>,
    pub users: MemoryRepository<User>,
    pub tags: MemoryRepository<Tag>,
    pub tasks: MemoryRepository<Task>,
}

/// A registry whose posts, users, tags and tasks are backed by memory
/// repositories, seeded with user `9` and tag `rust`.
pub fn server_registry() -> (Arc<ResourceRegistry>, Store) {
    let store = Store {
        posts: MemoryRepository::new(|post: &Post| post.id.clone()),
        users: MemoryRepository::new(|user: &User| user.id.clone()),
        tags: MemoryRepository::new(|tag: &Tag| tag.id.clone()),
        tasks: MemoryRepository::new(|task: &Task| task.id.unwrap_or_default().to_string()),
    };
    store.users.seed(User {
        id: "9".into(),
        name: "Ann".into(),
        posts: None,
    });
    store.tags.seed(Tag {
        id: "rust".into(),
        label: "Rust".into(),
    });

    let registry = ResourceRegistry::local(ConstantUrlProvider::new("http://localhost/api"));
    let entries = [
        RegistryEntry::new(posts()).with_repository(store.posts.clone()),
        RegistryEntry::new(users()).with_repository(store.users.clone()),
        RegistryEntry::new(tags()).with_repository(store.tags.clone()),
        RegistryEntry::new(tasks()).with_repository(store.tasks.clone()),
        RegistryEntry::new(special_tasks()),
    ];
    for entry in entries {
        registry.add_entry(entry).unwrap();
    }
    (Arc::new(registry), store)
}
