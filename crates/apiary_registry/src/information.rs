//! Resource type metadata.
//!
//! [`ResourceInformation`] is the catalog payload of a resource type. It is
//! built once with [`ResourceInformation::builder`], which turns typed setter
//! closures into the erased accessor table used by the upsert engine.

use crate::class::{ResourceClass, ResourceModel};
use crate::field::{
    AnySetter, FieldAccess, FieldError, FieldWrite, IdField, RelationIdSetter, RelationSetter,
    RelationshipField, ValueField, ValueSetter, downcast_target,
};
use crate::lazy::{Relation, RelationList};
use crate::object::{DynObject, ResourceObject};
use core::fmt::Display;
use core::marker::PhantomData;
use core::str::FromStr;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

type Factory = Arc<dyn Fn() -> Box<DynObject> + Send + Sync>;

/// Position of a resource type in its type hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SuperType {
    /// The type has no super-type.
    #[default]
    Root,
    /// The type extends the named resource type.
    Extends(String),
}

/// Metadata of a resource type.
///
/// Immutable once built.
pub struct ResourceInformation {
    resource_type: String,
    resource_path: Option<String>,
    class: ResourceClass,
    super_type: SuperType,
    id_field: Option<IdField>,
    attributes: IndexMap<String, ValueField>,
    any_attribute: Option<AnySetter>,
    relationships: IndexMap<String, RelationshipField>,
    links_field: Option<ValueField>,
    meta_field: Option<ValueField>,
    factory: Factory,
}

impl ResourceInformation {
    /// Starts building metadata for resource type `resource_type`, backed by `T`.
    ///
    /// # Example
    ///
    /// ```
    /// use apiary_registry::class::ResourceModel;
    /// use apiary_registry::information::ResourceInformation;
    /// use apiary_registry::lazy::Relation;
    ///
    /// #[derive(Default)]
    /// struct Post {
    ///     id: u64,
    ///     title: String,
    ///     author: Option<Relation>,
    /// }
    /// impl ResourceModel for Post {}
    ///
    /// let information = ResourceInformation::builder::<Post>("posts")
    ///     .id("id", |post: &Post| Some(post.id), |post, id| post.id = id)
    ///     .attribute("title", |post: &mut Post, title: String| post.title = title)
    ///     .to_one("author", "users", |post: &mut Post, author| post.author = author)
    ///     .build();
    ///
    /// assert_eq!(information.resource_type(), "posts");
    /// assert_eq!(information.attributes().count(), 1);
    /// assert!(information.relationship("author").is_some());
    /// ```
    #[must_use]
    pub fn builder<T: ResourceModel + Default>(
        resource_type: impl Into<String>,
    ) -> ResourceInformationBuilder<T> {
        ResourceInformationBuilder::new(resource_type.into())
    }

    /// The resource type name.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The URL path segment: the configured path, or the type name.
    #[must_use]
    pub fn resource_path(&self) -> &str {
        self.resource_path.as_deref().unwrap_or(&self.resource_type)
    }

    /// The explicitly configured URL path, if any.
    #[must_use]
    pub fn explicit_resource_path(&self) -> Option<&str> {
        self.resource_path.as_deref()
    }

    /// The backing domain class.
    #[must_use]
    pub fn class(&self) -> ResourceClass {
        self.class
    }

    /// Position in the type hierarchy.
    #[must_use]
    pub fn super_type(&self) -> &SuperType {
        &self.super_type
    }

    /// The super-type name, if any.
    #[must_use]
    pub fn super_resource_type(&self) -> Option<&str> {
        match &self.super_type {
            SuperType::Root => None,
            SuperType::Extends(name) => Some(name),
        }
    }

    /// The identity field.
    #[must_use]
    pub fn id_field(&self) -> Option<&IdField> {
        self.id_field.as_ref()
    }

    /// Looks up an attribute field by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&ValueField> {
        self.attributes.get(name)
    }

    /// Attribute fields, in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &ValueField> {
        self.attributes.values()
    }

    /// Returns `true` if unknown attributes are accepted by a catch-all setter.
    #[must_use]
    pub fn has_any_attribute(&self) -> bool {
        self.any_attribute.is_some()
    }

    /// Passes an undeclared attribute to the catch-all setter.
    ///
    /// Returns `Ok(false)` if there is no catch-all setter.
    ///
    /// # Errors
    ///
    /// Returns the setter's error.
    pub fn assign_any_attribute(
        &self,
        object: &ResourceObject,
        name: &str,
        value: Value,
    ) -> Result<bool, FieldError> {
        let Some(write) = self.prepare_any_attribute(name, value) else {
            return Ok(false);
        };
        write.apply(object)?;
        Ok(true)
    }

    /// Wraps an undeclared attribute into a pending write of the catch-all
    /// setter, or `None` if there is none.
    #[must_use]
    pub fn prepare_any_attribute(&self, name: &str, value: Value) -> Option<FieldWrite> {
        let setter = Arc::clone(self.any_attribute.as_ref()?);
        let field = name.to_string();
        Some(FieldWrite::new(name, move |data: &mut DynObject| {
            setter(data, &field, value)
        }))
    }

    /// Looks up a relationship field by name.
    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.get(name)
    }

    /// Relationship fields, in declaration order.
    pub fn relationships(&self) -> impl Iterator<Item = &RelationshipField> {
        self.relationships.values()
    }

    /// The links field.
    #[must_use]
    pub fn links_field(&self) -> Option<&ValueField> {
        self.links_field.as_ref()
    }

    /// The meta field.
    #[must_use]
    pub fn meta_field(&self) -> Option<&ValueField> {
        self.meta_field.as_ref()
    }

    /// Creates a fresh instance of the backing class.
    #[must_use]
    pub fn instantiate(&self) -> ResourceObject {
        ResourceObject::from_boxed(self.class, (self.factory)())
    }

    /// Reads the id of `object` as a string.
    #[must_use]
    pub fn id_of(&self, object: &ResourceObject) -> Option<String> {
        self.id_field.as_ref().and_then(|field| field.get(object))
    }
}

impl core::fmt::Debug for ResourceInformation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceInformation")
            .field("resource_type", &self.resource_type)
            .field("resource_path", &self.resource_path)
            .field("class", &self.class)
            .field("super_type", &self.super_type)
            .field("id_field", &self.id_field)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("relationships", &self.relationships.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder of [`ResourceInformation`]. See [`ResourceInformation::builder`].
///
/// Declaring the same field twice, or configuring a field that was never
/// declared, is a programming error and panics.
pub struct ResourceInformationBuilder<T> {
    information: ResourceInformation,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ResourceModel + Default> ResourceInformationBuilder<T> {
    fn new(resource_type: String) -> Self {
        Self {
            information: ResourceInformation {
                resource_type,
                resource_path: None,
                class: ResourceClass::of::<T>(),
                super_type: SuperType::Root,
                id_field: None,
                attributes: IndexMap::new(),
                any_attribute: None,
                relationships: IndexMap::new(),
                links_field: None,
                meta_field: None,
                factory: Arc::new(|| Box::new(T::default())),
            },
            _marker: PhantomData,
        }
    }

    /// Overrides the URL path segment.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.information.resource_path = Some(path.into());
        self
    }

    /// Declares the super-type.
    #[must_use]
    pub fn super_type(mut self, super_type: impl Into<String>) -> Self {
        self.information.super_type = SuperType::Extends(super_type.into());
        self
    }

    /// Declares the identity field.
    ///
    /// Wire ids are parsed with `I::from_str`; ids read back are formatted with
    /// `Display`.
    #[must_use]
    pub fn id<I>(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&T) -> Option<I> + Send + Sync + 'static,
        set: impl Fn(&mut T, I) + Send + Sync + 'static,
    ) -> Self
    where
        I: FromStr + Display + Send + 'static,
        I::Err: Display,
    {
        let name = name.into();
        let field = name.clone();
        let getter = Arc::new(move |data: &DynObject| {
            data.downcast_ref::<T>()
                .and_then(&get)
                .map(|id| id.to_string())
        });
        let set = Arc::new(set);
        let setter = Arc::new(move |raw: &str| -> Result<FieldWrite, FieldError> {
            let id = raw.parse::<I>().map_err(|err| FieldError::InvalidId {
                field: field.clone(),
                id: raw.to_string(),
                message: err.to_string(),
            })?;
            let set = Arc::clone(&set);
            let target_field = field.clone();
            Ok(FieldWrite::new(&field, move |data: &mut DynObject| {
                set(downcast_target::<T>(&target_field, data)?, id);
                Ok(())
            }))
        });
        self.information.id_field = Some(IdField {
            name,
            getter,
            setter,
        });
        self
    }

    /// Declares an attribute writable on create and update.
    #[must_use]
    pub fn attribute<V: DeserializeOwned + Send + 'static>(
        self,
        name: impl Into<String>,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        self.attribute_with(name, FieldAccess::FULL, set)
    }

    /// Declares an attribute with explicit write access.
    ///
    /// # Panics
    ///
    /// Panics if an attribute with the same name was already declared.
    #[must_use]
    pub fn attribute_with<V: DeserializeOwned + Send + 'static>(
        mut self,
        name: impl Into<String>,
        access: FieldAccess,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        assert!(
            !self.information.attributes.contains_key(&name),
            "attribute '{name}' is already declared on '{}'",
            self.information.resource_type
        );
        let field = ValueField {
            name: name.clone(),
            access,
            setter: value_setter::<T, V>(name.clone(), set),
        };
        self.information.attributes.insert(name, field);
        self
    }

    /// Declares a catch-all setter for undeclared attributes.
    #[must_use]
    pub fn any_attribute(
        mut self,
        set: impl Fn(&mut T, &str, Value) + Send + Sync + 'static,
    ) -> Self {
        self.information.any_attribute = Some(Arc::new(
            move |data: &mut DynObject, name: &str, value: Value| {
                let target = downcast_target::<T>(name, data)?;
                set(target, name, value);
                Ok(())
            },
        ));
        self
    }

    /// Declares a to-one relationship to resources of `target_type`.
    #[must_use]
    pub fn to_one(
        self,
        name: impl Into<String>,
        target_type: impl Into<String>,
        set: impl Fn(&mut T, Option<Relation>) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let field = name.clone();
        let setter = RelationSetter::One(Arc::new(
            move |data: &mut DynObject, relation: Option<Relation>| {
                set(downcast_target::<T>(&field, data)?, relation);
                Ok(())
            },
        ));
        self.relationship(name, target_type.into(), setter)
    }

    /// Declares a to-many relationship to resources of `target_type`.
    #[must_use]
    pub fn to_many(
        self,
        name: impl Into<String>,
        target_type: impl Into<String>,
        set: impl Fn(&mut T, RelationList) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let field = name.clone();
        let setter = RelationSetter::Many(Arc::new(
            move |data: &mut DynObject, relations: RelationList| {
                set(downcast_target::<T>(&field, data)?, relations);
                Ok(())
            },
        ));
        self.relationship(name, target_type.into(), setter)
    }

    /// Adds an id companion to the to-one relationship `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a declared to-one relationship.
    #[must_use]
    pub fn to_one_id(
        mut self,
        name: &str,
        set: impl Fn(&mut T, Option<String>) + Send + Sync + 'static,
    ) -> Self {
        let field = name.to_string();
        let relationship = self.declared_relationship(name);
        assert!(
            matches!(relationship.setter, RelationSetter::One(_)),
            "relationship '{name}' is not to-one"
        );
        relationship.id_setter = Some(RelationIdSetter::One(Arc::new(
            move |data: &mut DynObject, id: Option<String>| {
                set(downcast_target::<T>(&field, data)?, id);
                Ok(())
            },
        )));
        self
    }

    /// Adds an id companion to the to-many relationship `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a declared to-many relationship.
    #[must_use]
    pub fn to_many_ids(
        mut self,
        name: &str,
        set: impl Fn(&mut T, Vec<String>) + Send + Sync + 'static,
    ) -> Self {
        let field = name.to_string();
        let relationship = self.declared_relationship(name);
        assert!(
            matches!(relationship.setter, RelationSetter::Many(_)),
            "relationship '{name}' is not to-many"
        );
        relationship.id_setter = Some(RelationIdSetter::Many(Arc::new(
            move |data: &mut DynObject, ids: Vec<String>| {
                set(downcast_target::<T>(&field, data)?, ids);
                Ok(())
            },
        )));
        self
    }

    /// Changes the write access of a declared attribute or relationship.
    ///
    /// # Panics
    ///
    /// Panics if no field named `name` was declared.
    #[must_use]
    pub fn access(mut self, name: &str, access: FieldAccess) -> Self {
        if let Some(attribute) = self.information.attributes.get_mut(name) {
            attribute.access = access;
        } else if let Some(relationship) = self.information.relationships.get_mut(name) {
            relationship.access = access;
        } else {
            panic!(
                "field '{name}' is not declared on '{}'",
                self.information.resource_type
            );
        }
        self
    }

    /// Declares the field receiving resource links.
    #[must_use]
    pub fn links<L: DeserializeOwned + Send + 'static>(
        mut self,
        name: impl Into<String>,
        set: impl Fn(&mut T, L) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        self.information.links_field = Some(ValueField {
            name: name.clone(),
            access: FieldAccess::FULL,
            setter: value_setter::<T, L>(name, set),
        });
        self
    }

    /// Declares the field receiving resource meta information.
    #[must_use]
    pub fn meta<M: DeserializeOwned + Send + 'static>(
        mut self,
        name: impl Into<String>,
        set: impl Fn(&mut T, M) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        self.information.meta_field = Some(ValueField {
            name: name.clone(),
            access: FieldAccess::FULL,
            setter: value_setter::<T, M>(name, set),
        });
        self
    }

    /// Finishes the metadata.
    #[must_use]
    pub fn build(self) -> ResourceInformation {
        self.information
    }

    fn relationship(mut self, name: String, target_type: String, setter: RelationSetter) -> Self {
        assert!(
            !self.information.relationships.contains_key(&name),
            "relationship '{name}' is already declared on '{}'",
            self.information.resource_type
        );
        self.information.relationships.insert(
            name.clone(),
            RelationshipField {
                name,
                target_type,
                access: FieldAccess::FULL,
                setter,
                id_setter: None,
            },
        );
        self
    }

    fn declared_relationship(&mut self, name: &str) -> &mut RelationshipField {
        let resource_type = &self.information.resource_type;
        self.information
            .relationships
            .get_mut(name)
            .unwrap_or_else(|| panic!("relationship '{name}' is not declared on '{resource_type}'"))
    }
}

fn value_setter<T: ResourceModel, V: DeserializeOwned + Send + 'static>(
    field: String,
    set: impl Fn(&mut T, V) + Send + Sync + 'static,
) -> ValueSetter {
    let set = Arc::new(set);
    Arc::new(move |value: Value| -> Result<FieldWrite, FieldError> {
        let value = serde_json::from_value::<V>(value).map_err(|source| FieldError::Deserialize {
            field: field.clone(),
            source,
        })?;
        let set = Arc::clone(&set);
        let target_field = field.clone();
        Ok(FieldWrite::new(&field, move |data: &mut DynObject| {
            set(downcast_target::<T>(&target_field, data)?, value);
            Ok(())
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::Lazy;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct PostLinks {
        #[serde(rename = "self")]
        self_link: String,
    }

    #[derive(Default)]
    struct Post {
        id: u64,
        title: String,
        views: u32,
        extra: BTreeMap<String, Value>,
        author: Option<Relation>,
        author_id: Option<String>,
        tags: Option<RelationList>,
        links: Option<PostLinks>,
    }
    impl ResourceModel for Post {}

    fn post_information() -> ResourceInformation {
        ResourceInformation::builder::<Post>("posts")
            .path("articles")
            .id("id", |post: &Post| Some(post.id), |post, id| post.id = id)
            .attribute("title", |post: &mut Post, title: String| post.title = title)
            .attribute_with(
                "views",
                FieldAccess::READ_ONLY,
                |post: &mut Post, views: u32| post.views = views,
            )
            .any_attribute(|post: &mut Post, name, value| {
                post.extra.insert(name.to_string(), value);
            })
            .to_one("author", "users", |post: &mut Post, author| post.author = author)
            .to_one_id("author", |post: &mut Post, id| post.author_id = id)
            .to_many("tags", "tags", |post: &mut Post, tags| post.tags = Some(tags))
            .links("links", |post: &mut Post, links: PostLinks| post.links = Some(links))
            .build()
    }

    #[test]
    fn builder_records_metadata() {
        let information = post_information();
        assert_eq!(information.resource_type(), "posts");
        assert_eq!(information.resource_path(), "articles");
        assert_eq!(information.explicit_resource_path(), Some("articles"));
        assert_eq!(information.super_type(), &SuperType::Root);
        assert!(information.class().is::<Post>());

        let attributes: Vec<_> = information.attributes().map(ValueField::name).collect();
        assert_eq!(attributes, vec!["title", "views"]);
        assert_eq!(
            information.attribute("views").map(ValueField::access),
            Some(FieldAccess::READ_ONLY)
        );

        let author = information.relationship("author").unwrap();
        assert_eq!(author.target_type(), "users");
        assert!(author.has_id_field());
        assert!(!information.relationship("tags").unwrap().has_id_field());
    }

    #[test]
    fn path_defaults_to_type() {
        let information = ResourceInformation::builder::<Post>("posts")
            .super_type("documents")
            .build();
        assert_eq!(information.resource_path(), "posts");
        assert_eq!(information.explicit_resource_path(), None);
        assert_eq!(information.super_resource_type(), Some("documents"));
    }

    #[test]
    fn setters_write_through_object() {
        let information = post_information();
        let object = information.instantiate();

        information.id_field().unwrap().assign(&object, "12").unwrap();
        information
            .attribute("title")
            .unwrap()
            .assign(&object, json!("Hello"))
            .unwrap();
        assert!(
            information
                .assign_any_attribute(&object, "mood", json!("sunny"))
                .unwrap()
        );
        information
            .links_field()
            .unwrap()
            .assign(&object, json!({ "self": "http://x/api/articles/12" }))
            .unwrap();

        let post = object.read::<Post>().unwrap();
        assert_eq!(post.id, 12);
        assert_eq!(post.title, "Hello");
        assert_eq!(post.extra.get("mood"), Some(&json!("sunny")));
        assert_eq!(
            post.links.as_ref().map(|links| links.self_link.as_str()),
            Some("http://x/api/articles/12")
        );
        drop(post);

        assert_eq!(information.id_of(&object).as_deref(), Some("12"));
    }

    #[test]
    fn decode_failures_are_typed() {
        let information = post_information();
        let object = information.instantiate();

        let err = information
            .attribute("title")
            .unwrap()
            .assign(&object, json!(5))
            .unwrap_err();
        assert!(matches!(err, FieldError::Deserialize { ref field, .. } if field == "title"));

        let err = information
            .id_field()
            .unwrap()
            .assign(&object, "twelve")
            .unwrap_err();
        assert!(matches!(err, FieldError::InvalidId { ref id, .. } if id == "twelve"));
    }

    #[test]
    fn relationship_assignment_checks_cardinality() {
        let information = post_information();
        let object = information.instantiate();
        let author = information.relationship("author").unwrap();
        let user = information.instantiate();

        author
            .assign(
                &object,
                crate::field::RelationValue::One(Some(Relation::loaded(user.clone()))),
            )
            .unwrap();
        author
            .assign_ids(&object, crate::field::RelationIds::One(Some("9".into())))
            .unwrap();

        let err = author
            .assign(&object, crate::field::RelationValue::Many(Lazy::loaded(vec![])))
            .unwrap_err();
        assert!(matches!(err, FieldError::CardinalityMismatch { .. }));

        let post = object.read::<Post>().unwrap();
        let linked = post.author.as_ref().and_then(Relation::try_get).unwrap();
        assert!(linked.ptr_eq(&user));
        assert_eq!(post.author_id.as_deref(), Some("9"));
    }

    #[test]
    fn prepared_writes_touch_nothing_until_applied() {
        let information = post_information();
        let object = information.instantiate();

        let mut writes = crate::field::FieldWrites::new();
        writes.push(information.attribute("title").unwrap().prepare(json!("Staged")).unwrap());
        writes.push(information.id_field().unwrap().prepare("5").unwrap());
        assert!(information.attribute("title").unwrap().prepare(json!(3)).is_err());
        assert_eq!(writes.fields().collect::<Vec<_>>(), ["title", "id"]);
        assert_eq!(object.read::<Post>().unwrap().title, "");

        writes.apply(&object).unwrap();
        let post = object.read::<Post>().unwrap();
        assert_eq!(post.title, "Staged");
        assert_eq!(post.id, 5);
    }

    #[test]
    fn setter_on_foreign_object_is_rejected() {
        #[derive(Default)]
        struct Other;
        impl ResourceModel for Other {}

        let information = post_information();
        let other = ResourceObject::new(Other);
        let err = information
            .attribute("title")
            .unwrap()
            .assign(&other, json!("x"))
            .unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { .. }));
    }

    #[test]
    #[should_panic(expected = "already declared")]
    fn duplicate_attribute_panics() {
        let _ = ResourceInformation::builder::<Post>("posts")
            .attribute("title", |post: &mut Post, title: String| post.title = title)
            .attribute("title", |post: &mut Post, title: String| post.title = title);
    }

    #[test]
    #[should_panic(expected = "is not to-one")]
    fn id_companion_requires_matching_cardinality() {
        let _ = ResourceInformation::builder::<Post>("posts")
            .to_many("tags", "tags", |post: &mut Post, tags| post.tags = Some(tags))
            .to_one_id("tags", |post: &mut Post, id| post.author_id = id);
    }
}
