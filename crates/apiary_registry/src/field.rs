//! Field descriptors and their accessor table.
//!
//! Each field of a [`ResourceInformation`](crate::information::ResourceInformation)
//! carries type-erased setters built once by the typed builder. Values arrive
//! as `serde_json::Value` and are decoded into the field's declared Rust type
//! when a write is prepared.
//!
//! Every assignment has two steps: `prepare` decodes the value into a
//! [`FieldWrite`] without touching any object, and [`FieldWrite::apply`]
//! stores it. [`FieldWrites`] collects the writes of one resource so they can
//! be applied together once everything decoded and resolved.

use crate::lazy::{Relation, RelationList};
use crate::object::{DynObject, ResourceObject};
use serde_json::Value;
use std::sync::Arc;

pub(crate) type WriteFn = Box<dyn FnOnce(&mut DynObject) -> Result<(), FieldError> + Send>;
pub(crate) type ValueSetter = Arc<dyn Fn(Value) -> Result<FieldWrite, FieldError> + Send + Sync>;
pub(crate) type AnySetter =
    Arc<dyn Fn(&mut DynObject, &str, Value) -> Result<(), FieldError> + Send + Sync>;
pub(crate) type IdGetter = Arc<dyn Fn(&DynObject) -> Option<String> + Send + Sync>;
pub(crate) type IdSetter = Arc<dyn Fn(&str) -> Result<FieldWrite, FieldError> + Send + Sync>;
pub(crate) type OneSetter =
    Arc<dyn Fn(&mut DynObject, Option<Relation>) -> Result<(), FieldError> + Send + Sync>;
pub(crate) type ManySetter =
    Arc<dyn Fn(&mut DynObject, RelationList) -> Result<(), FieldError> + Send + Sync>;
pub(crate) type OneIdSetter =
    Arc<dyn Fn(&mut DynObject, Option<String>) -> Result<(), FieldError> + Send + Sync>;
pub(crate) type ManyIdSetter =
    Arc<dyn Fn(&mut DynObject, Vec<String>) -> Result<(), FieldError> + Send + Sync>;

/// Errors raised while assigning a field.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// The wire value does not decode into the field's type.
    #[error("failed to parse {field}: {source}")]
    Deserialize {
        /// Field name.
        field: String,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The wire id does not parse into the id type.
    #[error("invalid id '{id}' for {field}: {message}")]
    InvalidId {
        /// Field name.
        field: String,
        /// The rejected id.
        id: String,
        /// Parse failure description.
        message: String,
    },

    /// The target object is not of the type the field belongs to.
    #[error("field {field} expects an instance of {expected}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Expected Rust type name.
        expected: &'static str,
    },

    /// A relationship value of the wrong cardinality was assigned.
    #[error("relationship {field} is {expected}")]
    CardinalityMismatch {
        /// Field name.
        field: String,
        /// The field's cardinality.
        expected: Cardinality,
    },
}

pub(crate) fn downcast_target<'a, T: 'static>(
    field: &str,
    target: &'a mut DynObject,
) -> Result<&'a mut T, FieldError> {
    target
        .downcast_mut::<T>()
        .ok_or_else(|| FieldError::TypeMismatch {
            field: field.to_string(),
            expected: core::any::type_name::<T>(),
        })
}

/// A decoded assignment that has not touched any object yet.
pub struct FieldWrite {
    field: String,
    write: WriteFn,
}

impl FieldWrite {
    pub(crate) fn new(
        field: impl Into<String>,
        write: impl FnOnce(&mut DynObject) -> Result<(), FieldError> + Send + 'static,
    ) -> Self {
        Self {
            field: field.into(),
            write: Box::new(write),
        }
    }

    /// Name of the written field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Stores the value in `object`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::TypeMismatch`] if `object` is of another type.
    pub fn apply(self, object: &ResourceObject) -> Result<(), FieldError> {
        object.with_data_mut(self.write)
    }
}

impl core::fmt::Debug for FieldWrite {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FieldWrite")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// Prepared writes for one object, applied in order.
#[derive(Debug, Default)]
pub struct FieldWrites(Vec<FieldWrite>);

impl FieldWrites {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a write.
    pub fn push(&mut self, write: FieldWrite) {
        self.0.push(write);
    }

    /// Moves every write of `other` behind the writes of `self`.
    pub fn append(&mut self, mut other: FieldWrites) {
        self.0.append(&mut other.0);
    }

    /// Number of prepared writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing is prepared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names of the written fields, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(FieldWrite::field)
    }

    /// Applies every write under a single write lock of `object`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::TypeMismatch`] if `object` is of another type.
    /// Writes target one type, so a mismatch fails on the first write.
    pub fn apply(self, object: &ResourceObject) -> Result<(), FieldError> {
        object.with_data_mut(|data| {
            self.0
                .into_iter()
                .try_for_each(|write| (write.write)(data))
        })
    }
}

impl Extend<FieldWrite> for FieldWrites {
    fn extend<I: IntoIterator<Item = FieldWrite>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Which writes a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAccess {
    /// Writable when creating a resource.
    pub postable: bool,
    /// Writable when updating a resource.
    pub patchable: bool,
}

impl FieldAccess {
    /// Writable on create and update.
    pub const FULL: Self = Self {
        postable: true,
        patchable: true,
    };

    /// Writable on create only.
    pub const CREATE_ONLY: Self = Self {
        postable: true,
        patchable: false,
    };

    /// Never writable by clients.
    pub const READ_ONLY: Self = Self {
        postable: false,
        patchable: false,
    };
}

impl Default for FieldAccess {
    fn default() -> Self {
        Self::FULL
    }
}

/// Relationship cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Links at most one resource.
    One,
    /// Links a collection of resources.
    Many,
}

impl core::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::One => f.write_str("to-one"),
            Self::Many => f.write_str("to-many"),
        }
    }
}

/// The identity field.
#[derive(Clone)]
pub struct IdField {
    pub(crate) name: String,
    pub(crate) getter: IdGetter,
    pub(crate) setter: IdSetter,
}

impl IdField {
    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the id of `object` as a string.
    #[must_use]
    pub fn get(&self, object: &ResourceObject) -> Option<String> {
        object.with_data(|data| (self.getter)(data))
    }

    /// Parses `id` into a pending write.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::InvalidId`] if `id` does not parse.
    pub fn prepare(&self, id: &str) -> Result<FieldWrite, FieldError> {
        (self.setter)(id)
    }

    /// Parses `id` and assigns it to `object`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::InvalidId`] if `id` does not parse, or
    /// [`FieldError::TypeMismatch`] if `object` is of another type.
    pub fn assign(&self, object: &ResourceObject, id: &str) -> Result<(), FieldError> {
        self.prepare(id)?.apply(object)
    }
}

/// An attribute, links or meta field: a value decoded from JSON.
#[derive(Clone)]
pub struct ValueField {
    pub(crate) name: String,
    pub(crate) access: FieldAccess,
    pub(crate) setter: ValueSetter,
}

impl ValueField {
    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write access of the field.
    #[must_use]
    pub fn access(&self) -> FieldAccess {
        self.access
    }

    /// Decodes `value` into a pending write.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Deserialize`] if `value` does not decode.
    pub fn prepare(&self, value: Value) -> Result<FieldWrite, FieldError> {
        (self.setter)(value)
    }

    /// Decodes `value` and assigns it to `object`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Deserialize`] if `value` does not decode.
    pub fn assign(&self, object: &ResourceObject, value: Value) -> Result<(), FieldError> {
        self.prepare(value)?.apply(object)
    }
}

#[derive(Clone)]
pub(crate) enum RelationSetter {
    One(OneSetter),
    Many(ManySetter),
}

#[derive(Clone)]
pub(crate) enum RelationIdSetter {
    One(OneIdSetter),
    Many(ManyIdSetter),
}

/// A resolved relationship value ready for assignment.
#[derive(Debug, Clone)]
pub enum RelationValue {
    /// To-one value; `None` clears the relationship.
    One(Option<Relation>),
    /// To-many value.
    Many(RelationList),
}

/// Raw related ids for a relationship's id companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationIds {
    /// To-one id; `None` clears it.
    One(Option<String>),
    /// To-many ids.
    Many(Vec<String>),
}

/// A relationship field.
#[derive(Clone)]
pub struct RelationshipField {
    pub(crate) name: String,
    pub(crate) target_type: String,
    pub(crate) access: FieldAccess,
    pub(crate) setter: RelationSetter,
    pub(crate) id_setter: Option<RelationIdSetter>,
}

impl RelationshipField {
    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared resource type of related resources.
    #[must_use]
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    /// Write access of the field.
    #[must_use]
    pub fn access(&self) -> FieldAccess {
        self.access
    }

    /// The field's cardinality.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        match self.setter {
            RelationSetter::One(_) => Cardinality::One,
            RelationSetter::Many(_) => Cardinality::Many,
        }
    }

    /// Returns `true` if the field has an id companion receiving raw ids.
    #[must_use]
    pub fn has_id_field(&self) -> bool {
        self.id_setter.is_some()
    }

    /// Wraps a resolved relationship value into a pending write.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::CardinalityMismatch`] if the value's shape does
    /// not match the field.
    pub fn prepare(&self, value: RelationValue) -> Result<FieldWrite, FieldError> {
        match (&self.setter, value) {
            (RelationSetter::One(set), RelationValue::One(relation)) => {
                let set = Arc::clone(set);
                Ok(FieldWrite::new(&self.name, move |data: &mut DynObject| {
                    set(data, relation)
                }))
            }
            (RelationSetter::Many(set), RelationValue::Many(relations)) => {
                let set = Arc::clone(set);
                Ok(FieldWrite::new(&self.name, move |data: &mut DynObject| {
                    set(data, relations)
                }))
            }
            _ => Err(self.cardinality_mismatch()),
        }
    }

    /// Wraps raw related ids into a pending write of the id companion, or
    /// `None` if the field has none.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::CardinalityMismatch`] if the ids' shape does not
    /// match the field.
    pub fn prepare_ids(&self, ids: RelationIds) -> Result<Option<FieldWrite>, FieldError> {
        match (&self.id_setter, ids) {
            (None, _) => Ok(None),
            (Some(RelationIdSetter::One(set)), RelationIds::One(id)) => {
                let set = Arc::clone(set);
                Ok(Some(FieldWrite::new(&self.name, move |data: &mut DynObject| {
                    set(data, id)
                })))
            }
            (Some(RelationIdSetter::Many(set)), RelationIds::Many(ids)) => {
                let set = Arc::clone(set);
                Ok(Some(FieldWrite::new(&self.name, move |data: &mut DynObject| {
                    set(data, ids)
                })))
            }
            _ => Err(self.cardinality_mismatch()),
        }
    }

    /// Assigns a resolved relationship value.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::CardinalityMismatch`] if the value's shape does
    /// not match the field.
    pub fn assign(&self, object: &ResourceObject, value: RelationValue) -> Result<(), FieldError> {
        self.prepare(value)?.apply(object)
    }

    /// Assigns raw related ids to the id companion. Does nothing if the field
    /// has none.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::CardinalityMismatch`] if the ids' shape does not
    /// match the field.
    pub fn assign_ids(&self, object: &ResourceObject, ids: RelationIds) -> Result<(), FieldError> {
        match self.prepare_ids(ids)? {
            Some(write) => write.apply(object),
            None => Ok(()),
        }
    }

    fn cardinality_mismatch(&self) -> FieldError {
        FieldError::CardinalityMismatch {
            field: self.name.clone(),
            expected: self.cardinality(),
        }
    }
}

impl core::fmt::Debug for IdField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdField").field("name", &self.name).finish()
    }
}

impl core::fmt::Debug for ValueField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ValueField")
            .field("name", &self.name)
            .field("access", &self.access)
            .finish()
    }
}

impl core::fmt::Debug for RelationshipField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RelationshipField")
            .field("name", &self.name)
            .field("target_type", &self.target_type)
            .field("cardinality", &self.cardinality())
            .field("has_id_field", &self.has_id_field())
            .finish()
    }
}
