//! Type-erased domain objects.

use crate::class::{ResourceClass, ResourceModel};
use core::any::Any;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::sync::{Arc, Weak};

/// Type-erased storage of a domain instance.
pub(crate) type DynObject = dyn Any + Send + Sync;

/// Shared handle to a materialized domain object.
///
/// Cloning the handle does not clone the object: every clone refers to the
/// same instance, which is what lets a relationship embed an object that was
/// already materialized elsewhere in the batch. Use [`ptr_eq`](Self::ptr_eq)
/// to compare identities.
///
/// The instance itself sits behind a `RwLock`, allowing concurrent readers or
/// a single writer.
///
/// # Example
///
/// ```
/// use apiary_registry::class::ResourceModel;
/// use apiary_registry::object::ResourceObject;
///
/// #[derive(Default)]
/// struct User { name: String }
/// impl ResourceModel for User {}
///
/// let user = ResourceObject::new(User { name: "Ann".into() });
/// let alias = user.clone();
///
/// alias.write::<User>().unwrap().name.push_str(" Lee");
/// assert_eq!(user.read::<User>().unwrap().name, "Ann Lee");
/// assert!(user.ptr_eq(&alias));
/// ```
#[derive(Clone)]
pub struct ResourceObject(Arc<ObjectCell>);

struct ObjectCell {
    class: ResourceClass,
    data: RwLock<Box<DynObject>>,
}

impl ResourceObject {
    /// Wraps a domain value.
    pub fn new<T: ResourceModel>(value: T) -> Self {
        Self::from_boxed(ResourceClass::of::<T>(), Box::new(value))
    }

    /// Wraps an already boxed value. `class` must describe the boxed type.
    pub(crate) fn from_boxed(class: ResourceClass, data: Box<DynObject>) -> Self {
        Self(Arc::new(ObjectCell {
            class,
            data: RwLock::new(data),
        }))
    }

    /// Returns the class of the wrapped value.
    #[must_use]
    pub fn class(&self) -> ResourceClass {
        self.0.class
    }

    /// Returns `true` if the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: ResourceModel>(&self) -> bool {
        self.0.class.is::<T>()
    }

    /// Acquires read access to the value as a `T`.
    ///
    /// Returns `None` if the value is not a `T`.
    #[must_use]
    pub fn read<T: ResourceModel>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.0.data.read(), |data| data.downcast_ref::<T>()).ok()
    }

    /// Acquires write access to the value as a `T`.
    ///
    /// Returns `None` if the value is not a `T`.
    #[must_use]
    pub fn write<T: ResourceModel>(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
        RwLockWriteGuard::try_map(self.0.data.write(), |data| data.downcast_mut::<T>()).ok()
    }

    /// Returns `true` if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Creates a non-owning handle to the same instance.
    #[must_use]
    pub fn downgrade(&self) -> WeakResourceObject {
        WeakResourceObject {
            class: self.0.class,
            cell: Arc::downgrade(&self.0),
        }
    }

    /// Runs `f` with shared access to the erased value.
    pub(crate) fn with_data<R>(&self, f: impl FnOnce(&DynObject) -> R) -> R {
        let guard = self.0.data.read();
        f(&**guard)
    }

    /// Runs `f` with exclusive access to the erased value.
    pub(crate) fn with_data_mut<R>(&self, f: impl FnOnce(&mut DynObject) -> R) -> R {
        let mut guard = self.0.data.write();
        f(&mut **guard)
    }
}

impl core::fmt::Debug for ResourceObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceObject")
            .field("class", &self.0.class.name())
            .field("ptr", &Arc::as_ptr(&self.0))
            .finish()
    }
}

/// Non-owning handle to a [`ResourceObject`].
#[derive(Clone)]
pub struct WeakResourceObject {
    class: ResourceClass,
    cell: Weak<ObjectCell>,
}

impl WeakResourceObject {
    /// Returns the class of the linked value.
    #[must_use]
    pub fn class(&self) -> ResourceClass {
        self.class
    }

    /// Returns an owning handle, or `None` if the instance was dropped.
    #[must_use]
    pub fn upgrade(&self) -> Option<ResourceObject> {
        self.cell.upgrade().map(ResourceObject)
    }

    /// Returns `true` while some owning handle keeps the instance alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl core::fmt::Debug for WeakResourceObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WeakResourceObject")
            .field("class", &self.class.name())
            .field("live", &self.is_live())
            .finish()
    }
}
