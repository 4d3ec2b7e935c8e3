//! Domain classes and their declared lineage.
//!
//! A [`ResourceClass`] describes a Rust domain type together with the parent
//! class it declares through [`ResourceModel::superclass`]. Lineage is always
//! resolved by following these declared links, so the ancestor chain of a
//! class is linear and its walk is deterministic.

use core::any::{Any, TypeId};
use core::hash::{Hash, Hasher};

/// Upper bound on lineage depth; guards against cyclic declarations.
const MAX_LINEAGE_DEPTH: usize = 64;

/// A Rust type that can back a resource.
///
/// # Example
///
/// ```
/// use apiary_registry::class::{ResourceClass, ResourceModel};
///
/// #[derive(Default)]
/// struct Task { name: String }
/// impl ResourceModel for Task {}
///
/// #[derive(Default)]
/// struct UrgentTask { task: Task, deadline: u64 }
/// impl ResourceModel for UrgentTask {
///     fn superclass() -> Option<ResourceClass> {
///         Some(ResourceClass::of::<Task>())
///     }
/// }
///
/// let lineage: Vec<_> = ResourceClass::of::<UrgentTask>().lineage().collect();
/// assert_eq!(lineage, vec![ResourceClass::of::<UrgentTask>(), ResourceClass::of::<Task>()]);
/// ```
pub trait ResourceModel: Any + Send + Sync {
    /// The declared parent class. Root classes return `None`.
    fn superclass() -> Option<ResourceClass>
    where
        Self: Sized,
    {
        None
    }
}

/// Descriptor of a domain class.
///
/// Equality and hashing only consider the underlying [`TypeId`].
#[derive(Clone, Copy)]
pub struct ResourceClass {
    type_id: TypeId,
    name: &'static str,
    superclass: fn() -> Option<ResourceClass>,
}

impl ResourceClass {
    /// Returns the descriptor of `T`.
    #[must_use]
    pub fn of<T: ResourceModel>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
            superclass: T::superclass,
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the Rust type name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared parent class.
    #[must_use]
    pub fn superclass(&self) -> Option<ResourceClass> {
        (self.superclass)()
    }

    /// Returns `true` if this descriptor is the one of `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Iterates over this class and its ancestors, nearest first.
    #[must_use]
    pub fn lineage(self) -> Lineage {
        Lineage {
            next: Some(self),
            remaining: MAX_LINEAGE_DEPTH,
        }
    }
}

impl PartialEq for ResourceClass {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ResourceClass {}

impl Hash for ResourceClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl core::fmt::Debug for ResourceClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("ResourceClass").field(&self.name).finish()
    }
}

/// Iterator over a class lineage. See [`ResourceClass::lineage`].
#[derive(Debug, Clone)]
pub struct Lineage {
    next: Option<ResourceClass>,
    remaining: usize,
}

impl Iterator for Lineage {
    type Item = ResourceClass;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next.take()?;
        self.next = current.superclass();
        Some(current)
    }
}
