#![forbid(unsafe_code)]

//! Element capabilities.
//!
//! A collection only needs two things from its elements:
//!
//! - [`Element`]: identity equality and hashing, so that "contains" and
//!   "duplicate" are well defined and cheap. Elements are cloned handles;
//!   the collection never reconstructs them.
//! - [`UpdateInPlace`] (optional): mutate an element's non-identity state
//!   from a template. Collections of elements without it simply do not
//!   expose [`update`](crate::ObservableCollection::update).
//!
//! [`Shared`] adapts any `T` into a reference-identity element: two
//! `Shared` handles are equal only when they point at the same allocation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

use crate::error::Result;

/// Identity contract for collection elements.
///
/// `Eq`/`Hash` define identity. Blanket-implemented for every type that
/// satisfies the bounds.
pub trait Element: Clone + Eq + Hash + fmt::Debug + 'static {}

impl<T: Clone + Eq + Hash + fmt::Debug + 'static> Element for T {}

/// In-place update capability.
///
/// Implementations must fail with
/// [`CollectionError::UpdateNotApplicable`](crate::CollectionError::UpdateNotApplicable)
/// when `template` does not carry the same identity as `self`, and must not
/// modify `self` in that case. Elements are shared handles, so the update
/// goes through interior mutability.
pub trait UpdateInPlace {
    /// Copy every non-identity field of `template` into `self`.
    fn update_in_place(&self, template: &Self) -> Result<()>;
}

/// Reference-identity handle around an `Rc<T>`.
///
/// Equality and hashing use the pointer, never the value.
pub struct Shared<T: ?Sized>(Rc<T>);

impl<T> Shared<T> {
    /// Allocate a new element with a fresh identity.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self(Rc::new(value))
    }
}

impl<T: ?Sized> Shared<T> {
    /// Whether both handles point at the same element.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}

// Manual Clone: `T` itself need not be Clone.
impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for Shared<T> {}

impl<T: ?Sized> Hash for Shared<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.0) as *const (), state);
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> From<Rc<T>> for Shared<T> {
    fn from(rc: Rc<T>) -> Self {
        Self(rc)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Templates are compared by the wrapped value's own identity notion, not by
/// pointer, since a template is by definition a different allocation.
impl<T: UpdateInPlace + ?Sized> UpdateInPlace for Shared<T> {
    fn update_in_place(&self, template: &Self) -> Result<()> {
        self.0.update_in_place(&template.0)
    }
}
