#![forbid(unsafe_code)]

//! Change records.
//!
//! A [`Change<T>`] describes one mutation of a collection of `T`. Records
//! are immutable values; a single logical mutation may produce several of
//! them, which are always emitted together as one batch.
//!
//! # Nested changes
//!
//! An element of type `T` may own its own collection of some other type
//! `U`. Changes inside that inner collection are carried on the outer
//! channel as [`Change::Nested`], whose children are [`AnyChange`] values:
//! type-erased records that expose the change type, index and an opaque
//! object handle without making `Change<T>` generic over `U`. Consumers
//! that know `U` can recover the concrete record with
//! [`AnyChange::downcast_ref`].

use std::any::{Any, type_name};
use std::fmt;
use std::rc::Rc;

use crate::element::Element;
use crate::error::{CollectionError, Result};

/// Kind of a change record, independent of the element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Insert,
    Remove,
    Update,
    /// Too many changes to enumerate; reread the whole collection.
    Reload,
    /// Changes inside an element's own sub-collection.
    Nested,
    /// The collection will emit nothing more.
    Done,
}

/// One mutation of a collection of `T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    /// `object` now lives at `index`.
    Insert { object: T, index: usize },
    /// `object` was removed from `index`.
    Remove { object: T, index: usize },
    /// `object` was mutated in place; it carries the new field values.
    Update { object: T },
    Reload,
    Nested { object: T, changes: Vec<AnyChange> },
    Done,
}

impl<T> Change<T> {
    #[must_use]
    pub fn insert(object: T, index: usize) -> Self {
        Self::Insert { object, index }
    }

    #[must_use]
    pub fn remove(object: T, index: usize) -> Self {
        Self::Remove { object, index }
    }

    #[must_use]
    pub fn update(object: T) -> Self {
        Self::Update { object }
    }

    #[must_use]
    pub fn reload() -> Self {
        Self::Reload
    }

    #[must_use]
    pub fn done() -> Self {
        Self::Done
    }

    /// Build a payload-free marker record.
    ///
    /// Exactly one of `reload` and `done` must be set.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::PreconditionViolation`] when both or
    /// neither flag is set.
    pub fn marker(reload: bool, done: bool) -> Result<Self> {
        match (reload, done) {
            (true, false) => Ok(Self::Reload),
            (false, true) => Ok(Self::Done),
            _ => Err(CollectionError::PreconditionViolation(
                "exactly one of reload and done must be set",
            )),
        }
    }

    /// Wrap the changes of `object`'s sub-collection.
    pub fn nested<U: Element>(object: T, changes: impl IntoIterator<Item = Change<U>>) -> Self {
        Self::Nested {
            object,
            changes: changes.into_iter().map(AnyChange::new).collect(),
        }
    }

    #[must_use]
    pub fn change_type(&self) -> ChangeType {
        match self {
            Self::Insert { .. } => ChangeType::Insert,
            Self::Remove { .. } => ChangeType::Remove,
            Self::Update { .. } => ChangeType::Update,
            Self::Reload => ChangeType::Reload,
            Self::Nested { .. } => ChangeType::Nested,
            Self::Done => ChangeType::Done,
        }
    }

    /// The affected element. `None` for `Reload` and `Done`.
    #[must_use]
    pub fn object(&self) -> Option<&T> {
        match self {
            Self::Insert { object, .. }
            | Self::Remove { object, .. }
            | Self::Update { object }
            | Self::Nested { object, .. } => Some(object),
            Self::Reload | Self::Done => None,
        }
    }

    /// Position for `Insert` and `Remove`; `None` otherwise.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Insert { index, .. } | Self::Remove { index, .. } => Some(*index),
            _ => None,
        }
    }

    #[must_use]
    pub fn nested_changes(&self) -> Option<&[AnyChange]> {
        match self {
            Self::Nested { changes, .. } => Some(changes),
            _ => None,
        }
    }

    /// Re-type the record's object, keeping kind, index and children.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Change<U> {
        match self {
            Self::Insert { object, index } => Change::Insert {
                object: f(object),
                index,
            },
            Self::Remove { object, index } => Change::Remove {
                object: f(object),
                index,
            },
            Self::Update { object } => Change::Update { object: f(object) },
            Self::Reload => Change::Reload,
            Self::Nested { object, changes } => Change::Nested {
                object: f(object),
                changes,
            },
            Self::Done => Change::Done,
        }
    }
}

/// Object-safe view over a `Change<T>` of any element type.
trait ErasedChange: fmt::Debug {
    fn change_type(&self) -> ChangeType;
    fn index(&self) -> Option<usize>;
    fn object(&self) -> Option<&dyn Any>;
    fn nested_changes(&self) -> Option<&[AnyChange]>;
    fn element_type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn ErasedChange) -> bool;
}

impl<T: Element> ErasedChange for Change<T> {
    fn change_type(&self) -> ChangeType {
        Change::change_type(self)
    }

    fn index(&self) -> Option<usize> {
        Change::index(self)
    }

    fn object(&self) -> Option<&dyn Any> {
        Change::object(self).map(|o| o as &dyn Any)
    }

    fn nested_changes(&self) -> Option<&[AnyChange]> {
        Change::nested_changes(self)
    }

    fn element_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn ErasedChange) -> bool {
        other
            .as_any()
            .downcast_ref::<Change<T>>()
            .is_some_and(|other| other == self)
    }
}

/// A change record whose element type has been erased.
///
/// Cheap to clone (shared). Two `AnyChange` values are equal when they wrap
/// records of the same element type that compare equal.
#[derive(Clone)]
pub struct AnyChange(Rc<dyn ErasedChange>);

impl AnyChange {
    pub fn new<U: Element>(change: Change<U>) -> Self {
        Self(Rc::new(change))
    }

    #[must_use]
    pub fn change_type(&self) -> ChangeType {
        self.0.change_type()
    }

    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.0.index()
    }

    /// Opaque handle to the affected element.
    #[must_use]
    pub fn object(&self) -> Option<&dyn Any> {
        self.0.object()
    }

    /// The affected element, if it is a `U`.
    #[must_use]
    pub fn object_as<U: 'static>(&self) -> Option<&U> {
        self.0.object()?.downcast_ref()
    }

    #[must_use]
    pub fn nested_changes(&self) -> Option<&[AnyChange]> {
        self.0.nested_changes()
    }

    /// The concrete record, if its element type is `U`.
    #[must_use]
    pub fn downcast_ref<U: Element>(&self) -> Option<&Change<U>> {
        self.0.as_any().downcast_ref()
    }

    /// Name of the erased element type, for diagnostics.
    #[must_use]
    pub fn element_type_name(&self) -> &'static str {
        self.0.element_type_name()
    }
}

impl<U: Element> From<Change<U>> for AnyChange {
    fn from(change: Change<U>) -> Self {
        Self::new(change)
    }
}

impl PartialEq for AnyChange {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(&*other.0)
    }
}

impl Eq for AnyChange {}

impl fmt::Debug for AnyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}
