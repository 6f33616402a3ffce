#![forbid(unsafe_code)]

//! Observable, ordered, duplicate-free collection.
//!
//! # Design
//!
//! [`ObservableCollection<T>`] keeps its elements in a `Vec` (insertion
//! order) mirrored by a hash set (O(1) identity lookups). Every successful
//! mutation builds its [`Change`] records first and hands them, as one batch,
//! to the shared emission path: sent immediately while idle, buffered while
//! grouping.
//!
//! # Invariants
//!
//! 1. Each element appears exactly once.
//! 2. A failed mutation changes neither the store nor the pending buffer,
//!    and emits nothing.
//! 3. One logical mutation emits exactly one batch.
//! 4. Teardown emits `Done` then completion, exactly once, discarding any
//!    pending group.
//!
//! # Grouping
//!
//! ```text
//!            start
//!   Idle ───────────▶ Grouping
//!    ▲                  │
//!    └──── stop ────────┤  (flush buffer as one batch)
//!    └──── cancel ──────┘  (drop buffer; mutations stay applied)
//! ```
//!
//! # Failure Modes
//!
//! - **Re-entrant mutation**: a subscriber cannot reach `&mut` access to the
//!   collection it is observing, so re-entrant mutation is unrepresentable
//!   through this API. Nested forwarders emit through a [`ChangeSink`],
//!   which never touches the store.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

use crate::change::Change;
use crate::channel::{ChangeStream, Subscription};
use crate::config::CollectionConfig;
use crate::element::{Element, UpdateInPlace};
use crate::error::{CollectionError, Result};
use crate::nested::{NestedObservers, ObserverFactory};
use crate::sink::{ChangeBatch, ChangeEvent, ChangeSink, Emitter};

/// An ordered set of elements that reports every mutation to subscribers.
pub struct ObservableCollection<T: Element> {
    store: Vec<T>,
    members: FxHashSet<T>,
    emitter: Rc<Emitter<T>>,
    nested: NestedObservers<T>,
    config: CollectionConfig,
    torn_down: bool,
}

impl<T: Element> fmt::Debug for ObservableCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCollection")
            .field("label", &self.config.label)
            .field("values", &self.store)
            .field("grouping", &self.is_grouping())
            .field("pending", &self.emitter.pending_len())
            .field("nested", &self.nested)
            .finish()
    }
}

impl<T: Element> Default for ObservableCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> ObservableCollection<T> {
    /// Create an empty collection with the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CollectionConfig::default())
    }

    #[must_use]
    pub fn with_config(config: CollectionConfig) -> Self {
        Self {
            store: Vec::new(),
            members: FxHashSet::default(),
            emitter: Rc::new(Emitter::new()),
            nested: NestedObservers::default(),
            config,
            torn_down: false,
        }
    }

    /// Seed a collection from `values`, in order. Seeding emits nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateElement`] if `values` repeats an
    /// element.
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Result<Self> {
        Self::from_values_with_config(values, CollectionConfig::default())
    }

    /// Seed a collection from `values` with an explicit config.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateElement`] if `values` repeats an
    /// element.
    pub fn from_values_with_config(
        values: impl IntoIterator<Item = T>,
        config: CollectionConfig,
    ) -> Result<Self> {
        let mut collection = Self::with_config(config);
        for value in values {
            if !collection.members.insert(value.clone()) {
                return Err(CollectionError::DuplicateElement);
            }
            collection.store.push(value);
        }
        Ok(collection)
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// The elements in order.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.store
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.store.get(index)
    }

    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.store.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.store.last()
    }

    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.members.contains(value)
    }

    /// Position of `value`, if present.
    #[must_use]
    pub fn index_of(&self, value: &T) -> Option<usize> {
        if !self.members.contains(value) {
            return None;
        }
        self.store.iter().position(|v| v == value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.store.iter()
    }

    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    // ── Subscriptions ──────────────────────────────────────────────────

    /// Subscribe to change batches. Dropping the returned guard unsubscribes.
    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent<T>) + 'static) -> Subscription {
        self.emitter.channel().subscribe(callback)
    }

    /// Subscribe-only handle to the change channel.
    #[must_use]
    pub fn changes(&self) -> ChangeStream<ChangeBatch<T>> {
        ChangeStream::new(self.emitter.channel().clone())
    }

    /// Handle to this collection's emission path.
    #[must_use]
    pub fn sink(&self) -> ChangeSink<T> {
        ChangeSink::new(&self.emitter)
    }

    // ── Mutations ──────────────────────────────────────────────────────

    /// Append one element at the end.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateElement`] if it is already present.
    pub fn append(&mut self, value: T) -> Result<()> {
        self.append_all([value])
    }

    /// Append several elements at the end, in the given order.
    ///
    /// Either every element is inserted or none is. On success one batch of
    /// `Insert` records is emitted; an empty input emits nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateElement`] if any element is
    /// already present or appears twice in `values`.
    pub fn append_all(&mut self, values: impl IntoIterator<Item = T>) -> Result<()> {
        let batch: Vec<T> = values.into_iter().collect();
        if batch.is_empty() {
            return Ok(());
        }

        let mut incoming = FxHashSet::default();
        incoming.reserve(batch.len());
        for value in &batch {
            if self.members.contains(value) || !incoming.insert(value) {
                return Err(CollectionError::DuplicateElement);
            }
        }

        let start = self.store.len();
        let mut changes = Vec::with_capacity(batch.len());
        for (offset, value) in batch.into_iter().enumerate() {
            self.store.push(value.clone());
            self.members.insert(value.clone());
            changes.push(Change::insert(value, start + offset));
        }
        trace!(
            collection = %self.config.label,
            op = "append",
            index = start,
            added = changes.len(),
            count = self.store.len(),
            "mutation"
        );
        self.emit(changes);

        // Forwarded records must follow the element's own `Insert`.
        let sink = self.sink();
        for value in &self.store[start..] {
            self.nested.attach(&sink, value);
        }
        Ok(())
    }

    /// Insert `value` at `index` (`0..=count`).
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`] or
    /// [`CollectionError::DuplicateElement`].
    pub fn insert(&mut self, value: T, index: usize) -> Result<()> {
        if index > self.store.len() {
            return Err(CollectionError::IndexOutOfBounds {
                index,
                count: self.store.len(),
            });
        }
        if self.members.contains(&value) {
            return Err(CollectionError::DuplicateElement);
        }

        self.store.insert(index, value.clone());
        self.members.insert(value.clone());
        trace!(collection = %self.config.label, op = "insert", index, count = self.store.len(), "mutation");
        self.emit(vec![Change::insert(value.clone(), index)]);

        let sink = self.sink();
        self.nested.attach(&sink, &value);
        Ok(())
    }

    /// Remove `value` by identity and return the stored element.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NoSuchElement`] if it is not present.
    pub fn remove(&mut self, value: &T) -> Result<T> {
        let index = self.index_of(value).ok_or(CollectionError::NoSuchElement)?;
        Ok(self.remove_index(index))
    }

    /// Remove the element at `index` (`0..count`) and return it.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`].
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        if index >= self.store.len() {
            return Err(CollectionError::IndexOutOfBounds {
                index,
                count: self.store.len(),
            });
        }
        Ok(self.remove_index(index))
    }

    fn remove_index(&mut self, index: usize) -> T {
        // Detach by identity while the element is still in place.
        self.nested.detach(&self.store[index]);
        let removed = self.store.remove(index);
        self.members.remove(&removed);
        trace!(collection = %self.config.label, op = "remove", index, count = self.store.len(), "mutation");
        self.emit(vec![Change::remove(removed.clone(), index)]);
        removed
    }

    /// Remove every element. Always emits a single `Reload` record.
    ///
    /// Every nested subscription is released before the store is cleared,
    /// but registered observer keys stay: the registry is emptied of
    /// handles, not of keys, so elements added afterwards are observed
    /// again. Only teardown drops the keys themselves.
    pub fn remove_all(&mut self) {
        self.nested.release_handles();
        let removed = self.store.len();
        self.store.clear();
        self.members.clear();
        trace!(collection = %self.config.label, op = "remove_all", removed, "mutation");
        self.emit(vec![Change::reload()]);
    }

    // ── Grouping ───────────────────────────────────────────────────────

    #[must_use]
    pub fn is_grouping(&self) -> bool {
        self.emitter.is_grouping()
    }

    /// Buffer emissions until [`stop_grouping_changes`](Self::stop_grouping_changes)
    /// or [`cancel_grouped_changes`](Self::cancel_grouped_changes).
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::PreconditionViolation`] if already grouping.
    pub fn start_grouping_changes(&mut self) -> Result<()> {
        self.emitter
            .start_grouping()
            .inspect_err(|err| warn!(collection = %self.config.label, %err, "start_grouping_changes"))?;
        debug!(collection = %self.config.label, "grouping started");
        Ok(())
    }

    /// Emit the buffered records as one batch and return to idle.
    ///
    /// An empty buffer still produces an (empty) emission, so consumers can
    /// tell that a grouped operation finished.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::PreconditionViolation`] if not grouping.
    pub fn stop_grouping_changes(&mut self) -> Result<()> {
        let flushed = self
            .emitter
            .stop_grouping()
            .inspect_err(|err| warn!(collection = %self.config.label, %err, "stop_grouping_changes"))?;
        debug!(collection = %self.config.label, flushed, "grouping stopped");
        Ok(())
    }

    /// Drop the buffered records without emitting and return to idle.
    ///
    /// Mutations performed while grouping stay applied; only their
    /// notifications are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::PreconditionViolation`] if not grouping.
    pub fn cancel_grouped_changes(&mut self) -> Result<()> {
        let discarded = self
            .emitter
            .cancel_grouping()
            .inspect_err(|err| warn!(collection = %self.config.label, %err, "cancel_grouped_changes"))?;
        debug!(collection = %self.config.label, discarded, "grouping cancelled");
        Ok(())
    }

    /// Run `f` inside a group. The group is flushed if `f` succeeds and
    /// cancelled if it fails.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or a precondition violation if grouping
    /// was already active (or was ended by `f`).
    pub fn group_changes<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.start_grouping_changes()?;
        match f(self) {
            Ok(value) => {
                self.stop_grouping_changes()?;
                Ok(value)
            }
            Err(err) => {
                if self.is_grouping() {
                    self.cancel_grouped_changes()?;
                }
                Err(err)
            }
        }
    }

    // ── Nested observation ─────────────────────────────────────────────

    /// Register a nested observer under `key`.
    ///
    /// `factory` runs immediately for every present element, and later for
    /// every inserted element. Each returned subscription is held until its
    /// element leaves the collection. Registering an existing key replaces
    /// it, releasing the old subscriptions first.
    pub fn observe<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn(&ChangeSink<T>, &T) -> Option<Subscription> + 'static,
    {
        let factory: ObserverFactory<T> = Box::new(factory);
        let sink = self.sink();
        self.nested.observe(key.into(), factory, &sink, &self.store);
    }

    /// Unregister `key`, releasing every subscription held under it.
    /// Returns `false` if the key was not registered.
    pub fn remove_observer(&mut self, key: &str) -> bool {
        self.nested.remove(key)
    }

    /// Registered keys, in registration order.
    pub fn observed_keys(&self) -> impl Iterator<Item = &str> {
        self.nested.keys()
    }

    #[must_use]
    pub fn is_observing(&self, key: &str) -> bool {
        self.nested.contains_key(key)
    }

    /// Number of elements currently holding a subscription under `key`.
    #[must_use]
    pub fn observed_element_count(&self, key: &str) -> Option<usize> {
        self.nested.handle_count(key)
    }

    // ── Teardown ───────────────────────────────────────────────────────

    /// Tear the collection down: discard any pending group, release nested
    /// subscriptions, emit `Done` and complete the channel.
    ///
    /// Dropping the collection does the same; teardown runs once.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.nested.clear();
        let discarded = self.emitter.shutdown();
        debug!(
            collection = %self.config.label,
            discarded,
            count = self.store.len(),
            "collection closed"
        );
    }

    fn emit(&self, changes: ChangeBatch<T>) {
        self.emitter.emit(changes);
    }
}

impl<T: Element + UpdateInPlace> ObservableCollection<T> {
    /// Update the element at `index` in place from `template` and emit an
    /// `Update` record carrying the mutated element.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`], or whatever the
    /// element's update raises (canonically
    /// [`CollectionError::UpdateNotApplicable`]).
    pub fn update(&mut self, index: usize, template: &T) -> Result<()> {
        let target = self
            .store
            .get(index)
            .cloned()
            .ok_or(CollectionError::IndexOutOfBounds {
                index,
                count: self.store.len(),
            })?;
        target.update_in_place(template)?;
        trace!(collection = %self.config.label, op = "update", index, "mutation");
        self.emit(vec![Change::update(target)]);
        Ok(())
    }
}

impl<T: Element> Drop for ObservableCollection<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<'a, T: Element> IntoIterator for &'a ObservableCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
