#![forbid(unsafe_code)]

//! Subscriber that captures every event a collection emits.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use obslist::{
    ChangeBatch, ChangeEvent, ChangeStream, Element, Event, ObservableCollection, Subscription,
};

/// Records the events delivered to one subscription, in order.
///
/// Dropping the recorder unsubscribes.
pub struct ChangeRecorder<T: Element> {
    events: Rc<RefCell<Vec<ChangeEvent<T>>>>,
    _subscription: Subscription,
}

impl<T: Element> fmt::Debug for ChangeRecorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRecorder")
            .field("events", &self.events.borrow().len())
            .finish()
    }
}

impl<T: Element> ChangeRecorder<T> {
    /// Subscribe to `collection`.
    pub fn attach(collection: &ObservableCollection<T>) -> Self {
        Self::from_stream(&collection.changes())
    }

    /// Subscribe to a change stream.
    pub fn from_stream(stream: &ChangeStream<ChangeBatch<T>>) -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let subscription = stream.subscribe(move |event: &ChangeEvent<T>| {
            sink.borrow_mut().push(event.clone());
        });
        Self {
            events,
            _subscription: subscription,
        }
    }

    /// Every event so far, completion included.
    pub fn events(&self) -> Vec<ChangeEvent<T>> {
        self.events.borrow().clone()
    }

    /// Only the value events.
    pub fn batches(&self) -> Vec<ChangeBatch<T>> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| e.value().cloned())
            .collect()
    }

    /// Value events, flattened into one record list.
    pub fn records(&self) -> ChangeBatch<T> {
        self.batches().into_iter().flatten().collect()
    }

    /// Number of value events.
    pub fn emission_count(&self) -> usize {
        self.events.borrow().iter().filter(|e| e.value().is_some()).count()
    }

    pub fn is_completed(&self) -> bool {
        self.events.borrow().iter().any(Event::is_completed)
    }

    /// Return the batches recorded so far and forget them.
    pub fn take_batches(&self) -> Vec<ChangeBatch<T>> {
        let events = std::mem::take(&mut *self.events.borrow_mut());
        events
            .into_iter()
            .filter_map(|e| match e {
                Event::Next(batch) => Some(batch),
                Event::Completed => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
