#![forbid(unsafe_code)]

//! Nested observation registry.
//!
//! Each registered key owns an observer factory and the subscriptions that
//! factory returned, one per element currently in the collection. The
//! collection drives the lifecycle:
//!
//! - registration runs the factory over every present element,
//! - insertion runs every factory over the new element,
//! - removal drops the element's subscription under every key,
//! - `remove_all` and teardown drop every subscription.
//!
//! # Invariants
//!
//! 1. An element holds a subscription under a key only while it is present
//!    in the collection and the key is registered.
//! 2. Dropping a subscription severs whatever forwarding the factory set up.

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::channel::Subscription;
use crate::element::Element;
use crate::sink::ChangeSink;

/// Factory invoked once per element: subscribe to the element's own change
/// feed and forward it through the sink, or return `None` when the element
/// has nothing to observe.
pub type ObserverFactory<T> = Box<dyn Fn(&ChangeSink<T>, &T) -> Option<Subscription>>;

struct Observation<T> {
    factory: ObserverFactory<T>,
    handles: FxHashMap<T, Subscription>,
}

impl<T: Element> Observation<T> {
    fn attach(&mut self, key: &str, sink: &ChangeSink<T>, element: &T) {
        if let Some(handle) = (self.factory)(sink, element) {
            trace!(key, ?element, "nested observer attached");
            self.handles.insert(element.clone(), handle);
        }
    }
}

/// Registry of nested observations, in registration order.
pub(crate) struct NestedObservers<T> {
    observations: Vec<(String, Observation<T>)>,
}

impl<T> Default for NestedObservers<T> {
    fn default() -> Self {
        Self {
            observations: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for NestedObservers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.observations
                    .iter()
                    .map(|(key, obs)| (key, obs.handles.len())),
            )
            .finish()
    }
}

impl<T: Element> NestedObservers<T> {
    /// Register `factory` under `key`, replacing (and releasing) any previous
    /// registration, then run it over `present`.
    pub(crate) fn observe(
        &mut self,
        key: String,
        factory: ObserverFactory<T>,
        sink: &ChangeSink<T>,
        present: &[T],
    ) {
        // A replaced key keeps its slot; its old handles go first.
        let slot = self.observations.iter().position(|(k, _)| *k == key);
        if let Some(pos) = slot {
            let released = std::mem::take(&mut self.observations[pos].1.handles);
            trace!(key = %key, released = released.len(), "nested observation replaced");
        }
        let mut observation = Observation {
            factory,
            handles: FxHashMap::default(),
        };
        for element in present {
            observation.attach(&key, sink, element);
        }
        trace!(key = %key, attached = observation.handles.len(), "nested observation registered");
        match slot {
            Some(pos) => self.observations[pos] = (key, observation),
            None => self.observations.push((key, observation)),
        }
    }

    /// Drop `key` and every subscription held under it.
    pub(crate) fn remove(&mut self, key: &str) -> bool {
        let Some(pos) = self.observations.iter().position(|(k, _)| k == key) else {
            return false;
        };
        let (_, observation) = self.observations.remove(pos);
        trace!(key, released = observation.handles.len(), "nested observation removed");
        true
    }

    pub(crate) fn attach(&mut self, sink: &ChangeSink<T>, element: &T) {
        for (key, observation) in &mut self.observations {
            observation.attach(key, sink, element);
        }
    }

    pub(crate) fn detach(&mut self, element: &T) {
        for (key, observation) in &mut self.observations {
            if observation.handles.remove(element).is_some() {
                trace!(key = %key, ?element, "nested observer detached");
            }
        }
    }

    /// Drop every per-element subscription; keys stay registered.
    pub(crate) fn release_handles(&mut self) {
        for (_, observation) in &mut self.observations {
            observation.handles.clear();
        }
    }

    /// Drop every subscription and every key.
    pub(crate) fn clear(&mut self) {
        self.observations.clear();
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.observations.iter().map(|(k, _)| k.as_str())
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.observations.iter().any(|(k, _)| k == key)
    }

    /// Number of elements holding a subscription under `key`.
    pub(crate) fn handle_count(&self, key: &str) -> Option<usize> {
        self.observations
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, obs)| obs.handles.len())
    }
}
