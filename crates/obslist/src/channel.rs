#![forbid(unsafe_code)]

//! Multicast event channel with exactly-once completion.
//!
//! # Design
//!
//! [`ChangeChannel<V>`] keeps its subscriber list in shared,
//! reference-counted storage (`Rc<RefCell<..>>`). Each subscriber callback is
//! owned by the [`Subscription`] guard handed back to the caller; the channel
//! only holds a `Weak` reference to it. Dropping the guard therefore stops
//! delivery immediately, and the dead entry is pruned on the next delivery.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. [`Event::Completed`] is delivered at most once.
//! 3. After completion, `send` and `complete` are no-ops and new
//!    subscriptions are inert.
//!
//! # Failure Modes
//!
//! - **Re-entrant subscribe**: subscribing from inside a callback is
//!   allowed; the new subscriber is first notified on the following event.
//!   The callback list is snapshotted before delivery so no borrow is held
//!   while callbacks run.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// An event delivered to channel subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<V> {
    /// A value emitted by the channel owner.
    Next(V),
    /// Terminal event; nothing follows it.
    Completed,
}

impl<V> Event<V> {
    /// The carried value, if this is a [`Event::Next`].
    #[must_use]
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Next(v) => Some(v),
            Self::Completed => None,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

type CallbackRc<V> = Rc<dyn Fn(&Event<V>)>;
type CallbackWeak<V> = Weak<dyn Fn(&Event<V>)>;

struct ChannelInner<V> {
    completed: bool,
    /// Subscribers stored as weak references. Dead entries are pruned on delivery.
    subscribers: Vec<CallbackWeak<V>>,
}

/// A push-based multicast channel.
///
/// Cloning a `ChangeChannel` creates a new handle to the **same** channel.
pub struct ChangeChannel<V> {
    inner: Rc<RefCell<ChannelInner<V>>>,
}

impl<V> Clone for ChangeChannel<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for ChangeChannel<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ChangeChannel")
            .field("completed", &inner.completed)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<V: 'static> Default for ChangeChannel<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> ChangeChannel<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ChannelInner {
                completed: false,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Register a callback for every future event.
    ///
    /// Returns a [`Subscription`] guard. Dropping the guard unsubscribes.
    /// On a completed channel the callback is never invoked.
    pub fn subscribe(&self, callback: impl Fn(&Event<V>) + 'static) -> Subscription {
        let strong: CallbackRc<V> = Rc::new(callback);
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.completed {
                inner.subscribers.push(Rc::downgrade(&strong));
            }
        }
        Subscription {
            _guard: Some(Box::new(strong)),
        }
    }

    /// Deliver `value` to every live subscriber. Ignored after completion.
    pub fn send(&self, value: V) {
        self.deliver(&Event::Next(value));
    }

    /// Deliver the terminal event. Only the first call has any effect.
    pub fn complete(&self) {
        self.deliver(&Event::Completed);
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.borrow().completed
    }

    /// Number of registered subscribers (including dropped ones not yet
    /// pruned).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    fn deliver(&self, event: &Event<V>) {
        let callbacks: Vec<CallbackRc<V>> = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                return;
            }
            if event.is_completed() {
                inner.completed = true;
            }
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let live = inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            if inner.completed {
                inner.subscribers.clear();
            }
            live
        };

        for cb in &callbacks {
            cb(event);
        }
    }
}

/// Subscribe-only view of a [`ChangeChannel`].
///
/// Handed out to consumers that must not emit on the channel.
pub struct ChangeStream<V> {
    channel: ChangeChannel<V>,
}

impl<V> Clone for ChangeStream<V> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<V> fmt::Debug for ChangeStream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChangeStream").field(&self.channel).finish()
    }
}

impl<V: 'static> ChangeStream<V> {
    pub(crate) fn new(channel: ChangeChannel<V>) -> Self {
        Self { channel }
    }

    pub fn subscribe(&self, callback: impl Fn(&Event<V>) + 'static) -> Subscription {
        self.channel.subscribe(callback)
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.channel.is_completed()
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping the `Subscription` makes the callback unreachable: the strong
/// `Rc` goes away, so the channel's `Weak` fails to upgrade on the next
/// delivery.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    /// Type-erased strong reference keeping the callback alive.
    _guard: Option<Box<dyn std::any::Any>>,
}

impl Subscription {
    /// A subscription that holds nothing.
    pub fn empty() -> Self {
        Self { _guard: None }
    }

    /// Bundle several subscriptions so they are released together.
    pub fn merge(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let all: Vec<Subscription> = subscriptions.into_iter().collect();
        Self {
            _guard: Some(Box::new(all)),
        }
    }

    /// Stop delivery now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
