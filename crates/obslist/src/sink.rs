#![forbid(unsafe_code)]

//! Emission path shared by a collection and its nested forwarders.
//!
//! Every record a collection produces goes through [`Emitter::emit`], which
//! either appends to the pending buffer (grouping active) or sends the batch
//! on the channel right away. The buffer is an `Option`: `None` means idle,
//! `Some` (even empty) means grouping.
//!
//! [`ChangeSink`] is a weak, cloneable handle to the same path. Nested
//! forwarders hold one so that inner changes are emitted on the outer
//! channel under the outer grouping state, without keeping the outer
//! collection alive.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::change::Change;
use crate::channel::{ChangeChannel, Event};
use crate::element::Element;
use crate::error::{CollectionError, Result};

/// One emission: every record produced by a single logical mutation, or by
/// a whole group.
pub type ChangeBatch<T> = Vec<Change<T>>;

/// Event type delivered to collection subscribers.
pub type ChangeEvent<T> = Event<ChangeBatch<T>>;

pub(crate) struct Emitter<T> {
    channel: ChangeChannel<ChangeBatch<T>>,
    pending: RefCell<Option<ChangeBatch<T>>>,
}

impl<T: Element> Emitter<T> {
    pub(crate) fn new() -> Self {
        Self {
            channel: ChangeChannel::new(),
            pending: RefCell::new(None),
        }
    }

    pub(crate) fn channel(&self) -> &ChangeChannel<ChangeBatch<T>> {
        &self.channel
    }

    pub(crate) fn emit(&self, batch: ChangeBatch<T>) {
        let batch = {
            let mut pending = self.pending.borrow_mut();
            match pending.as_mut() {
                Some(buffer) => {
                    buffer.extend(batch);
                    return;
                }
                None => batch,
            }
        };
        self.channel.send(batch);
    }

    pub(crate) fn is_grouping(&self) -> bool {
        self.pending.borrow().is_some()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.borrow().as_ref().map_or(0, Vec::len)
    }

    pub(crate) fn start_grouping(&self) -> Result<()> {
        let mut pending = self.pending.borrow_mut();
        if pending.is_some() {
            return Err(CollectionError::PreconditionViolation(
                "already grouping changes",
            ));
        }
        *pending = Some(Vec::new());
        Ok(())
    }

    /// Leave grouping and send the buffer, even when empty. Returns the
    /// number of records sent.
    pub(crate) fn stop_grouping(&self) -> Result<usize> {
        let buffer = self
            .pending
            .borrow_mut()
            .take()
            .ok_or(CollectionError::PreconditionViolation("not grouping changes"))?;
        let len = buffer.len();
        self.channel.send(buffer);
        Ok(len)
    }

    /// Leave grouping and drop the buffer. Returns the number of records dropped.
    pub(crate) fn cancel_grouping(&self) -> Result<usize> {
        self.pending
            .borrow_mut()
            .take()
            .map(|buffer| buffer.len())
            .ok_or(CollectionError::PreconditionViolation("not grouping changes"))
    }

    /// Discard pending records, send `Done`, then complete.
    /// Returns the number of discarded records.
    pub(crate) fn shutdown(&self) -> usize {
        let discarded = self.pending.borrow_mut().take().map_or(0, |b| b.len());
        self.channel.send(vec![Change::Done]);
        self.channel.complete();
        discarded
    }
}

/// Weak handle to a collection's emission path.
///
/// Sends are ignored once the collection has been torn down.
pub struct ChangeSink<T> {
    emitter: Weak<Emitter<T>>,
}

impl<T> Clone for ChangeSink<T> {
    fn clone(&self) -> Self {
        Self {
            emitter: Weak::clone(&self.emitter),
        }
    }
}

impl<T> fmt::Debug for ChangeSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSink")
            .field("alive", &(self.emitter.strong_count() > 0))
            .finish()
    }
}

impl<T: Element> ChangeSink<T> {
    pub(crate) fn new(emitter: &Rc<Emitter<T>>) -> Self {
        Self {
            emitter: Rc::downgrade(emitter),
        }
    }

    /// Emit `batch` through the collection, buffered if it is grouping.
    pub fn send(&self, batch: ChangeBatch<T>) {
        if let Some(emitter) = self.emitter.upgrade() {
            emitter.emit(batch);
        }
    }

    /// Emit one `Nested` record wrapping `object` and the erased `changes`.
    pub fn send_nested<U: Element>(&self, object: T, changes: impl IntoIterator<Item = Change<U>>) {
        self.send(vec![Change::nested(object, changes)]);
    }

    /// Whether the collection behind this sink is gone or completed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.emitter
            .upgrade()
            .is_none_or(|emitter| emitter.channel.is_completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(emitter: &Emitter<u32>) -> (Rc<RefCell<Vec<ChangeEvent<u32>>>>, crate::Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = Rc::clone(&log);
        let sub = emitter
            .channel()
            .subscribe(move |e| log_clone.borrow_mut().push(e.clone()));
        (log, sub)
    }

    #[test]
    fn idle_emit_sends_immediately() {
        let emitter = Emitter::new();
        let (log, _sub) = recorded(&emitter);
        emitter.emit(vec![Change::insert(1, 0)]);
        assert_eq!(*log.borrow(), vec![Event::Next(vec![Change::insert(1, 0)])]);
    }

    #[test]
    fn grouping_buffers_until_stop() {
        let emitter = Emitter::new();
        let (log, _sub) = recorded(&emitter);
        emitter.start_grouping().unwrap();
        emitter.emit(vec![Change::insert(1, 0)]);
        emitter.emit(vec![Change::remove(1, 0)]);
        assert!(log.borrow().is_empty());
        assert_eq!(emitter.pending_len(), 2);
        assert_eq!(emitter.stop_grouping().unwrap(), 2);
        assert_eq!(
            *log.borrow(),
            vec![Event::Next(vec![Change::insert(1, 0), Change::remove(1, 0)])]
        );
        assert!(!emitter.is_grouping());
    }

    #[test]
    fn empty_group_still_flushes() {
        let emitter = Emitter::new();
        let (log, _sub) = recorded(&emitter);
        emitter.start_grouping().unwrap();
        assert_eq!(emitter.pending_len(), 0);
        assert_eq!(emitter.stop_grouping().unwrap(), 0);
        assert_eq!(*log.borrow(), vec![Event::Next(vec![])]);
    }

    #[test]
    fn state_machine_misuse() {
        let emitter: Emitter<u32> = Emitter::new();
        assert!(emitter.stop_grouping().unwrap_err().is_precondition());
        assert!(emitter.cancel_grouping().unwrap_err().is_precondition());
        emitter.start_grouping().unwrap();
        assert!(emitter.start_grouping().unwrap_err().is_precondition());
        assert!(emitter.is_grouping());
        assert_eq!(emitter.cancel_grouping().unwrap(), 0);
    }

    #[test]
    fn shutdown_discards_pending_and_completes() {
        let emitter = Emitter::new();
        let (log, _sub) = recorded(&emitter);
        emitter.start_grouping().unwrap();
        emitter.emit(vec![Change::insert(5, 0)]);
        assert_eq!(emitter.shutdown(), 1);
        assert_eq!(
            *log.borrow(),
            vec![Event::Next(vec![Change::Done]), Event::Completed]
        );
    }

    #[test]
    fn sink_is_weak() {
        let emitter = Rc::new(Emitter::new());
        let sink = ChangeSink::new(&emitter);
        let (log, _sub) = recorded(&emitter);
        sink.send(vec![Change::update(3)]);
        assert_eq!(log.borrow().len(), 1);
        assert!(!sink.is_closed());
        drop(emitter);
        assert!(sink.is_closed());
        sink.send(vec![Change::update(4)]);
        assert_eq!(log.borrow().len(), 1);
    }
}
