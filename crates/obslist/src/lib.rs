#![forbid(unsafe_code)]

//! Observable, ordered, duplicate-free collections.
//!
//! This crate provides change-tracking collections for reactive consumers:
//!
//! - [`ObservableCollection`]: an ordered set of identity-compared elements
//!   that publishes every mutation as a batch of [`Change`] records.
//! - [`Change`] / [`AnyChange`]: immutable change records, and their
//!   type-erased form used for nested changes.
//! - [`ChangeChannel`]: the multicast channel records travel on, with RAII
//!   [`Subscription`] guards and exactly-once completion.
//! - Nested observation: per-element subscriptions registered with
//!   [`ObservableCollection::observe`], so that changes inside an element's
//!   own collection surface as `Nested` records on the outer channel.
//!
//! # Architecture
//!
//! Everything is single-threaded (`Rc<RefCell<..>>`). Delivery is
//! synchronous: subscriber callbacks run inside the mutating call.
//!
//! # Invariants
//!
//! 1. Every element appears exactly once; identity is the element's `Eq`/`Hash`.
//! 2. Failed mutations are atomic: no store change, no emission.
//! 3. One logical mutation produces one emission.
//! 4. Emissions from one collection arrive in mutation order.
//! 5. A dropped or closed collection emits `Done` then completes, once.
//!
//! # Example
//!
//! ```
//! use obslist::{Change, ObservableCollection};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let mut names = ObservableCollection::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let seen_clone = Rc::clone(&seen);
//! let _sub = names.subscribe(move |event| {
//!     if let Some(batch) = event.value() {
//!         seen_clone.borrow_mut().push(batch.clone());
//!     }
//! });
//!
//! names.append_all(["ada", "grace"]).unwrap();
//! assert_eq!(
//!     *seen.borrow(),
//!     vec![vec![Change::insert("ada", 0), Change::insert("grace", 1)]]
//! );
//! ```

pub mod change;
pub mod channel;
pub mod collection;
pub mod config;
pub mod element;
pub mod error;
pub mod nested;
pub mod sink;

pub use change::{AnyChange, Change, ChangeType};
pub use channel::{ChangeChannel, ChangeStream, Event, Subscription};
pub use collection::ObservableCollection;
pub use config::CollectionConfig;
pub use element::{Element, Shared, UpdateInPlace};
pub use error::{CollectionError, Result};
pub use nested::ObserverFactory;
pub use sink::{ChangeBatch, ChangeEvent, ChangeSink};
