#![forbid(unsafe_code)]

//! Reference element types for tests and demos.
//!
//! A [`Widget`] owns an observable collection of [`Part`]s and, optionally,
//! an observable collection of tags. Both are reference-identity elements
//! ([`Shared`]) that support in-place updates keyed by their numeric id.
//!
//! [`forward_parts`] and [`forward_tags`] are ready-made observer factories
//! for [`ObservableCollection::observe`]: they subscribe to a widget's inner
//! collection and re-emit each batch as one `Nested` record on the outer
//! collection.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;

use obslist::{
    ChangeSink, CollectionConfig, CollectionError, Event, ObservableCollection, Result, Shared,
    Subscription, UpdateInPlace,
};

pub type PartRef = Shared<Part>;
pub type WidgetRef = Shared<Widget>;

/// Leaf element with a mutable name.
#[derive(Debug)]
pub struct Part {
    id: u64,
    name: RefCell<String>,
}

impl Part {
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> PartRef {
        Shared::new(Self {
            id,
            name: RefCell::new(name.into()),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }
}

impl UpdateInPlace for Part {
    fn update_in_place(&self, template: &Self) -> Result<()> {
        if self.id != template.id {
            return Err(CollectionError::UpdateNotApplicable);
        }
        *self.name.borrow_mut() = template.name();
        Ok(())
    }
}

/// Element that owns nested observable collections.
pub struct Widget {
    id: u64,
    name: RefCell<String>,
    parts: RefCell<ObservableCollection<PartRef>>,
    tags: Option<RefCell<ObservableCollection<String>>>,
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("id", &self.id)
            .field("name", &self.name.try_borrow().ok())
            .field("parts", &self.parts.try_borrow().map(|p| p.count()).ok())
            .field("tagged", &self.tags.is_some())
            .finish()
    }
}

impl Widget {
    /// A widget with parts but no tag collection.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> WidgetRef {
        Self::build(id, name.into(), false)
    }

    /// A widget with both parts and tags.
    #[must_use]
    pub fn with_tags(id: u64, name: impl Into<String>) -> WidgetRef {
        Self::build(id, name.into(), true)
    }

    fn build(id: u64, name: String, tagged: bool) -> WidgetRef {
        let parts = ObservableCollection::with_config(CollectionConfig::labeled(format!(
            "widget-{id}-parts"
        )));
        let tags = tagged.then(|| {
            RefCell::new(ObservableCollection::with_config(CollectionConfig::labeled(
                format!("widget-{id}-tags"),
            )))
        });
        Shared::new(Self {
            id,
            name: RefCell::new(name),
            parts: RefCell::new(parts),
            tags,
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// Borrow the parts.
    ///
    /// # Panics
    ///
    /// Panics while a [`parts_mut`](Self::parts_mut) guard is alive, which
    /// includes every change delivery it triggers. Subscribers that re-read
    /// the widget from a callback use [`try_parts`](Self::try_parts).
    pub fn parts(&self) -> Ref<'_, ObservableCollection<PartRef>> {
        self.parts.borrow()
    }

    /// Borrow the parts, or `None` while they are being mutated (for
    /// instance from inside a change callback).
    pub fn try_parts(&self) -> Option<Ref<'_, ObservableCollection<PartRef>>> {
        self.parts.try_borrow().ok()
    }

    /// Mutable access to the parts.
    ///
    /// The guard is held across the emission a mutation triggers, so
    /// subscribers reached from that emission (nested forwarders included)
    /// cannot borrow the parts again until the call returns.
    pub fn parts_mut(&self) -> RefMut<'_, ObservableCollection<PartRef>> {
        self.parts.borrow_mut()
    }

    pub fn tags(&self) -> Option<Ref<'_, ObservableCollection<String>>> {
        self.tags.as_ref().map(RefCell::borrow)
    }

    /// Mutable access to the tags. Same borrow rule as
    /// [`parts_mut`](Self::parts_mut).
    pub fn tags_mut(&self) -> Option<RefMut<'_, ObservableCollection<String>>> {
        self.tags.as_ref().map(RefCell::borrow_mut)
    }
}

/// Copies the name only; parts and tags keep their own identity.
impl UpdateInPlace for Widget {
    fn update_in_place(&self, template: &Self) -> Result<()> {
        if self.id != template.id {
            return Err(CollectionError::UpdateNotApplicable);
        }
        *self.name.borrow_mut() = template.name();
        Ok(())
    }
}

/// Observer factory forwarding a widget's part changes to the outer sink.
pub fn forward_parts(sink: &ChangeSink<WidgetRef>, widget: &WidgetRef) -> Option<Subscription> {
    let sink = sink.clone();
    let owner = widget.clone();
    Some(widget.parts().subscribe(move |event| {
        if let Event::Next(batch) = event {
            sink.send_nested(owner.clone(), batch.iter().cloned());
        }
    }))
}

/// Observer factory forwarding tag changes; untagged widgets are skipped.
pub fn forward_tags(sink: &ChangeSink<WidgetRef>, widget: &WidgetRef) -> Option<Subscription> {
    let sink = sink.clone();
    let owner = widget.clone();
    let tags = widget.tags()?;
    Some(tags.subscribe(move |event| {
        if let Event::Next(batch) = event {
            sink.send_nested(owner.clone(), batch.iter().cloned());
        }
    }))
}
