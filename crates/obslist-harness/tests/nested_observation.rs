//! End-to-end tests for nested observation.
//!
//! An outer collection of widgets forwards changes made inside each widget's
//! own part (and tag) collections as `Nested` records.

use obslist::{Change, ChangeType, ObservableCollection, Subscription};
use obslist_harness::{
    ChangeRecorder, Part, PartRef, Widget, WidgetRef, forward_parts, forward_tags, init_tracing,
};
use pretty_assertions::assert_eq;
use tracing::info;

fn outer_with(widgets: &[WidgetRef]) -> ObservableCollection<WidgetRef> {
    ObservableCollection::from_values(widgets.iter().cloned()).unwrap()
}

#[test]
fn inner_append_surfaces_as_one_nested_record() {
    init_tracing();
    let w = Widget::new(1, "gearbox");
    let mut outer = outer_with(&[w.clone()]);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    let bolt = Part::new(10, "bolt");
    w.parts_mut().append(bolt.clone()).unwrap();

    let batches = recorder.batches();
    info!(?batches, "outer emissions");
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], vec![Change::nested(w.clone(), [Change::insert(bolt.clone(), 0)])]);

    let record = &batches[0][0];
    assert_eq!(record.change_type(), ChangeType::Nested);
    assert_eq!(record.object(), Some(&w));
    let child = &record.nested_changes().unwrap()[0];
    assert_eq!(child.change_type(), ChangeType::Insert);
    assert_eq!(child.index(), Some(0));
    assert_eq!(child.object_as::<PartRef>(), Some(&bolt));
}

#[test]
fn inner_batch_stays_one_nested_record() {
    let w = Widget::new(1, "gearbox");
    let mut outer = outer_with(&[w.clone()]);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    let (a, b) = (Part::new(1, "a"), Part::new(2, "b"));
    w.parts_mut().append_all([a.clone(), b.clone()]).unwrap();

    assert_eq!(
        recorder.records(),
        vec![Change::nested(
            w.clone(),
            [Change::insert(a, 0), Change::insert(b, 1)]
        )]
    );
}

#[test]
fn elements_inserted_after_registration_are_observed() {
    let mut outer = ObservableCollection::new();
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    let late = Widget::new(2, "late");
    outer.insert(late.clone(), 0).unwrap();
    assert_eq!(outer.observed_element_count("parts"), Some(1));
    late.parts_mut().append(Part::new(1, "pin")).unwrap();

    let batches = recorder.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0], vec![Change::insert(late.clone(), 0)]);
    assert_eq!(batches[1][0].change_type(), ChangeType::Nested);
}

#[test]
fn removal_detaches_forwarding() {
    let w = Widget::new(1, "gearbox");
    let mut outer = outer_with(&[w.clone()]);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    outer.remove(&w).unwrap();
    w.parts_mut().append(Part::new(1, "orphan")).unwrap();

    assert_eq!(recorder.records(), vec![Change::remove(w.clone(), 0)]);
    assert_eq!(outer.observed_element_count("parts"), Some(0));
}

#[test]
fn removal_by_index_detaches_the_right_element() {
    let (w1, w2) = (Widget::new(1, "one"), Widget::new(2, "two"));
    let mut outer = outer_with(&[w1.clone(), w2.clone()]);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    outer.remove_at(0).unwrap();
    w1.parts_mut().append(Part::new(1, "gone")).unwrap();
    let kept = Part::new(2, "kept");
    w2.parts_mut().append(kept.clone()).unwrap();

    assert_eq!(
        recorder.records(),
        vec![
            Change::remove(w1.clone(), 0),
            Change::nested(w2.clone(), [Change::insert(kept, 0)]),
        ]
    );
}

#[test]
fn remove_all_releases_every_handle() {
    let (w1, w2) = (Widget::new(1, "one"), Widget::new(2, "two"));
    let mut outer = outer_with(&[w1.clone(), w2.clone()]);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    outer.remove_all();
    w1.parts_mut().append(Part::new(1, "x")).unwrap();
    w2.parts_mut().append(Part::new(2, "y")).unwrap();

    assert_eq!(recorder.records(), vec![Change::Reload]);
    assert!(outer.is_observing("parts"));

    // The key survives remove_all, so re-added widgets are observed again.
    outer.append(w1.clone()).unwrap();
    w1.parts_mut().append(Part::new(3, "z")).unwrap();
    assert_eq!(recorder.emission_count(), 3);
}

#[test]
fn remove_observer_stops_forwarding() {
    let w = Widget::new(1, "gearbox");
    let mut outer = outer_with(&[w.clone()]);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    assert!(outer.remove_observer("parts"));
    assert!(!outer.remove_observer("parts"));
    w.parts_mut().append(Part::new(1, "quiet")).unwrap();
    assert_eq!(recorder.emission_count(), 0);
}

#[test]
fn independent_keys_coexist() {
    let tagged = Widget::with_tags(1, "tagged");
    let plain = Widget::new(2, "plain");
    let mut outer = outer_with(&[tagged.clone(), plain.clone()]);
    outer.observe("parts", forward_parts);
    outer.observe("tags", forward_tags);
    assert_eq!(outer.observed_keys().collect::<Vec<_>>(), vec!["parts", "tags"]);
    assert_eq!(outer.observed_element_count("parts"), Some(2));
    assert_eq!(outer.observed_element_count("tags"), Some(1));

    let recorder = ChangeRecorder::attach(&outer);
    tagged.tags_mut().unwrap().append("red".to_string()).unwrap();
    let wheel = Part::new(1, "wheel");
    plain.parts_mut().append(wheel.clone()).unwrap();

    assert_eq!(
        recorder.records(),
        vec![
            Change::nested(tagged.clone(), [Change::insert("red".to_string(), 0)]),
            Change::nested(plain.clone(), [Change::insert(wheel, 0)]),
        ]
    );

    outer.remove_observer("tags");
    tagged.tags_mut().unwrap().append("blue".to_string()).unwrap();
    assert_eq!(recorder.emission_count(), 2);
}

#[test]
fn reregistering_key_does_not_double_forward() {
    let w = Widget::new(1, "gearbox");
    let mut outer = outer_with(&[w.clone()]);
    outer.observe("parts", forward_parts);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    w.parts_mut().append(Part::new(1, "once")).unwrap();
    assert_eq!(recorder.emission_count(), 1);
}

#[test]
fn nested_records_respect_outer_grouping() {
    let w = Widget::new(1, "gearbox");
    let mut outer = outer_with(&[w.clone()]);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    let extra = Widget::new(2, "extra");
    let pin = Part::new(1, "pin");
    outer.start_grouping_changes().unwrap();
    outer.append(extra.clone()).unwrap();
    w.parts_mut().append(pin.clone()).unwrap();
    assert_eq!(recorder.emission_count(), 0);
    outer.stop_grouping_changes().unwrap();

    assert_eq!(
        recorder.batches(),
        vec![vec![
            Change::insert(extra, 1),
            Change::nested(w.clone(), [Change::insert(pin, 0)]),
        ]]
    );
}

#[test]
fn inner_update_forwards_mutated_part() {
    let w = Widget::new(1, "gearbox");
    let cog = Part::new(7, "cog");
    w.parts_mut().append(cog.clone()).unwrap();
    let mut outer = outer_with(&[w.clone()]);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    w.parts_mut().update(0, &Part::new(7, "bevel cog")).unwrap();

    let records = recorder.records();
    let child = &records[0].nested_changes().unwrap()[0];
    assert_eq!(child.change_type(), ChangeType::Update);
    assert_eq!(child.object_as::<PartRef>().map(|p| p.name()), Some("bevel cog".to_string()));
}

#[test]
fn inner_teardown_is_forwarded_as_nested_done() {
    let w = Widget::new(1, "gearbox");
    let mut outer = ObservableCollection::new();
    outer.append(w.clone()).unwrap();
    let parts_stream = w.parts().changes();
    let recorder = ChangeRecorder::attach(&outer);

    // Forward a standalone collection's feed under the widget.
    let standalone: ObservableCollection<PartRef> = ObservableCollection::new();
    let standalone_stream = standalone.changes();
    outer.observe("standalone", move |sink, widget| {
        let sink = sink.clone();
        let owner = widget.clone();
        Some(standalone_stream.subscribe(move |event| {
            if let Some(batch) = event.value() {
                sink.send_nested(owner.clone(), batch.iter().cloned());
            }
        }))
    });
    drop(standalone);

    assert_eq!(
        recorder.records(),
        vec![Change::nested(w.clone(), [Change::<PartRef>::done()])]
    );
    assert!(!parts_stream.is_completed());
}

#[test]
fn outer_teardown_releases_inner_subscriptions() {
    let w = Widget::new(1, "gearbox");
    let mut outer = outer_with(&[w.clone()]);
    outer.observe("parts", forward_parts);
    let recorder = ChangeRecorder::attach(&outer);

    outer.close();
    assert!(recorder.is_completed());

    // Only the Done batch; the inner forwarder is gone.
    w.parts_mut().append(Part::new(1, "after")).unwrap();
    assert_eq!(recorder.emission_count(), 1);
    assert_eq!(recorder.batches(), vec![vec![Change::Done]]);
}

#[test]
fn factory_may_decline() {
    let mut outer = outer_with(&[Widget::new(1, "a"), Widget::new(2, "b")]);
    outer.observe("nothing", |_sink, _widget: &WidgetRef| -> Option<Subscription> { None });
    assert_eq!(outer.observed_element_count("nothing"), Some(0));
    assert!(outer.is_observing("nothing"));
}

#[test]
fn subscriber_rereads_inner_state_after_delivery() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let w = Widget::new(1, "gearbox");
    let mut outer = outer_with(&[w.clone()]);
    outer.observe("parts", forward_parts);

    // During delivery the inner collection is still borrowed by the mutator.
    let seen: Rc<RefCell<Vec<Option<usize>>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = Rc::clone(&seen);
    let _sub = outer.subscribe(move |event| {
        for record in event.value().into_iter().flatten() {
            if let Some(widget) = record.object() {
                seen_clone
                    .borrow_mut()
                    .push(widget.try_parts().map(|p| p.count()));
            }
        }
    });

    w.parts_mut().append(Part::new(1, "pin")).unwrap();
    assert_eq!(*seen.borrow(), vec![None]);
    assert_eq!(w.try_parts().map(|p| p.count()), Some(1));
}
