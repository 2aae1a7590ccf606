use std::cell::Cell;
use std::rc::Rc;

use basecamp::{Change, ChangeFilter, ChangeHub};

fn counter() -> (Rc<Cell<u32>>, impl Fn()) {
    let count = Rc::new(Cell::new(0));
    let hook = Rc::clone(&count);
    (count, move || hook.set(hook.get() + 1))
}

#[test]
fn test_publish_reaches_matching_listener() {
    let hub = ChangeHub::new();
    let (count, bump) = counter();
    hub.subscribe(ChangeFilter::table("activities"), bump);

    hub.publish(Change::scoped("activities", 7));
    assert_eq!(count.get(), 1);
}

#[test]
fn test_scope_filters_out_other_parents() {
    let hub = ChangeHub::new();
    let (count, bump) = counter();
    hub.subscribe(ChangeFilter::scoped("activities", 7), bump);

    hub.publish(Change::scoped("activities", 8));
    assert_eq!(count.get(), 0);

    hub.publish(Change::scoped("activities", 7));
    assert_eq!(count.get(), 1);

    // Unscoped changes may concern anyone, so scoped listeners hear them.
    hub.publish(Change::table("activities"));
    assert_eq!(count.get(), 2);
}

#[test]
fn test_other_tables_are_ignored() {
    let hub = ChangeHub::new();
    let (count, bump) = counter();
    hub.subscribe(ChangeFilter::table("days"), bump);

    hub.publish(Change::scoped("activities", 1));
    assert_eq!(count.get(), 0);
}

#[test]
fn test_burst_coalesces_to_one_call() {
    let hub = ChangeHub::new();
    let (count, bump) = counter();
    hub.subscribe(ChangeFilter::table("activities"), bump);

    hub.mark(Change::scoped("activities", 1));
    hub.mark(Change::scoped("activities", 1));
    hub.mark(Change::scoped("activities", 2));
    assert_eq!(count.get(), 0, "marks alone deliver nothing");

    hub.flush();
    assert_eq!(count.get(), 1);

    // A drained hub flushes to nothing.
    hub.flush();
    assert_eq!(count.get(), 1);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let hub = ChangeHub::new();
    let (count, bump) = counter();
    let key = hub.subscribe(ChangeFilter::table("days"), bump);

    hub.publish(Change::table("days"));
    hub.unsubscribe(key);
    hub.publish(Change::table("days"));

    assert_eq!(count.get(), 1);
}

#[test]
fn test_marks_during_flush_wait_for_next_flush() {
    let hub = Rc::new(ChangeHub::new());
    let (count, _) = counter();

    let hook = Rc::clone(&count);
    let reentrant = Rc::clone(&hub);
    hub.subscribe(ChangeFilter::table("days"), move || {
        hook.set(hook.get() + 1);
        // First delivery queues a follow-up change instead of recursing.
        if hook.get() == 1 {
            reentrant.mark(Change::table("days"));
        }
    });

    hub.publish(Change::table("days"));
    assert_eq!(count.get(), 1);
    assert!(hub.has_pending());

    hub.flush();
    assert_eq!(count.get(), 2);
    assert!(!hub.has_pending());
}
