//! Payload-free change notifications.
//!
//! The hosted store pushes "something in this table changed" events; the
//! client reacts by reloading, never by patching from a payload. The hub
//! mirrors that contract locally: publishers name a table (and optionally
//! the parent row the change belongs to), listeners hear a nullary callback.
//!
//! Bursts coalesce: `mark` any number of changes, then `flush` once, and each
//! listener whose filter matched anything in the burst is called exactly
//! once. Callbacks run with no hub borrows held, so a callback may freely
//! subscribe, unsubscribe, or mark further changes; marks made during a
//! flush are delivered by the next flush rather than recursing.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle returned by [`ChangeHub::subscribe`], used to unsubscribe.
    pub struct ListenerKey;
}

/// One change event: a table, and the parent row it is scoped to (a day id
/// for activity rows, a trip id for day rows, and so on). `scope: None`
/// means the change is not attributable to one parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Change {
    pub table: &'static str,
    pub scope: Option<i64>,
}

impl Change {
    pub fn table(table: &'static str) -> Self {
        Change { table, scope: None }
    }

    pub fn scoped(table: &'static str, scope: i64) -> Self {
        Change {
            table,
            scope: Some(scope),
        }
    }
}

/// What a listener wants to hear about. A `scope` of `None` subscribes to
/// the whole table; a concrete scope narrows to changes under one parent
/// row (plus unscoped changes to the table, which may concern anyone).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: &'static str,
    pub scope: Option<i64>,
}

impl ChangeFilter {
    pub fn table(table: &'static str) -> Self {
        ChangeFilter { table, scope: None }
    }

    pub fn scoped(table: &'static str, scope: i64) -> Self {
        ChangeFilter {
            table,
            scope: Some(scope),
        }
    }

    fn matches(&self, change: &Change) -> bool {
        self.table == change.table
            && match (self.scope, change.scope) {
                (None, _) | (_, None) => true,
                (Some(want), Some(got)) => want == got,
            }
    }
}

struct Listener {
    filter: ChangeFilter,
    callback: Rc<dyn Fn()>,
}

#[derive(Default)]
pub struct ChangeHub {
    listeners: RefCell<SlotMap<ListenerKey, Listener>>,
    pending: RefCell<BTreeSet<Change>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        ChangeHub::default()
    }

    pub fn subscribe(&self, filter: ChangeFilter, callback: impl Fn() + 'static) -> ListenerKey {
        self.listeners.borrow_mut().insert(Listener {
            filter,
            callback: Rc::new(callback),
        })
    }

    pub fn unsubscribe(&self, key: ListenerKey) {
        if self.listeners.borrow_mut().remove(key).is_none() {
            log::warn!("unsubscribe for unknown listener key");
        }
    }

    /// Record a change without delivering it yet.
    pub fn mark(&self, change: Change) {
        self.pending.borrow_mut().insert(change);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Deliver everything marked since the last flush. Each listener is
    /// called at most once, however many marked changes matched its filter.
    pub fn flush(&self) {
        let burst: Vec<Change> = std::mem::take(&mut *self.pending.borrow_mut())
            .into_iter()
            .collect();
        if burst.is_empty() {
            return;
        }

        // Snapshot matching callbacks first so none of the hub's borrows are
        // held while user code runs.
        let callbacks: Vec<Rc<dyn Fn()>> = self
            .listeners
            .borrow()
            .values()
            .filter(|l| burst.iter().any(|c| l.filter.matches(c)))
            .map(|l| Rc::clone(&l.callback))
            .collect();

        for callback in callbacks {
            callback();
        }
    }

    /// Mark and deliver one change immediately.
    pub fn publish(&self, change: Change) {
        self.mark(change);
        self.flush();
    }
}
