//! An in-memory table of rows keyed by a store-assigned integer id.
//!
//! This is the storage half of a fake hosted database: each table hands out
//! ids, keeps rows in id order, and can be told to fail its next writes so
//! callers can exercise their failure handling.

use std::collections::{BTreeMap, VecDeque};

use crate::error::StoreError;

/// One planned outcome for an upcoming write.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Let the write through.
    Ok,
    /// Fail the write with this error, leaving the table untouched.
    Err(StoreError),
}

#[derive(Debug)]
pub struct Table<R> {
    rows: BTreeMap<i64, R>,
    next_id: i64,
    faults: VecDeque<Fault>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Table::new()
    }
}

impl<R> Table<R> {
    pub fn new() -> Self {
        Table {
            rows: BTreeMap::new(),
            next_id: 1,
            faults: VecDeque::new(),
        }
    }

    /// Hand out the next row id. Ids are positive and never reused, so
    /// callers are free to use negative ids for local placeholders.
    pub fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&R> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut R> {
        self.rows.get_mut(&id)
    }

    /// Queue an outcome for an upcoming write. Outcomes are consumed in
    /// order, one per write; an empty queue means writes succeed.
    pub fn push_fault(&mut self, fault: Fault) {
        self.faults.push_back(fault);
    }

    pub fn has_pending_fault(&self) -> bool {
        !self.faults.is_empty()
    }

    /// Consume the next planned outcome, if any.
    pub fn take_fault(&mut self) -> Result<(), StoreError> {
        match self.faults.pop_front() {
            None | Some(Fault::Ok) => Ok(()),
            Some(Fault::Err(e)) => {
                log::debug!("table write failed by injected fault: {e}");
                Err(e)
            }
        }
    }

    pub fn insert(&mut self, id: i64, row: R) -> Result<(), StoreError> {
        self.take_fault()?;
        if self.rows.contains_key(&id) {
            return Err(StoreError::Conflict(format!("duplicate row id {id}")));
        }
        self.rows.insert(id, row);
        Ok(())
    }

    pub fn update(&mut self, id: i64, patch: impl FnOnce(&mut R)) -> Result<(), StoreError> {
        self.take_fault()?;
        match self.rows.get_mut(&id) {
            Some(row) => {
                patch(row);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    pub fn remove(&mut self, id: i64) -> Result<R, StoreError> {
        self.take_fault()?;
        self.rows.remove(&id).ok_or(StoreError::NotFound)
    }

    /// Remove every row matching the predicate. Used for cascading deletes;
    /// not subject to fault injection (it runs as part of a parent delete
    /// that already consumed its fault).
    pub fn remove_where(&mut self, mut pred: impl FnMut(&R) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| !pred(row));
        before - self.rows.len()
    }

    pub fn find(&self, mut pred: impl FnMut(&R) -> bool) -> Option<&R> {
        self.rows.values().find(|r| pred(r))
    }
}

impl<R: Clone> Table<R> {
    /// All rows matching the predicate, in id order.
    pub fn select(&self, mut pred: impl FnMut(&R) -> bool) -> Vec<R> {
        self.rows.values().filter(|r| pred(r)).cloned().collect()
    }

    /// All rows matching the predicate, ordered by the given key ascending.
    /// Rows with equal keys keep id order, the same unspecified-but-stable
    /// tie-break a real store's ascending sort gives you.
    pub fn select_sorted_by<K: Ord>(
        &self,
        pred: impl FnMut(&R) -> bool,
        mut key: impl FnMut(&R) -> K,
    ) -> Vec<R> {
        let mut rows = self.select(pred);
        rows.sort_by_key(|r| key(r));
        rows
    }
}
