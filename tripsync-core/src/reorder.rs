//! Turning a drag gesture into a new timeline order.
//!
//! The move itself is a pure splice: take the dragged entry out, put it back
//! at the drop position, leave everything else in relative order, the same
//! array-move a sortable list widget performs. Persistence is the caller's
//! job; [`sort_order_updates`] says which rows need new positions.

use im::Vector;

use crate::records::{Activity, ActivityId};

/// A finished drag: what was dragged, and what it was dropped on. `over` is
/// `None` when the drag was cancelled or dropped outside the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragEnd {
    pub active: ActivityId,
    pub over: Option<ActivityId>,
}

/// Stable move of one element from `from` to `to`. Returns `None` when an
/// index is out of range.
pub fn array_move<T: Clone>(list: &Vector<T>, from: usize, to: usize) -> Option<Vector<T>> {
    if from >= list.len() || to >= list.len() {
        return None;
    }
    let mut moved = list.clone();
    let item = moved.remove(from);
    moved.insert(to, item);
    Some(moved)
}

/// The rows whose stored `sort_order` no longer matches their position in
/// `list`, paired with the position they should take. Dense positions are
/// reasserted, so a previously drifted order is repaired by the next
/// successful reorder.
pub fn sort_order_updates(list: &Vector<Activity>) -> Vec<(ActivityId, i64)> {
    list.iter()
        .enumerate()
        .filter(|(index, activity)| activity.sort_order != *index as i64)
        .map(|(index, activity)| (activity.id, index as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ActivityDraft, DayId};

    fn list(titles: &[&str]) -> Vector<Activity> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| {
                let draft = ActivityDraft {
                    title: (*title).into(),
                    ..ActivityDraft::default()
                };
                Activity::from_draft(ActivityId(i as i64 + 1), DayId(1), i as i64, &draft)
            })
            .collect()
    }

    fn titles(list: &Vector<Activity>) -> Vec<String> {
        list.iter().map(|a| a.title.clone()).collect()
    }

    #[test]
    fn moves_an_entry_to_the_front() {
        let before = list(&["A", "B", "C"]);
        let after = array_move(&before, 2, 0).unwrap();
        assert_eq!(titles(&after), ["C", "A", "B"]);
    }

    #[test]
    fn moves_an_entry_to_the_back() {
        let before = list(&["A", "B", "C"]);
        let after = array_move(&before, 0, 2).unwrap();
        assert_eq!(titles(&after), ["B", "C", "A"]);
    }

    #[test]
    fn move_onto_itself_changes_nothing() {
        let before = list(&["A", "B", "C"]);
        let after = array_move(&before, 1, 1).unwrap();
        assert_eq!(titles(&after), ["A", "B", "C"]);
    }

    #[test]
    fn out_of_range_is_refused() {
        let before = list(&["A", "B"]);
        assert!(array_move(&before, 0, 5).is_none());
        assert!(array_move(&before, 5, 0).is_none());
    }

    #[test]
    fn every_move_is_a_bijection() {
        let before = list(&["A", "B", "C", "D"]);
        let mut before_ids: Vec<i64> = before.iter().map(|a| a.id.0).collect();
        before_ids.sort();

        for from in 0..before.len() {
            for to in 0..before.len() {
                let after = array_move(&before, from, to).unwrap();
                let mut after_ids: Vec<i64> = after.iter().map(|a| a.id.0).collect();
                after_ids.sort();
                assert_eq!(before_ids, after_ids, "move {from}->{to} lost or duplicated rows");
            }
        }
    }

    #[test]
    fn updates_cover_only_displaced_rows() {
        let before = list(&["A", "B", "C"]);
        // Swap the last two: A keeps its position, B and C need new orders.
        let after = array_move(&before, 2, 1).unwrap();
        let updates = sort_order_updates(&after);
        assert_eq!(updates, vec![(ActivityId(3), 1), (ActivityId(2), 2)]);
    }

    #[test]
    fn updates_repair_drifted_orders() {
        let mut drifted = list(&["A", "B"]);
        if let Some(first) = drifted.get_mut(0) {
            first.sort_order = 7;
        }
        let updates = sort_order_updates(&drifted);
        assert_eq!(updates, vec![(ActivityId(1), 0)]);
    }
}
