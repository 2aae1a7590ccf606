//! Session-owned state for the open trip: the trip record, its days, and
//! the activity list for the selected day.
//!
//! Mutations here are speculative: the UI reflects them before the store
//! confirms. Every speculative change registers a pending write carrying
//! enough of the pre-image to reverse exactly that change if the store says
//! no. The async half (issuing the store calls and settling the pending
//! writes) lives on [`Planner`](crate::Planner); everything in this module
//! is synchronous and pure enough to test directly.

use std::collections::HashSet;

use im::Vector;
use slotmap::SlotMap;

use crate::budget::{self, BudgetSummary};
use crate::records::{Access, Activity, ActivityDraft, ActivityId, Day, Trip};
use crate::reorder::{array_move, sort_order_updates};

/// How far along opening the trip is. A trip is never observable with zero
/// days: when the store has none, `NeedsBootstrap` creates Day 0 before the
/// view becomes `Ready`, and a failed bootstrap fails the whole load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Loading,
    HasDays,
    NeedsBootstrap,
    Ready,
    Failed,
}

slotmap::new_key_type! {
    /// Tags one speculative mutation from application to settlement.
    pub struct PendingKey;
}

/// The compensating half of a speculative mutation.
#[derive(Debug, Clone)]
enum PendingWrite {
    Create { placeholder: ActivityId },
    Update { id: ActivityId, previous: Activity },
    Delete { index: usize, row: Activity },
    Reorder { previous: Vector<Activity> },
}

/// A point on the day's route, in timeline order. Tentative activities and
/// activities without resolved coordinates are left out.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMarker {
    pub activity: ActivityId,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
}

pub struct ItineraryState {
    lifecycle: Lifecycle,
    trip: Option<Trip>,
    access: Access,
    days: Vector<Day>,
    selected_day: usize,
    activities: Vector<Activity>,
    editing: bool,
    pending: SlotMap<PendingKey, PendingWrite>,
    next_placeholder: i64,
}

impl Default for ItineraryState {
    fn default() -> Self {
        ItineraryState::new()
    }
}

impl ItineraryState {
    pub fn new() -> Self {
        ItineraryState {
            lifecycle: Lifecycle::Uninitialized,
            trip: None,
            access: Access::ReadOnly,
            days: Vector::new(),
            selected_day: 0,
            activities: Vector::new(),
            editing: false,
            pending: SlotMap::with_key(),
            next_placeholder: -1,
        }
    }

    // --- lifecycle ---

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub(crate) fn begin_load(&mut self) {
        *self = ItineraryState::new();
        self.lifecycle = Lifecycle::Loading;
    }

    pub(crate) fn note_bootstrap(&mut self, needs_bootstrap: bool) {
        if self.lifecycle == Lifecycle::Loading {
            self.lifecycle = if needs_bootstrap {
                Lifecycle::NeedsBootstrap
            } else {
                Lifecycle::HasDays
            };
        }
    }

    pub(crate) fn fail_load(&mut self) {
        self.lifecycle = Lifecycle::Failed;
    }

    pub(crate) fn finish_load(&mut self, trip: Trip, access: Access, days: Vec<Day>) {
        self.trip = Some(trip);
        self.access = access;
        self.days = days.into_iter().collect();
        self.selected_day = 0;
        self.activities = Vector::new();
        self.editing = false;
        self.lifecycle = Lifecycle::Ready;
    }

    pub(crate) fn reset(&mut self) {
        *self = ItineraryState::new();
    }

    // --- views ---

    pub fn trip(&self) -> Option<&Trip> {
        self.trip.as_ref()
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn days(&self) -> &Vector<Day> {
        &self.days
    }

    pub fn selected_day_index(&self) -> usize {
        self.selected_day
    }

    pub fn selected_day(&self) -> Option<&Day> {
        self.days.get(self.selected_day)
    }

    pub fn activities(&self) -> &Vector<Activity> {
        &self.activities
    }

    pub fn activity(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn editing(&self) -> bool {
        self.editing
    }

    pub(crate) fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    pub fn can_edit(&self) -> bool {
        self.trip.is_some() && self.access.can_edit()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn budget(&self) -> BudgetSummary {
        budget::summarize(
            self.activities.iter(),
            self.trip.as_ref().and_then(|t| t.budget_limit),
        )
    }

    pub fn route_markers(&self) -> Vec<RouteMarker> {
        self.activities
            .iter()
            .filter(|a| !a.tentative)
            .filter_map(|a| {
                a.coordinates().map(|(lat, lng)| RouteMarker {
                    activity: a.id,
                    title: a.title.clone(),
                    lat,
                    lng,
                })
            })
            .collect()
    }

    // --- day navigation ---

    /// Point at another day and drop the loaded activity list. `false` when
    /// the index is out of range (the caller treats that as a no-op).
    pub(crate) fn select_day(&mut self, index: usize) -> bool {
        if index >= self.days.len() {
            return false;
        }
        self.selected_day = index;
        self.activities = Vector::new();
        true
    }

    pub(crate) fn replace_days(&mut self, days: Vec<Day>) {
        self.days = days.into_iter().collect();
        if self.days.is_empty() {
            log::warn!("trip lost all of its days; the view cannot recover");
            self.selected_day = 0;
            self.activities = Vector::new();
            return;
        }
        if self.selected_day >= self.days.len() {
            self.selected_day = self.days.len() - 1;
            self.activities = Vector::new();
        }
    }

    // --- activity reloads ---

    /// Adopt a fresh store read of the selected day's activities, keeping
    /// any optimistic placeholder whose create is still in flight so the UI
    /// doesn't flicker it away mid-save.
    pub(crate) fn reconcile_activities(&mut self, fresh: Vec<Activity>) {
        let in_flight: HashSet<i64> = self
            .pending
            .values()
            .filter_map(|w| match w {
                PendingWrite::Create { placeholder } => Some(placeholder.0),
                _ => None,
            })
            .collect();

        let mut next: Vector<Activity> = fresh.into_iter().collect();
        for activity in self.activities.iter() {
            if activity.id.is_placeholder() && in_flight.contains(&activity.id.0) {
                next.push_back(activity.clone());
            }
        }
        self.activities = next;
    }

    // --- speculative mutations ---

    /// Append an optimistic entry for a new activity and tag the in-flight
    /// create. Returns the tag plus the placeholder row (whose `sort_order`
    /// is the value the store insert must use).
    pub(crate) fn begin_create(&mut self, draft: &ActivityDraft) -> Option<(PendingKey, Activity)> {
        let day_id = self.selected_day()?.id;
        let placeholder = ActivityId(self.next_placeholder);
        self.next_placeholder -= 1;

        let activity =
            Activity::from_draft(placeholder, day_id, self.activities.len() as i64, draft);
        self.activities.push_back(activity.clone());
        let key = self.pending.insert(PendingWrite::Create { placeholder });
        Some((key, activity))
    }

    /// Patch an activity in place, remembering its pre-image.
    pub(crate) fn begin_update(
        &mut self,
        id: ActivityId,
        draft: &ActivityDraft,
    ) -> Option<PendingKey> {
        let index = self.activities.iter().position(|a| a.id == id)?;
        let previous = self.activities.get(index)?.clone();
        if let Some(activity) = self.activities.get_mut(index) {
            activity.apply_draft(draft);
        }
        Some(self.pending.insert(PendingWrite::Update { id, previous }))
    }

    /// Take an activity out of the list, remembering where it sat.
    pub(crate) fn begin_delete(&mut self, id: ActivityId) -> Option<PendingKey> {
        let index = self.activities.iter().position(|a| a.id == id)?;
        let row = self.activities.remove(index);
        Some(self.pending.insert(PendingWrite::Delete { index, row }))
    }

    /// Splice the dragged activity to its drop position and renumber. The
    /// returned updates are the rows whose stored `sort_order` must change.
    pub(crate) fn begin_reorder(
        &mut self,
        active: ActivityId,
        over: ActivityId,
    ) -> Option<(PendingKey, Vec<(ActivityId, i64)>)> {
        let from = self.activities.iter().position(|a| a.id == active)?;
        let to = self.activities.iter().position(|a| a.id == over)?;
        if from == to {
            return None;
        }

        let previous = self.activities.clone();
        let mut moved = array_move(&self.activities, from, to)?;
        let updates = sort_order_updates(&moved);
        for (index, activity) in moved.iter_mut().enumerate() {
            activity.sort_order = index as i64;
        }
        self.activities = moved;

        let key = self.pending.insert(PendingWrite::Reorder { previous });
        Some((key, updates))
    }

    /// The store confirmed: drop the tag, keep the speculative change.
    pub(crate) fn settle_success(&mut self, key: PendingKey) {
        if self.pending.remove(key).is_none() {
            log::warn!("settled an unknown pending write");
        }
    }

    /// The store refused: reverse exactly the tagged change.
    pub(crate) fn settle_failure(&mut self, key: PendingKey) {
        let Some(write) = self.pending.remove(key) else {
            log::warn!("rolled back an unknown pending write");
            return;
        };
        match write {
            PendingWrite::Create { placeholder } => {
                if let Some(index) = self.activities.iter().position(|a| a.id == placeholder) {
                    self.activities.remove(index);
                }
            }
            PendingWrite::Update { id, previous } => {
                if let Some(index) = self.activities.iter().position(|a| a.id == id) {
                    if let Some(activity) = self.activities.get_mut(index) {
                        *activity = previous;
                    }
                }
            }
            PendingWrite::Delete { index, row } => {
                let index = index.min(self.activities.len());
                self.activities.insert(index, row);
            }
            PendingWrite::Reorder { previous } => {
                self.activities = previous;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{DayId, MemberRole, TripId, UserId};
    use chrono::Utc;

    fn trip() -> Trip {
        Trip {
            id: TripId(1),
            title: "Kyoto in May".into(),
            created_at: Utc::now(),
            start_date: None,
            cover_image: None,
            budget_limit: Some(1000.0),
            owner: UserId("ana".into()),
            is_public: false,
        }
    }

    fn day(id: i64, index: i64) -> Day {
        Day {
            id: DayId(id),
            trip_id: TripId(1),
            day_index: index,
            title: format!("Day {}", index + 1),
            date: None,
        }
    }

    fn ready_state() -> ItineraryState {
        let mut state = ItineraryState::new();
        state.begin_load();
        state.note_bootstrap(false);
        state.finish_load(trip(), Access::Owner, vec![day(10, 0), day(11, 1)]);
        state
    }

    fn draft(title: &str) -> ActivityDraft {
        ActivityDraft {
            title: title.into(),
            ..ActivityDraft::default()
        }
    }

    fn stored(id: i64, sort_order: i64, title: &str) -> Activity {
        Activity::from_draft(ActivityId(id), DayId(10), sort_order, &draft(title))
    }

    #[test]
    fn load_walks_the_lifecycle() {
        let mut state = ItineraryState::new();
        assert_eq!(state.lifecycle(), Lifecycle::Uninitialized);

        state.begin_load();
        assert_eq!(state.lifecycle(), Lifecycle::Loading);

        state.note_bootstrap(true);
        assert_eq!(state.lifecycle(), Lifecycle::NeedsBootstrap);

        state.finish_load(trip(), Access::Owner, vec![day(10, 0)]);
        assert_eq!(state.lifecycle(), Lifecycle::Ready);
    }

    #[test]
    fn failed_bootstrap_fails_the_whole_load() {
        let mut state = ItineraryState::new();
        state.begin_load();
        state.note_bootstrap(true);
        state.fail_load();
        assert_eq!(state.lifecycle(), Lifecycle::Failed);
        assert!(state.trip().is_none());
    }

    #[test]
    fn select_day_clears_activities_and_checks_bounds() {
        let mut state = ready_state();
        state.reconcile_activities(vec![stored(1, 0, "Lunch")]);
        assert_eq!(state.activities().len(), 1);

        assert!(!state.select_day(5));
        assert_eq!(state.activities().len(), 1, "out-of-range select is a no-op");

        assert!(state.select_day(1));
        assert_eq!(state.selected_day_index(), 1);
        assert!(state.activities().is_empty());
    }

    #[test]
    fn replace_days_clamps_the_selection() {
        let mut state = ready_state();
        assert!(state.select_day(1));
        state.replace_days(vec![day(10, 0)]);
        assert_eq!(state.selected_day_index(), 0);
    }

    #[test]
    fn create_appends_a_placeholder_then_failure_removes_it() {
        let mut state = ready_state();
        let (key, placeholder) = state.begin_create(&draft("Lunch")).unwrap();

        assert!(placeholder.id.is_placeholder());
        assert_eq!(placeholder.sort_order, 0);
        assert_eq!(state.activities().len(), 1);

        state.settle_failure(key);
        assert!(state.activities().is_empty());
        assert_eq!(state.pending_count(), 0);
    }

    #[test]
    fn reconcile_keeps_only_in_flight_placeholders() {
        let mut state = ready_state();
        let (key, placeholder) = state.begin_create(&draft("Museum")).unwrap();

        // Reload lands while the create is still pending.
        state.reconcile_activities(vec![stored(1, 0, "Lunch")]);
        assert_eq!(state.activities().len(), 2);
        assert_eq!(state.activities().last().unwrap().id, placeholder.id);

        // Once the create settles, the next reload owns the truth.
        state.settle_success(key);
        state.reconcile_activities(vec![stored(1, 0, "Lunch"), stored(2, 1, "Museum")]);
        assert_eq!(state.activities().len(), 2);
        assert!(state.activities().iter().all(|a| !a.id.is_placeholder()));
    }

    #[test]
    fn update_failure_restores_the_preimage() {
        let mut state = ready_state();
        state.reconcile_activities(vec![stored(1, 0, "Lunch")]);

        let key = state.begin_update(ActivityId(1), &draft("Brunch")).unwrap();
        assert_eq!(state.activity(ActivityId(1)).unwrap().title, "Brunch");

        state.settle_failure(key);
        assert_eq!(state.activity(ActivityId(1)).unwrap().title, "Lunch");
    }

    #[test]
    fn delete_failure_puts_the_row_back_where_it_was() {
        let mut state = ready_state();
        state.reconcile_activities(vec![
            stored(1, 0, "Lunch"),
            stored(2, 1, "Museum"),
            stored(3, 2, "Dinner"),
        ]);

        let key = state.begin_delete(ActivityId(2)).unwrap();
        assert_eq!(state.activities().len(), 2);

        state.settle_failure(key);
        let titles: Vec<&str> = state.activities().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Lunch", "Museum", "Dinner"]);
    }

    #[test]
    fn reorder_renumbers_and_failure_restores() {
        let mut state = ready_state();
        state.reconcile_activities(vec![
            stored(1, 0, "A"),
            stored(2, 1, "B"),
            stored(3, 2, "C"),
        ]);

        let (key, updates) = state.begin_reorder(ActivityId(3), ActivityId(1)).unwrap();
        let titles: Vec<&str> = state.activities().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["C", "A", "B"]);
        assert!(state.activities().iter().enumerate().all(|(i, a)| a.sort_order == i as i64));
        assert_eq!(
            updates,
            vec![(ActivityId(3), 0), (ActivityId(1), 1), (ActivityId(2), 2)]
        );

        state.settle_failure(key);
        let titles: Vec<&str> = state.activities().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
    }

    #[test]
    fn viewer_members_participate_but_do_not_edit() {
        let mut state = ItineraryState::new();
        state.begin_load();
        state.note_bootstrap(false);
        state.finish_load(trip(), Access::Member(MemberRole::Viewer), vec![day(10, 0)]);

        assert!(state.access().is_participant());
        assert!(!state.can_edit());
    }

    #[test]
    fn route_skips_tentative_and_unresolved_stops() {
        let mut state = ready_state();
        let mut with_coords = stored(1, 0, "Lunch");
        with_coords.lat = Some(35.0);
        with_coords.lng = Some(135.7);
        let mut tentative = stored(2, 1, "Maybe museum");
        tentative.lat = Some(35.1);
        tentative.lng = Some(135.8);
        tentative.tentative = true;
        let unresolved = stored(3, 2, "Somewhere");

        state.reconcile_activities(vec![with_coords, tentative, unresolved]);
        let markers = state.route_markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].title, "Lunch");
    }
}
