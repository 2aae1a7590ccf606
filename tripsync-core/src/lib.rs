#![deny(clippy::string_slice)]

//! The application core of TripSync, a collaborative trip planner.
//!
//! The shell (routing, rendering, auth screens) stays thin: it constructs a
//! [`Planner`] over a [`RemoteStore`] backend, calls operations as the user
//! acts, and renders the snapshots the planner exposes. Edits land on the
//! in-memory state first and reconcile with the store afterwards, so the UI
//! never waits on the network to show what the user just did, and every
//! speculative change knows how to undo itself if the store disagrees.
//!
//! Everything is single-threaded. The only suspension points are store
//! round-trips, and no `RefCell` borrow is ever held across an `.await`;
//! keeping that rule is what guarantees the absence of borrow panics here.

pub mod budget;
pub mod checklist;
pub mod error;
pub mod itinerary;
pub mod memories;
pub mod notices;
pub mod records;
pub mod reorder;
pub mod store;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use basecamp::{Change, ChangeFilter, ListenerKey, StoreError};
pub use budget::BudgetSummary;
pub use checklist::{Checklist, ChecklistItem, ChecklistProgress};
pub use error::PlanError;
pub use itinerary::{ItineraryState, Lifecycle, RouteMarker};
pub use memories::{Comment, MemoryDraft, MemoryFeed, MemoryPost};
pub use notices::{Notice, Severity};
pub use records::{
    Access, Activity, ActivityDraft, ActivityId, ActivityKind, CommentId, Day, DayId, MemberId,
    MemberRole, MemoryId, Trip, TripDraft, TripId, TripMember, UserId, UserIdentity,
};
pub use reorder::DragEnd;
pub use store::RemoteStore;
pub use store::memory::{MemorySession, MemoryStore};

use im::Vector;
use notices::NoticeQueue;
use store::tables;

/// A destructive action waiting on the user's explicit go-ahead. There is
/// no way around the prompt: the operations it guards are private until
/// [`Planner::confirm_pending`] runs.
#[derive(Debug, Clone)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
    pub destructive: bool,
    action: PendingAction,
}

#[derive(Debug, Clone)]
enum PendingAction {
    DeleteActivity(ActivityId),
    DeleteTrip(TripId),
    RemoveMember(MemberId),
    DeleteMemory(MemoryId),
    DeleteChecklistItem { category: String, item: u64 },
}

/// Which slices of state a change notification has invalidated. Bursts of
/// notifications pile onto the same flags, so one [`Planner::sync_pending`]
/// reloads each slice at most once however noisy the burst was.
#[derive(Default)]
struct Dirty {
    days: Cell<bool>,
    activities: Cell<bool>,
    memories: Cell<bool>,
}

pub struct Planner<S: RemoteStore> {
    store: S,
    user: RefCell<Option<UserIdentity>>,
    state: RefCell<ItineraryState>,
    feed: RefCell<MemoryFeed>,
    checklist: RefCell<Checklist>,
    notices: NoticeQueue,
    confirm: RefCell<Option<ConfirmPrompt>>,
    dirty: Rc<Dirty>,
    trip_subs: RefCell<Vec<ListenerKey>>,
    activity_sub: RefCell<Option<ListenerKey>>,
    open_trip: Cell<Option<TripId>>,
}

impl<S: RemoteStore> Planner<S> {
    pub fn new(store: S) -> Self {
        Planner {
            store,
            user: RefCell::new(None),
            state: RefCell::new(ItineraryState::new()),
            feed: RefCell::new(MemoryFeed::new()),
            checklist: RefCell::new(Checklist::seeded()),
            notices: NoticeQueue::new(),
            confirm: RefCell::new(None),
            dirty: Rc::new(Dirty::default()),
            trip_subs: RefCell::new(Vec::new()),
            activity_sub: RefCell::new(None),
            open_trip: Cell::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // --- snapshots for the view layer ---

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.borrow().lifecycle()
    }

    pub fn trip(&self) -> Option<Trip> {
        self.state.borrow().trip().cloned()
    }

    pub fn access(&self) -> Access {
        self.state.borrow().access()
    }

    pub fn days(&self) -> Vector<Day> {
        self.state.borrow().days().clone()
    }

    pub fn selected_day_index(&self) -> usize {
        self.state.borrow().selected_day_index()
    }

    pub fn selected_day(&self) -> Option<Day> {
        self.state.borrow().selected_day().cloned()
    }

    pub fn activities(&self) -> Vector<Activity> {
        self.state.borrow().activities().clone()
    }

    pub fn budget(&self) -> BudgetSummary {
        self.state.borrow().budget()
    }

    pub fn route_markers(&self) -> Vec<RouteMarker> {
        self.state.borrow().route_markers()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.user.borrow().clone()
    }

    pub fn editing(&self) -> bool {
        self.state.borrow().editing()
    }

    pub fn can_edit(&self) -> bool {
        self.state.borrow().can_edit()
    }

    /// Drag sessions may only start while editing with edit rights; the
    /// widget checks this before it lets a row lift.
    pub fn can_drag(&self) -> bool {
        let state = self.state.borrow();
        state.lifecycle() == Lifecycle::Ready && state.editing() && state.can_edit()
    }

    /// Everything queued for the toast rail, oldest first.
    pub fn drain_notices(&self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub fn pending_confirm(&self) -> Option<ConfirmPrompt> {
        self.confirm.borrow().clone()
    }

    pub fn memory_feed(&self) -> Vector<MemoryPost> {
        self.feed.borrow().posts().clone()
    }

    pub fn memory_feed_loaded(&self) -> bool {
        self.feed.borrow().loaded()
    }

    // --- opening a trip ---

    /// Load a trip and make it the open one: resolve what this session may
    /// do with it, make sure it has at least one day (creating Day 1 when
    /// the trip is brand new), load the first day's activities, and start
    /// listening for collaborators' changes.
    ///
    /// A trip that does not resolve (missing, or not visible to this
    /// session; the store will not say which) fails the whole view.
    pub async fn open(&self, trip_id: TripId) -> Result<(), PlanError> {
        self.teardown_subscriptions();
        self.open_trip.set(Some(trip_id));
        self.confirm.borrow_mut().take();
        self.state.borrow_mut().begin_load();
        self.feed.borrow_mut().reset();

        let user = self.store.current_user().await;
        *self.user.borrow_mut() = user.clone();

        let trip = match self.store.get_trip(trip_id).await {
            Ok(trip) => trip,
            Err(e) => {
                log::warn!("trip {} failed to load: {e}", trip_id.0);
                self.state.borrow_mut().fail_load();
                self.notices.error("This trip could not be found");
                return Err(e.into());
            }
        };

        let access = self.resolve_access(&trip, user.as_ref()).await;

        let days = match self.store.list_days(trip_id).await {
            Ok(days) => days,
            Err(e) => {
                self.state.borrow_mut().fail_load();
                self.notices.error("This trip could not be loaded");
                return Err(e.into());
            }
        };

        let days = if days.is_empty() {
            self.state.borrow_mut().note_bootstrap(true);
            match self.store.create_day(trip_id, 0, "Day 1").await {
                Ok(day) => vec![day],
                Err(e) => {
                    log::warn!("first-day bootstrap failed for trip {}: {e}", trip_id.0);
                    self.state.borrow_mut().fail_load();
                    self.notices.error("This trip could not be prepared");
                    return Err(e.into());
                }
            }
        } else {
            self.state.borrow_mut().note_bootstrap(false);
            days
        };

        self.state.borrow_mut().finish_load(trip, access, days);
        self.setup_subscriptions(trip_id);
        self.reload_activities().await?;
        Ok(())
    }

    /// Forget the open trip and stop listening for its changes.
    pub fn close(&self) {
        self.teardown_subscriptions();
        self.open_trip.set(None);
        self.confirm.borrow_mut().take();
        self.state.borrow_mut().reset();
        self.feed.borrow_mut().reset();
    }

    async fn resolve_access(&self, trip: &Trip, user: Option<&UserIdentity>) -> Access {
        let Some(user) = user else {
            return Access::ReadOnly;
        };
        if trip.owner == user.id {
            return Access::Owner;
        }
        match self.store.list_members(trip.id).await {
            Ok(members) => members
                .iter()
                .find(|m| m.email.eq_ignore_ascii_case(&user.email))
                .map(|m| Access::Member(m.role))
                .unwrap_or(Access::ReadOnly),
            Err(e) => {
                log::debug!("membership lookup failed, treating as read-only: {e}");
                Access::ReadOnly
            }
        }
    }

    fn setup_subscriptions(&self, trip_id: TripId) {
        let mut subs = self.trip_subs.borrow_mut();
        let flag = |cell: fn(&Dirty) -> &Cell<bool>| {
            let dirty = Rc::clone(&self.dirty);
            move || cell(&dirty).set(true)
        };
        subs.push(self.store.subscribe(
            ChangeFilter::scoped(tables::DAYS, trip_id.0),
            flag(|d| &d.days),
        ));
        for table in [tables::MEMORIES, tables::COMMENTS, tables::LIKES] {
            subs.push(self.store.subscribe(
                ChangeFilter::scoped(table, trip_id.0),
                flag(|d| &d.memories),
            ));
        }
        drop(subs);

        if let Some(day) = self.state.borrow().selected_day() {
            self.subscribe_activities(day.id);
        }
    }

    fn subscribe_activities(&self, day: DayId) {
        let mut sub = self.activity_sub.borrow_mut();
        if let Some(key) = sub.take() {
            self.store.unsubscribe(key);
        }
        let dirty = Rc::clone(&self.dirty);
        *sub = Some(self.store.subscribe(
            ChangeFilter::scoped(tables::ACTIVITIES, day.0),
            move || dirty.activities.set(true),
        ));
    }

    fn teardown_subscriptions(&self) {
        for key in self.trip_subs.borrow_mut().drain(..) {
            self.store.unsubscribe(key);
        }
        if let Some(key) = self.activity_sub.borrow_mut().take() {
            self.store.unsubscribe(key);
        }
        self.dirty.days.set(false);
        self.dirty.activities.set(false);
        self.dirty.memories.set(false);
    }

    // --- day navigation ---

    /// Point the view at another day and reload its activities. Out-of-range
    /// indexes are a no-op; sessions that are not the owner or a member may
    /// not navigate at all.
    pub async fn select_day(&self, index: usize) -> Result<(), PlanError> {
        let day = {
            let mut state = self.state.borrow_mut();
            if state.lifecycle() != Lifecycle::Ready {
                return Ok(());
            }
            if !state.access().is_participant() {
                log::debug!("day selection refused for a read-only session");
                return Err(PlanError::ReadOnly);
            }
            if !state.select_day(index) {
                return Ok(());
            }
            state.selected_day().cloned()
        };
        if let Some(day) = day {
            self.subscribe_activities(day.id);
        }
        self.reload_activities().await
    }

    /// Re-fetch the selected day's activities and reconcile them into the
    /// list (in-flight optimistic entries survive the refresh).
    pub async fn load_activities(&self) -> Result<(), PlanError> {
        self.reload_activities().await
    }

    async fn reload_activities(&self) -> Result<(), PlanError> {
        let Some(day) = self.state.borrow().selected_day().cloned() else {
            return Ok(());
        };
        match self.store.list_activities(day.id).await {
            Ok(fresh) => {
                self.state.borrow_mut().reconcile_activities(fresh);
                Ok(())
            }
            Err(e) => {
                log::warn!("activities for day {} failed to load: {e}", day.id.0);
                self.notices.error("The day's plan could not be loaded");
                Err(e.into())
            }
        }
    }

    async fn reload_days(&self) -> Result<(), PlanError> {
        let Some(trip_id) = self.open_trip.get() else {
            return Ok(());
        };
        let before = self.state.borrow().selected_day().map(|d| d.id);
        let days = self.store.list_days(trip_id).await?;
        self.state.borrow_mut().replace_days(days);
        let after = self.state.borrow().selected_day().cloned();
        if let Some(day) = after {
            if before != Some(day.id) {
                self.subscribe_activities(day.id);
                return self.reload_activities().await;
            }
        }
        Ok(())
    }

    /// Apply whatever change notifications have piled up since the last
    /// call: one reload per invalidated slice, however many notifications
    /// arrived. The shell calls this from its idle/microtask hook.
    pub async fn sync_pending(&self) -> Result<(), PlanError> {
        if self.state.borrow().lifecycle() != Lifecycle::Ready {
            return Ok(());
        }
        if self.dirty.days.replace(false) {
            self.reload_days().await?;
        }
        if self.dirty.activities.replace(false) {
            self.reload_activities().await?;
        }
        if self.dirty.memories.replace(false) && self.feed.borrow().loaded() {
            self.reload_memories().await?;
        }
        Ok(())
    }

    /// Whether a change notification is waiting to be applied.
    pub fn has_pending_changes(&self) -> bool {
        self.dirty.days.get() || self.dirty.activities.get() || self.dirty.memories.get()
    }

    // --- editing mode ---

    pub fn set_editing(&self, editing: bool) {
        let mut state = self.state.borrow_mut();
        if editing && !state.can_edit() {
            log::debug!("editing mode refused for a read-only session");
            return;
        }
        state.set_editing(editing);
    }

    // --- itinerary mutations ---

    /// Add an activity to the selected day. The entry shows up in the list
    /// immediately under a placeholder id; the store insert follows, and a
    /// refusal takes exactly that entry back out.
    pub async fn create_activity(&self, draft: ActivityDraft) -> Result<ActivityId, PlanError> {
        let (key, day_id, sort_order) = {
            let mut state = self.state.borrow_mut();
            if !state.can_edit() {
                return Err(PlanError::ReadOnly);
            }
            if let Err(e) = draft.validate() {
                self.notices.error(e.to_string());
                return Err(e);
            }
            let Some((key, placeholder)) = state.begin_create(&draft) else {
                return Err(PlanError::NotFound);
            };
            (key, placeholder.day_id, placeholder.sort_order)
        };

        match self.store.create_activity(day_id, &draft, sort_order).await {
            Ok(created) => {
                self.state.borrow_mut().settle_success(key);
                self.reload_activities().await.ok();
                self.notices.success("Activity added");
                Ok(created.id)
            }
            Err(e) => {
                self.state.borrow_mut().settle_failure(key);
                self.notices.error("The activity could not be saved");
                Err(e.into())
            }
        }
    }

    /// Rewrite an activity's fields. The list shows the new version right
    /// away; if the store refuses, the previous version comes back.
    pub async fn update_activity(
        &self,
        id: ActivityId,
        draft: ActivityDraft,
    ) -> Result<(), PlanError> {
        let key = {
            let mut state = self.state.borrow_mut();
            if !state.can_edit() {
                return Err(PlanError::ReadOnly);
            }
            if let Err(e) = draft.validate() {
                self.notices.error(e.to_string());
                return Err(e);
            }
            if id.is_placeholder() {
                log::debug!("edit refused: activity is still being created");
                return Err(PlanError::NotFound);
            }
            match state.begin_update(id, &draft) {
                Some(key) => key,
                None => return Err(PlanError::NotFound),
            }
        };

        match self.store.update_activity(id, &draft).await {
            Ok(()) => {
                self.state.borrow_mut().settle_success(key);
                self.notices.success("Activity updated");
                Ok(())
            }
            Err(e) => {
                self.state.borrow_mut().settle_failure(key);
                self.notices.error("The changes could not be saved");
                Err(e.into())
            }
        }
    }

    /// Arm the confirm prompt for deleting an activity. `true` when the
    /// prompt is up; the deletion itself waits for `confirm_pending`.
    pub fn request_delete_activity(&self, id: ActivityId) -> bool {
        let state = self.state.borrow();
        if !state.can_edit() || id.is_placeholder() {
            return false;
        }
        let Some(activity) = state.activity(id) else {
            return false;
        };
        let prompt = ConfirmPrompt {
            title: "Delete this activity?".into(),
            message: format!(
                "\"{}\" will be removed from the plan. This cannot be undone.",
                activity.title
            ),
            destructive: true,
            action: PendingAction::DeleteActivity(id),
        };
        drop(state);
        *self.confirm.borrow_mut() = Some(prompt);
        true
    }

    /// Run the armed destructive action.
    pub async fn confirm_pending(&self) -> Result<(), PlanError> {
        let Some(prompt) = self.confirm.borrow_mut().take() else {
            return Ok(());
        };
        match prompt.action {
            PendingAction::DeleteActivity(id) => self.delete_activity_now(id).await,
            PendingAction::DeleteTrip(id) => self.delete_trip_now(id).await,
            PendingAction::RemoveMember(id) => self.remove_member_now(id).await,
            PendingAction::DeleteMemory(id) => self.delete_memory_now(id).await,
            PendingAction::DeleteChecklistItem { category, item } => {
                if self.checklist.borrow_mut().remove(&category, item) {
                    self.notices.info("Removed from the checklist");
                }
                Ok(())
            }
        }
    }

    /// Put the armed action down without running it.
    pub fn cancel_pending(&self) {
        self.confirm.borrow_mut().take();
    }

    async fn delete_activity_now(&self, id: ActivityId) -> Result<(), PlanError> {
        let Some(key) = self.state.borrow_mut().begin_delete(id) else {
            return Err(PlanError::NotFound);
        };
        match self.store.delete_activity(id).await {
            Ok(()) => {
                self.state.borrow_mut().settle_success(key);
                self.notices.success("Activity deleted");
                Ok(())
            }
            Err(e) => {
                self.state.borrow_mut().settle_failure(key);
                self.notices.error("The activity could not be deleted");
                Err(e.into())
            }
        }
    }

    /// Land a finished drag: splice the dragged activity to its drop
    /// position, renumber the day, and persist the new order as one batch.
    /// If persistence fails, possibly partially on backends without
    /// transactions, the pre-drag order comes back and the day reloads, so
    /// screen and store never drift apart silently.
    pub async fn drag_end(&self, event: DragEnd) -> Result<(), PlanError> {
        let Some(over) = event.over else {
            return Ok(());
        };
        if over == event.active {
            return Ok(());
        }

        let begun = {
            let mut state = self.state.borrow_mut();
            if !(state.lifecycle() == Lifecycle::Ready && state.editing() && state.can_edit()) {
                log::debug!("drag ignored: session may not reorder right now");
                return Ok(());
            }
            let Some(day) = state.selected_day().map(|d| d.id) else {
                return Ok(());
            };
            state
                .begin_reorder(event.active, over)
                .map(|(key, updates)| (key, day, updates))
        };
        let Some((key, day_id, updates)) = begun else {
            return Ok(());
        };
        if updates.is_empty() {
            self.state.borrow_mut().settle_success(key);
            return Ok(());
        }

        match self.store.update_sort_orders(day_id, &updates).await {
            Ok(()) => {
                self.state.borrow_mut().settle_success(key);
                Ok(())
            }
            Err(e) => {
                self.state.borrow_mut().settle_failure(key);
                self.notices.error("The new order could not be saved");
                let result = Err(e.into());
                // Some rows may have landed; adopt whatever the store says.
                self.reload_activities().await.ok();
                result
            }
        }
    }

    // --- memories ---

    pub async fn load_memories(&self) -> Result<(), PlanError> {
        self.reload_memories().await
    }

    async fn reload_memories(&self) -> Result<(), PlanError> {
        let Some(trip_id) = self.open_trip.get() else {
            return Ok(());
        };
        match self.store.list_memories(trip_id).await {
            Ok(posts) => {
                self.feed.borrow_mut().replace(posts);
                Ok(())
            }
            Err(e) => {
                self.notices.error("Memories could not be loaded");
                Err(e.into())
            }
        }
    }

    /// Share a memory on the open trip. Needs text or a photo, and a
    /// signed-in participant.
    pub async fn publish_memory(&self, draft: MemoryDraft) -> Result<MemoryId, PlanError> {
        let Some(trip_id) = self.open_trip.get() else {
            return Err(PlanError::NotFound);
        };
        if self.user.borrow().is_none() {
            self.notices.info("Sign in to share memories");
            return Err(PlanError::ReadOnly);
        }
        if let Err(e) = draft.validate() {
            self.notices.error(e.to_string());
            return Err(e);
        }

        match self.store.create_memory(trip_id, &draft).await {
            Ok(id) => {
                self.notices.success("Memory shared");
                self.reload_memories().await.ok();
                Ok(id)
            }
            Err(e) => {
                self.notices.error("The memory could not be shared");
                Err(e.into())
            }
        }
    }

    /// Flip the current user's like on a post.
    pub async fn toggle_like(&self, id: MemoryId) -> Result<(), PlanError> {
        let Some(user) = self.user.borrow().clone() else {
            return Err(PlanError::ReadOnly);
        };
        let liked_now = match self.feed.borrow().post(id) {
            Some(post) => post.liked_by(&user.id),
            None => return Err(PlanError::NotFound),
        };

        self.store.set_liked(id, !liked_now).await?;
        self.reload_memories().await.ok();
        Ok(())
    }

    pub async fn add_comment(&self, post: MemoryId, content: &str) -> Result<(), PlanError> {
        if content.trim().is_empty() {
            return Err(PlanError::Validation("A comment needs some text".into()));
        }
        match self.store.add_comment(post, content.trim()).await {
            Ok(_) => {
                self.reload_memories().await.ok();
                Ok(())
            }
            Err(e) => {
                self.notices.error("The comment could not be posted");
                Err(e.into())
            }
        }
    }

    /// Post authors moderate their own comment threads.
    pub async fn delete_comment(&self, comment: CommentId) -> Result<(), PlanError> {
        match self.store.delete_comment(comment).await {
            Ok(()) => {
                self.reload_memories().await.ok();
                Ok(())
            }
            Err(e) => {
                self.notices.error("The comment could not be removed");
                Err(e.into())
            }
        }
    }

    /// Arm the confirm prompt for deleting one of the current user's posts.
    pub fn request_delete_memory(&self, id: MemoryId) -> bool {
        let user = self.user.borrow();
        let feed = self.feed.borrow();
        let Some(post) = feed.post(id) else {
            return false;
        };
        if user.as_ref().map(|u| &u.id) != Some(&post.author) {
            return false;
        }
        drop(feed);
        drop(user);
        *self.confirm.borrow_mut() = Some(ConfirmPrompt {
            title: "Delete this memory?".into(),
            message: "The post, its comments and its likes will be gone for good.".into(),
            destructive: true,
            action: PendingAction::DeleteMemory(id),
        });
        true
    }

    async fn delete_memory_now(&self, id: MemoryId) -> Result<(), PlanError> {
        match self.store.delete_memory(id).await {
            Ok(()) => {
                self.notices.success("Memory deleted");
                self.reload_memories().await.ok();
                Ok(())
            }
            Err(e) => {
                self.notices.error("The memory could not be deleted");
                Err(e.into())
            }
        }
    }

    // --- members & sharing ---

    pub async fn members(&self) -> Result<Vec<TripMember>, PlanError> {
        let Some(trip_id) = self.open_trip.get() else {
            return Err(PlanError::NotFound);
        };
        Ok(self.store.list_members(trip_id).await?)
    }

    /// Invite a collaborator by email. Owner only.
    pub async fn invite_member(&self, email: &str, role: MemberRole) -> Result<(), PlanError> {
        let Some(trip_id) = self.open_trip.get() else {
            return Err(PlanError::NotFound);
        };
        if self.state.borrow().access() != Access::Owner {
            return Err(PlanError::ReadOnly);
        }
        if !records::looks_like_email(email) {
            let e = PlanError::Validation("That doesn't look like an email address".into());
            self.notices.error(e.to_string());
            return Err(e);
        }

        match self.store.invite_member(trip_id, email.trim(), role).await {
            Ok(_) => {
                self.notices.success("Invitation sent");
                Ok(())
            }
            Err(e) => {
                self.notices.error("The invitation could not be sent");
                Err(e.into())
            }
        }
    }

    /// Arm the confirm prompt for removing a collaborator. Owner only.
    pub fn request_remove_member(&self, member: &TripMember) -> bool {
        if self.state.borrow().access() != Access::Owner {
            return false;
        }
        *self.confirm.borrow_mut() = Some(ConfirmPrompt {
            title: "Remove this member?".into(),
            message: format!(
                "{} will lose access to the trip. This cannot be undone.",
                member.email
            ),
            destructive: true,
            action: PendingAction::RemoveMember(member.id),
        });
        true
    }

    async fn remove_member_now(&self, id: MemberId) -> Result<(), PlanError> {
        match self.store.remove_member(id).await {
            Ok(()) => {
                self.notices.success("Member removed");
                Ok(())
            }
            Err(e) => {
                self.notices.error("The member could not be removed");
                Err(e.into())
            }
        }
    }

    // --- trips ---

    async fn ensure_user(&self) -> Option<UserIdentity> {
        {
            let user = self.user.borrow();
            if user.is_some() {
                return user.clone();
            }
        }
        let fetched = self.store.current_user().await;
        *self.user.borrow_mut() = fetched.clone();
        fetched
    }

    /// Trips the signed-in user owns or collaborates on, newest first.
    pub async fn my_trips(&self) -> Result<Vec<Trip>, PlanError> {
        let Some(user) = self.ensure_user().await else {
            return Err(PlanError::ReadOnly);
        };
        Ok(self.store.list_trips_for(&user).await?)
    }

    /// Start a new trip owned by the signed-in user.
    pub async fn create_trip(&self, draft: TripDraft) -> Result<Trip, PlanError> {
        if self.ensure_user().await.is_none() {
            self.notices.info("Sign in to create a trip");
            return Err(PlanError::ReadOnly);
        }
        if let Err(e) = draft.validate() {
            self.notices.error(e.to_string());
            return Err(e);
        }

        match self.store.create_trip(&draft).await {
            Ok(trip) => {
                self.notices.success("Trip created");
                Ok(trip)
            }
            Err(e) => {
                self.notices.error("The trip could not be created");
                Err(e.into())
            }
        }
    }

    /// Arm the confirm prompt for deleting a whole trip.
    pub fn request_delete_trip(&self, id: TripId) -> bool {
        if self.user.borrow().is_none() {
            return false;
        }
        let title = {
            let state = self.state.borrow();
            match state.trip() {
                Some(trip) if trip.id == id => trip.title.clone(),
                _ => "This trip".to_string(),
            }
        };
        *self.confirm.borrow_mut() = Some(ConfirmPrompt {
            title: "Delete this trip?".into(),
            message: format!(
                "\"{title}\" and every day, activity and memory in it will be deleted. This cannot be undone."
            ),
            destructive: true,
            action: PendingAction::DeleteTrip(id),
        });
        true
    }

    async fn delete_trip_now(&self, id: TripId) -> Result<(), PlanError> {
        match self.store.delete_trip(id).await {
            Ok(()) => {
                self.notices.success("Trip deleted");
                if self.open_trip.get() == Some(id) {
                    self.close();
                }
                Ok(())
            }
            Err(e) => {
                self.notices.error("The trip could not be deleted");
                Err(e.into())
            }
        }
    }

    // --- checklist ---

    pub fn checklist(&self) -> Checklist {
        self.checklist.borrow().clone()
    }

    pub fn checklist_progress(&self) -> ChecklistProgress {
        self.checklist.borrow().progress()
    }

    /// The next few unfinished items, for the sidebar preview.
    pub fn checklist_pending(&self, limit: usize) -> Vec<(String, ChecklistItem)> {
        self.checklist.borrow().pending(limit)
    }

    pub fn toggle_checklist_item(&self, category: &str, item: u64) -> bool {
        self.checklist.borrow_mut().toggle(category, item)
    }

    pub fn add_checklist_item(&self, category: &str, text: &str) -> Option<u64> {
        let added = self.checklist.borrow_mut().add(category, text);
        if added.is_some() {
            self.notices.success("Added to the checklist");
        }
        added
    }

    pub fn request_delete_checklist_item(&self, category: &str, item: u64) -> bool {
        let exists = self
            .checklist
            .borrow()
            .categories()
            .any(|(slug, cat)| slug == category && cat.items.iter().any(|i| i.id == item));
        if !exists {
            return false;
        }
        *self.confirm.borrow_mut() = Some(ConfirmPrompt {
            title: "Remove this item?".into(),
            message: "It will be taken off the packing checklist.".into(),
            destructive: true,
            action: PendingAction::DeleteChecklistItem {
                category: category.to_string(),
                item,
            },
        });
        true
    }
}
