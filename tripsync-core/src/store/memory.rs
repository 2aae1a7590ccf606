//! An in-memory rendition of the hosted database.
//!
//! One [`MemoryStore`] is the shared backend: tables, change hub, logical
//! clock. Each client opens a [`MemorySession`] against it carrying its own
//! identity, the way every browser tab holds its own auth token against the
//! same project. Two sessions on one store therefore see each other's
//! writes and change notifications, which is exactly what the collaboration
//! tests need.
//!
//! Row access mirrors the hosted service's row-level rules: private trips
//! resolve only for the owner and invited members, and a missing row is
//! indistinguishable from a forbidden one. Every call suspends once, like
//! the network round-trip it stands in for, so callers can be observed
//! mid-flight.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use basecamp::table::{Fault, Table};
use basecamp::{Change, ChangeFilter, ChangeHub, ListenerKey, StoreError};
use chrono::{DateTime, Utc};

use crate::memories::{Comment, MemoryDraft, MemoryPost};
use crate::records::{
    Activity, ActivityDraft, ActivityId, CommentId, Day, DayId, MemberId, MemberRole, MemoryId,
    Trip, TripDraft, TripId, TripMember, UserId, UserIdentity,
};
use crate::store::{RemoteStore, tables};

/// Seconds since the epoch for the first tick of the logical clock.
const CLOCK_BASE: i64 = 1_754_006_400;

#[derive(Debug, Clone)]
struct MemoryRow {
    id: i64,
    trip_id: TripId,
    author: UserId,
    author_name: String,
    avatar: Option<String>,
    content: String,
    images: Vec<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: i64,
    memory_id: i64,
    author: UserId,
    author_name: String,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct LikeRow {
    memory_id: i64,
    user: UserId,
}

pub struct MemoryStore {
    trips: RefCell<Table<Trip>>,
    days: RefCell<Table<Day>>,
    activities: RefCell<Table<Activity>>,
    members: RefCell<Table<TripMember>>,
    memories: RefCell<Table<MemoryRow>>,
    comments: RefCell<Table<CommentRow>>,
    likes: RefCell<Table<LikeRow>>,
    hub: ChangeHub,
    clock: Cell<i64>,
    write_ops: Cell<u64>,
    atomic_reorder: Cell<bool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            trips: RefCell::new(Table::new()),
            days: RefCell::new(Table::new()),
            activities: RefCell::new(Table::new()),
            members: RefCell::new(Table::new()),
            memories: RefCell::new(Table::new()),
            comments: RefCell::new(Table::new()),
            likes: RefCell::new(Table::new()),
            hub: ChangeHub::new(),
            clock: Cell::new(0),
            write_ops: Cell::new(0),
            atomic_reorder: Cell::new(true),
        }
    }

    /// Plan the outcome of an upcoming write against one table.
    pub fn fail_next(&self, table: &'static str, fault: Fault) {
        match table {
            tables::TRIPS => self.trips.borrow_mut().push_fault(fault),
            tables::DAYS => self.days.borrow_mut().push_fault(fault),
            tables::ACTIVITIES => self.activities.borrow_mut().push_fault(fault),
            tables::TRIP_MEMBERS => self.members.borrow_mut().push_fault(fault),
            tables::MEMORIES => self.memories.borrow_mut().push_fault(fault),
            tables::COMMENTS => self.comments.borrow_mut().push_fault(fault),
            tables::LIKES => self.likes.borrow_mut().push_fault(fault),
            other => log::warn!("fault planned for unknown table {other}"),
        }
    }

    /// Whether reorder batches apply all-or-nothing (the default) or row by
    /// row like a backend without transactions.
    pub fn set_atomic_reorder(&self, atomic: bool) {
        self.atomic_reorder.set(atomic);
    }

    /// How many write calls have reached this backend, successful or not.
    pub fn write_ops(&self) -> u64 {
        self.write_ops.get()
    }

    /// Direct peek for tests: a trip's days in navigation order.
    pub fn stored_days(&self, trip: TripId) -> Vec<Day> {
        self.days
            .borrow()
            .select_sorted_by(|d| d.trip_id == trip, |d| d.day_index)
    }

    /// Direct peek for tests: a day's activities in timeline order.
    pub fn stored_activities(&self, day: DayId) -> Vec<Activity> {
        self.activities
            .borrow()
            .select_sorted_by(|a| a.day_id == day, |a| a.sort_order)
    }

    fn now(&self) -> DateTime<Utc> {
        let tick = self.clock.get() + 1;
        self.clock.set(tick);
        DateTime::from_timestamp(CLOCK_BASE + tick, 0).unwrap_or_default()
    }

    fn note_write(&self) {
        self.write_ops.set(self.write_ops.get() + 1);
    }

    fn trip_by_id(&self, id: TripId) -> Option<Trip> {
        self.trips.borrow().get(id.0).cloned()
    }

    fn is_member(&self, trip: TripId, user: &UserIdentity) -> Option<MemberRole> {
        self.members
            .borrow()
            .find(|m| m.trip_id == trip && m.email.eq_ignore_ascii_case(&user.email))
            .map(|m| m.role)
    }

    fn can_read(&self, trip: &Trip, user: Option<&UserIdentity>) -> bool {
        if trip.is_public {
            return true;
        }
        match user {
            Some(user) => trip.owner == user.id || self.is_member(trip.id, user).is_some(),
            None => false,
        }
    }

    fn can_edit(&self, trip: &Trip, user: Option<&UserIdentity>) -> bool {
        match user {
            Some(user) => {
                trip.owner == user.id || self.is_member(trip.id, user) == Some(MemberRole::Editor)
            }
            None => false,
        }
    }

    fn is_participant(&self, trip: &Trip, user: Option<&UserIdentity>) -> bool {
        match user {
            Some(user) => trip.owner == user.id || self.is_member(trip.id, user).is_some(),
            None => false,
        }
    }

    /// The trip a row hangs off, readable by this user; `NotFound`
    /// otherwise, matching how the hosted rules hide rows.
    fn readable_trip(&self, id: TripId, user: Option<&UserIdentity>) -> Result<Trip, StoreError> {
        match self.trip_by_id(id) {
            Some(trip) if self.can_read(&trip, user) => Ok(trip),
            _ => Err(StoreError::NotFound),
        }
    }

    fn editable_trip(&self, id: TripId, user: Option<&UserIdentity>) -> Result<Trip, StoreError> {
        let trip = self.readable_trip(id, user)?;
        if self.can_edit(&trip, user) {
            Ok(trip)
        } else {
            Err(StoreError::Rejected("not allowed to edit this trip".into()))
        }
    }

    fn day_by_id(&self, id: DayId) -> Result<Day, StoreError> {
        self.days.borrow().get(id.0).cloned().ok_or(StoreError::NotFound)
    }

    fn activity_by_id(&self, id: ActivityId) -> Result<Activity, StoreError> {
        self.activities
            .borrow()
            .get(id.0)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn memory_by_id(&self, id: MemoryId) -> Result<MemoryRow, StoreError> {
        self.memories
            .borrow()
            .get(id.0)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn assemble_post(&self, row: MemoryRow) -> MemoryPost {
        let comments = self
            .comments
            .borrow()
            .select_sorted_by(|c| c.memory_id == row.id, |c| c.created_at)
            .into_iter()
            .map(|c| Comment {
                id: CommentId(c.id),
                author: c.author,
                author_name: c.author_name,
                content: c.content,
                created_at: c.created_at,
            })
            .collect();
        let likes = self
            .likes
            .borrow()
            .select(|l| l.memory_id == row.id)
            .into_iter()
            .map(|l| l.user)
            .collect();
        MemoryPost {
            id: MemoryId(row.id),
            trip_id: row.trip_id,
            author: row.author,
            author_name: row.author_name,
            avatar: row.avatar,
            content: row.content,
            images: row.images,
            created_at: row.created_at,
            comments,
            likes,
        }
    }
}

/// One client's handle on a [`MemoryStore`]. Cheap to clone; clones share
/// the identity.
#[derive(Clone)]
pub struct MemorySession {
    backend: Rc<MemoryStore>,
    user: Option<UserIdentity>,
}

impl MemorySession {
    /// A client handle with its own identity against a shared backend.
    pub fn signed_in(backend: &Rc<MemoryStore>, user: UserIdentity) -> Self {
        MemorySession {
            backend: Rc::clone(backend),
            user: Some(user),
        }
    }

    pub fn anonymous(backend: &Rc<MemoryStore>) -> Self {
        MemorySession {
            backend: Rc::clone(backend),
            user: None,
        }
    }

    pub fn backend(&self) -> &Rc<MemoryStore> {
        &self.backend
    }

    fn require_user(&self) -> Result<&UserIdentity, StoreError> {
        self.user
            .as_ref()
            .ok_or_else(|| StoreError::Rejected("not signed in".into()))
    }
}

/// Stands in for the network: suspends exactly once, then resolves. The
/// suspension is what lets tests watch optimistic state before the "server"
/// has answered.
fn round_trip() -> RoundTrip {
    RoundTrip { crossed: false }
}

struct RoundTrip {
    crossed: bool,
}

impl Future for RoundTrip {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.crossed {
            Poll::Ready(())
        } else {
            self.crossed = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

impl RemoteStore for MemorySession {
    async fn current_user(&self) -> Option<UserIdentity> {
        round_trip().await;
        self.user.clone()
    }

    async fn get_trip(&self, id: TripId) -> Result<Trip, StoreError> {
        round_trip().await;
        self.backend.readable_trip(id, self.user.as_ref())
    }

    async fn list_trips_for(&self, user: &UserIdentity) -> Result<Vec<Trip>, StoreError> {
        round_trip().await;
        let member_of: HashSet<i64> = self
            .backend
            .members
            .borrow()
            .select(|m| m.email.eq_ignore_ascii_case(&user.email))
            .into_iter()
            .map(|m| m.trip_id.0)
            .collect();
        let mut trips = self
            .backend
            .trips
            .borrow()
            .select(|t| t.owner == user.id || member_of.contains(&t.id.0));
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trips)
    }

    async fn create_trip(&self, draft: &TripDraft) -> Result<Trip, StoreError> {
        round_trip().await;
        self.backend.note_write();
        let owner = self.require_user()?;
        let trip = {
            let mut trips = self.backend.trips.borrow_mut();
            let id = trips.allocate_id();
            let trip = Trip {
                id: TripId(id),
                title: draft.title.clone(),
                created_at: self.backend.now(),
                start_date: draft.start_date,
                cover_image: draft.cover_image.clone(),
                budget_limit: draft.budget_limit,
                owner: owner.id.clone(),
                is_public: draft.is_public,
            };
            trips.insert(id, trip.clone())?;
            trip
        };
        self.backend.hub.publish(Change::scoped(tables::TRIPS, trip.id.0));
        Ok(trip)
    }

    async fn delete_trip(&self, id: TripId) -> Result<(), StoreError> {
        round_trip().await;
        self.backend.note_write();
        let user = self.require_user()?;
        let trip = self.backend.readable_trip(id, Some(user))?;
        if trip.owner != user.id {
            return Err(StoreError::Rejected(
                "only the owner can delete a trip".into(),
            ));
        }

        self.backend.trips.borrow_mut().remove(id.0)?;

        // Cascade: everything under the trip goes with it.
        let day_ids: HashSet<i64> = {
            let mut days = self.backend.days.borrow_mut();
            let ids = days
                .select(|d| d.trip_id == id)
                .into_iter()
                .map(|d| d.id.0)
                .collect();
            days.remove_where(|d| d.trip_id == id);
            ids
        };
        self.backend
            .activities
            .borrow_mut()
            .remove_where(|a| day_ids.contains(&a.day_id.0));
        self.backend.members.borrow_mut().remove_where(|m| m.trip_id == id);
        let memory_ids: HashSet<i64> = {
            let mut memories = self.backend.memories.borrow_mut();
            let ids = memories
                .select(|m| m.trip_id == id)
                .into_iter()
                .map(|m| m.id)
                .collect();
            memories.remove_where(|m| m.trip_id == id);
            ids
        };
        self.backend
            .comments
            .borrow_mut()
            .remove_where(|c| memory_ids.contains(&c.memory_id));
        self.backend
            .likes
            .borrow_mut()
            .remove_where(|l| memory_ids.contains(&l.memory_id));

        self.backend.hub.publish(Change::scoped(tables::TRIPS, id.0));
        Ok(())
    }

    async fn list_days(&self, trip: TripId) -> Result<Vec<Day>, StoreError> {
        round_trip().await;
        self.backend.readable_trip(trip, self.user.as_ref())?;
        Ok(self.backend.stored_days(trip))
    }

    async fn create_day(
        &self,
        trip: TripId,
        day_index: i64,
        title: &str,
    ) -> Result<Day, StoreError> {
        round_trip().await;
        self.backend.note_write();
        self.backend.editable_trip(trip, self.user.as_ref())?;

        // Insert-or-fetch on (trip, day_index): a collaborator may have
        // bootstrapped the same trip a moment earlier.
        if let Some(existing) = self
            .backend
            .days
            .borrow()
            .find(|d| d.trip_id == trip && d.day_index == day_index)
        {
            log::debug!("day {day_index} of trip {} already exists; reusing", trip.0);
            return Ok(existing.clone());
        }

        let day = {
            let mut days = self.backend.days.borrow_mut();
            let id = days.allocate_id();
            let day = Day {
                id: DayId(id),
                trip_id: trip,
                day_index,
                title: title.to_string(),
                date: None,
            };
            days.insert(id, day.clone())?;
            day
        };
        self.backend.hub.publish(Change::scoped(tables::DAYS, trip.0));
        Ok(day)
    }

    async fn list_activities(&self, day: DayId) -> Result<Vec<Activity>, StoreError> {
        round_trip().await;
        let day = self.backend.day_by_id(day)?;
        self.backend.readable_trip(day.trip_id, self.user.as_ref())?;
        Ok(self.backend.stored_activities(day.id))
    }

    async fn create_activity(
        &self,
        day: DayId,
        draft: &ActivityDraft,
        sort_order: i64,
    ) -> Result<Activity, StoreError> {
        round_trip().await;
        self.backend.note_write();
        let day = self.backend.day_by_id(day)?;
        self.backend.editable_trip(day.trip_id, self.user.as_ref())?;

        let activity = {
            let mut activities = self.backend.activities.borrow_mut();
            let id = activities.allocate_id();
            let activity = Activity::from_draft(ActivityId(id), day.id, sort_order, draft);
            activities.insert(id, activity.clone())?;
            activity
        };
        self.backend
            .hub
            .publish(Change::scoped(tables::ACTIVITIES, day.id.0));
        Ok(activity)
    }

    async fn update_activity(
        &self,
        id: ActivityId,
        draft: &ActivityDraft,
    ) -> Result<(), StoreError> {
        round_trip().await;
        self.backend.note_write();
        let existing = self.backend.activity_by_id(id)?;
        let day = self.backend.day_by_id(existing.day_id)?;
        self.backend.editable_trip(day.trip_id, self.user.as_ref())?;

        self.backend
            .activities
            .borrow_mut()
            .update(id.0, |a| a.apply_draft(draft))?;
        self.backend
            .hub
            .publish(Change::scoped(tables::ACTIVITIES, day.id.0));
        Ok(())
    }

    async fn set_sort_order(&self, id: ActivityId, sort_order: i64) -> Result<(), StoreError> {
        round_trip().await;
        self.backend.note_write();
        let existing = self.backend.activity_by_id(id)?;
        let day = self.backend.day_by_id(existing.day_id)?;
        self.backend.editable_trip(day.trip_id, self.user.as_ref())?;

        self.backend
            .activities
            .borrow_mut()
            .update(id.0, |a| a.sort_order = sort_order)?;
        self.backend
            .hub
            .publish(Change::scoped(tables::ACTIVITIES, day.id.0));
        Ok(())
    }

    async fn update_sort_orders(
        &self,
        day: DayId,
        orders: &[(ActivityId, i64)],
    ) -> Result<(), StoreError> {
        round_trip().await;
        self.backend.note_write();
        let day = self.backend.day_by_id(day)?;
        self.backend.editable_trip(day.trip_id, self.user.as_ref())?;

        if !self.backend.atomic_reorder.get() {
            // Behave like a backend without transactions: one write per row,
            // report whatever failed.
            let mut applied = false;
            let mut failed = Vec::new();
            for (id, sort_order) in orders {
                let result = self
                    .backend
                    .activities
                    .borrow_mut()
                    .update(id.0, |a| a.sort_order = *sort_order);
                match result {
                    Ok(()) => applied = true,
                    Err(e) => {
                        log::warn!("sort_order write for activity {} failed: {e}", id.0);
                        failed.push(id.0);
                    }
                }
            }
            if applied {
                self.backend
                    .hub
                    .publish(Change::scoped(tables::ACTIVITIES, day.id.0));
            }
            return if failed.is_empty() {
                Ok(())
            } else {
                Err(StoreError::PartialWrite { failed })
            };
        }

        // All-or-nothing: fault and existence checks first, then apply.
        {
            let mut activities = self.backend.activities.borrow_mut();
            activities.take_fault()?;
            for (id, _) in orders {
                if !activities.contains(id.0) {
                    return Err(StoreError::NotFound);
                }
            }
            for (id, sort_order) in orders {
                if let Some(activity) = activities.get_mut(id.0) {
                    activity.sort_order = *sort_order;
                }
            }
        }
        self.backend
            .hub
            .publish(Change::scoped(tables::ACTIVITIES, day.id.0));
        Ok(())
    }

    async fn delete_activity(&self, id: ActivityId) -> Result<(), StoreError> {
        round_trip().await;
        self.backend.note_write();
        let existing = self.backend.activity_by_id(id)?;
        let day = self.backend.day_by_id(existing.day_id)?;
        self.backend.editable_trip(day.trip_id, self.user.as_ref())?;

        self.backend.activities.borrow_mut().remove(id.0)?;
        self.backend
            .hub
            .publish(Change::scoped(tables::ACTIVITIES, day.id.0));
        Ok(())
    }

    async fn list_members(&self, trip: TripId) -> Result<Vec<TripMember>, StoreError> {
        round_trip().await;
        self.backend.readable_trip(trip, self.user.as_ref())?;
        Ok(self.backend.members.borrow().select(|m| m.trip_id == trip))
    }

    async fn invite_member(
        &self,
        trip: TripId,
        email: &str,
        role: MemberRole,
    ) -> Result<TripMember, StoreError> {
        round_trip().await;
        self.backend.note_write();
        let user = self.require_user()?;
        let trip_row = self.backend.readable_trip(trip, Some(user))?;
        if trip_row.owner != user.id {
            return Err(StoreError::Rejected(
                "only the owner can invite members".into(),
            ));
        }
        if self
            .backend
            .members
            .borrow()
            .find(|m| m.trip_id == trip && m.email.eq_ignore_ascii_case(email))
            .is_some()
        {
            return Err(StoreError::Conflict(format!("{email} is already invited")));
        }

        let member = {
            let mut members = self.backend.members.borrow_mut();
            let id = members.allocate_id();
            let member = TripMember {
                id: MemberId(id),
                trip_id: trip,
                email: email.to_string(),
                role,
            };
            members.insert(id, member.clone())?;
            member
        };
        self.backend
            .hub
            .publish(Change::scoped(tables::TRIP_MEMBERS, trip.0));
        Ok(member)
    }

    async fn remove_member(&self, id: MemberId) -> Result<(), StoreError> {
        round_trip().await;
        self.backend.note_write();
        let user = self.require_user()?;
        let member = self
            .backend
            .members
            .borrow()
            .get(id.0)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let trip = self.backend.readable_trip(member.trip_id, Some(user))?;
        if trip.owner != user.id {
            return Err(StoreError::Rejected(
                "only the owner can remove members".into(),
            ));
        }

        self.backend.members.borrow_mut().remove(id.0)?;
        self.backend
            .hub
            .publish(Change::scoped(tables::TRIP_MEMBERS, member.trip_id.0));
        Ok(())
    }

    async fn list_memories(&self, trip: TripId) -> Result<Vec<MemoryPost>, StoreError> {
        round_trip().await;
        self.backend.readable_trip(trip, self.user.as_ref())?;
        let mut rows = self
            .backend
            .memories
            .borrow()
            .select_sorted_by(|m| m.trip_id == trip, |m| m.created_at);
        rows.reverse();
        Ok(rows
            .into_iter()
            .map(|row| self.backend.assemble_post(row))
            .collect())
    }

    async fn create_memory(
        &self,
        trip: TripId,
        draft: &MemoryDraft,
    ) -> Result<MemoryId, StoreError> {
        round_trip().await;
        self.backend.note_write();
        let user = self.require_user()?;
        let trip_row = self.backend.readable_trip(trip, Some(user))?;
        if !self.backend.is_participant(&trip_row, Some(user)) {
            return Err(StoreError::Rejected(
                "only trip members can post memories".into(),
            ));
        }

        let id = {
            let mut memories = self.backend.memories.borrow_mut();
            let id = memories.allocate_id();
            memories.insert(
                id,
                MemoryRow {
                    id,
                    trip_id: trip,
                    author: user.id.clone(),
                    author_name: user.label().to_string(),
                    avatar: None,
                    content: draft.content.clone(),
                    images: draft.images.clone(),
                    created_at: self.backend.now(),
                },
            )?;
            id
        };
        self.backend
            .hub
            .publish(Change::scoped(tables::MEMORIES, trip.0));
        Ok(MemoryId(id))
    }

    async fn delete_memory(&self, id: MemoryId) -> Result<(), StoreError> {
        round_trip().await;
        self.backend.note_write();
        let user = self.require_user()?;
        let row = self.backend.memory_by_id(id)?;
        if row.author != user.id {
            return Err(StoreError::Rejected(
                "only the author can delete a memory".into(),
            ));
        }

        self.backend.memories.borrow_mut().remove(id.0)?;
        self.backend.comments.borrow_mut().remove_where(|c| c.memory_id == id.0);
        self.backend.likes.borrow_mut().remove_where(|l| l.memory_id == id.0);
        self.backend
            .hub
            .publish(Change::scoped(tables::MEMORIES, row.trip_id.0));
        Ok(())
    }

    async fn add_comment(&self, memory: MemoryId, content: &str) -> Result<CommentId, StoreError> {
        round_trip().await;
        self.backend.note_write();
        let user = self.require_user()?;
        let row = self.backend.memory_by_id(memory)?;
        let trip = self.backend.readable_trip(row.trip_id, Some(user))?;
        if !self.backend.is_participant(&trip, Some(user)) {
            return Err(StoreError::Rejected("only trip members can comment".into()));
        }

        let id = {
            let mut comments = self.backend.comments.borrow_mut();
            let id = comments.allocate_id();
            comments.insert(
                id,
                CommentRow {
                    id,
                    memory_id: memory.0,
                    author: user.id.clone(),
                    author_name: user.label().to_string(),
                    content: content.to_string(),
                    created_at: self.backend.now(),
                },
            )?;
            id
        };
        self.backend
            .hub
            .publish(Change::scoped(tables::COMMENTS, row.trip_id.0));
        Ok(CommentId(id))
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError> {
        round_trip().await;
        self.backend.note_write();
        let user = self.require_user()?;
        let comment = self
            .backend
            .comments
            .borrow()
            .get(id.0)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let post = self.backend.memory_by_id(MemoryId(comment.memory_id))?;
        // The post's author moderates its comment thread.
        if post.author != user.id {
            return Err(StoreError::Rejected(
                "only the post's author can remove comments".into(),
            ));
        }

        self.backend.comments.borrow_mut().remove(id.0)?;
        self.backend
            .hub
            .publish(Change::scoped(tables::COMMENTS, post.trip_id.0));
        Ok(())
    }

    async fn set_liked(&self, memory: MemoryId, liked: bool) -> Result<(), StoreError> {
        round_trip().await;
        self.backend.note_write();
        let user = self.require_user()?;
        let row = self.backend.memory_by_id(memory)?;
        let trip = self.backend.readable_trip(row.trip_id, Some(user))?;
        if !self.backend.is_participant(&trip, Some(user)) {
            return Err(StoreError::Rejected("only trip members can like".into()));
        }

        let changed = {
            let mut likes = self.backend.likes.borrow_mut();
            let absent = likes
                .select(|l| l.memory_id == memory.0 && l.user == user.id)
                .is_empty();
            match (liked, absent) {
                (true, true) => {
                    let id = likes.allocate_id();
                    likes.insert(
                        id,
                        LikeRow {
                            memory_id: memory.0,
                            user: user.id.clone(),
                        },
                    )?;
                    true
                }
                (false, false) => {
                    likes.remove_where(|l| l.memory_id == memory.0 && l.user == user.id);
                    true
                }
                // Already in the requested state.
                _ => false,
            }
        };
        if changed {
            self.backend
                .hub
                .publish(Change::scoped(tables::LIKES, row.trip_id.0));
        }
        Ok(())
    }

    fn subscribe(&self, filter: ChangeFilter, callback: impl Fn() + 'static) -> ListenerKey {
        self.backend.hub.subscribe(filter, callback)
    }

    fn unsubscribe(&self, key: ListenerKey) {
        self.backend.hub.unsubscribe(key)
    }
}
