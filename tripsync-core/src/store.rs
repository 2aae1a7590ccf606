//! The contract with the hosted database.
//!
//! Everything the app needs from the backend, as one async trait. The wire
//! format stays on the other side of it: the in-memory backend (tests and
//! local mode) and the Supabase backend (feature `supabase`) both live
//! behind the same calls.
//!
//! Futures returned here are not `Send`; the whole client is
//! single-threaded, and the only suspension points in the app are these
//! round-trips.

pub mod memory;

#[cfg(feature = "supabase")]
pub mod supabase;

use basecamp::{ChangeFilter, ListenerKey, StoreError};

use crate::memories::{MemoryDraft, MemoryPost};
use crate::records::{
    Activity, ActivityDraft, ActivityId, CommentId, Day, DayId, MemberId, MemberRole, MemoryId,
    Trip, TripDraft, TripId, TripMember, UserIdentity,
};

/// Table names, shared by backends and change subscriptions.
pub mod tables {
    pub const TRIPS: &str = "trips";
    pub const DAYS: &str = "days";
    pub const ACTIVITIES: &str = "activities";
    pub const TRIP_MEMBERS: &str = "trip_members";
    pub const MEMORIES: &str = "memories";
    pub const COMMENTS: &str = "comments";
    pub const LIKES: &str = "likes";
}

#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Who this session is signed in as, if anyone.
    async fn current_user(&self) -> Option<UserIdentity>;

    /// `NotFound` covers both a missing row and a row the caller may not
    /// see; the store does not tell an unauthorized caller which it was.
    async fn get_trip(&self, id: TripId) -> Result<Trip, StoreError>;

    /// Trips the user owns or was invited to, newest first.
    async fn list_trips_for(&self, user: &UserIdentity) -> Result<Vec<Trip>, StoreError>;

    async fn create_trip(&self, draft: &TripDraft) -> Result<Trip, StoreError>;

    /// Deletes the trip and everything under it (days, activities, members,
    /// memories with their comments and likes).
    async fn delete_trip(&self, id: TripId) -> Result<(), StoreError>;

    /// Days of a trip, `day_index` ascending.
    async fn list_days(&self, trip: TripId) -> Result<Vec<Day>, StoreError>;

    /// Insert-or-fetch on (trip, day_index): when the row already exists
    /// (say a collaborator bootstrapped the same trip a moment earlier),
    /// the existing row comes back instead of a duplicate.
    async fn create_day(&self, trip: TripId, day_index: i64, title: &str)
    -> Result<Day, StoreError>;

    /// Activities of a day, `sort_order` ascending. Ties sort however the
    /// backend's ascending sort breaks them.
    async fn list_activities(&self, day: DayId) -> Result<Vec<Activity>, StoreError>;

    async fn create_activity(
        &self,
        day: DayId,
        draft: &ActivityDraft,
        sort_order: i64,
    ) -> Result<Activity, StoreError>;

    async fn update_activity(&self, id: ActivityId, draft: &ActivityDraft)
    -> Result<(), StoreError>;

    async fn set_sort_order(&self, id: ActivityId, sort_order: i64) -> Result<(), StoreError>;

    /// Persist a new total order for a day's activities.
    ///
    /// The default is the fallback for backends without multi-row
    /// transactions: one write per row, reported as a `PartialWrite` when
    /// only some land. Backends that can do better override it with an
    /// all-or-nothing write.
    async fn update_sort_orders(
        &self,
        day: DayId,
        orders: &[(ActivityId, i64)],
    ) -> Result<(), StoreError> {
        let _ = day;
        let mut failed = Vec::new();
        for (id, sort_order) in orders {
            if let Err(e) = self.set_sort_order(*id, *sort_order).await {
                log::warn!("sort_order write for activity {} failed: {e}", id.0);
                failed.push(id.0);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(StoreError::PartialWrite { failed })
        }
    }

    async fn delete_activity(&self, id: ActivityId) -> Result<(), StoreError>;

    async fn list_members(&self, trip: TripId) -> Result<Vec<TripMember>, StoreError>;

    async fn invite_member(
        &self,
        trip: TripId,
        email: &str,
        role: MemberRole,
    ) -> Result<TripMember, StoreError>;

    async fn remove_member(&self, id: MemberId) -> Result<(), StoreError>;

    /// The trip's memory feed, newest first, with comments and likes
    /// attached.
    async fn list_memories(&self, trip: TripId) -> Result<Vec<MemoryPost>, StoreError>;

    /// Posts as the current user; rejected when signed out.
    async fn create_memory(&self, trip: TripId, draft: &MemoryDraft)
    -> Result<MemoryId, StoreError>;

    async fn delete_memory(&self, id: MemoryId) -> Result<(), StoreError>;

    async fn add_comment(&self, memory: MemoryId, content: &str) -> Result<CommentId, StoreError>;

    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError>;

    /// Make the current user's like on the post present or absent.
    /// Idempotent either way.
    async fn set_liked(&self, memory: MemoryId, liked: bool) -> Result<(), StoreError>;

    /// Payload-free change notifications: the callback fires when anything
    /// matching the filter changes, locally or in another session, and the
    /// caller reacts by reloading.
    fn subscribe(&self, filter: ChangeFilter, callback: impl Fn() + 'static) -> ListenerKey;

    fn unsubscribe(&self, key: ListenerKey);
}
