//! The hosted backend: [`RemoteStore`] over a Supabase project's REST
//! endpoint.
//!
//! Auth stays with the host shell: it signs the user in, hands this store
//! the access token and the resolved identity, and owns the realtime
//! websocket. Notifications from that channel are forwarded in through
//! [`SupabaseStore::external_change`]; payloads are dropped on the floor
//! because subscribers only ever reload.
//!
//! Reorder batches deliberately use the trait's per-row fallback: PostgREST
//! has no multi-row transaction to offer, so partial failures are possible
//! here and reported as such.

use basecamp::supabase::{SupabaseClient, SupabaseConfig};
use basecamp::{Change, ChangeFilter, ChangeHub, ListenerKey, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::memories::{Comment, MemoryDraft, MemoryPost};
use crate::records::{
    Activity, ActivityDraft, ActivityId, ActivityKind, CommentId, Day, DayId, MemberId,
    MemberRole, MemoryId, Trip, TripDraft, TripId, TripMember, UserId, UserIdentity,
};
use crate::store::{RemoteStore, tables};

pub struct SupabaseStore {
    client: SupabaseClient,
    identity: Option<UserIdentity>,
    hub: ChangeHub,
}

impl SupabaseStore {
    pub fn new(
        config: SupabaseConfig,
        access_token: Option<String>,
        identity: Option<UserIdentity>,
    ) -> Self {
        SupabaseStore {
            client: SupabaseClient::new(config, access_token),
            identity,
            hub: ChangeHub::new(),
        }
    }

    /// Entry point for the host's realtime bridge: whenever its websocket
    /// channel reports an insert/update/delete, it calls this with the
    /// table (and parent row) the event belongs to.
    pub fn external_change(&self, change: Change) {
        self.hub.publish(change);
    }

    fn uid(&self) -> Result<&str, StoreError> {
        self.identity
            .as_ref()
            .map(|u| u.id.0.as_str())
            .ok_or_else(|| StoreError::Rejected("not signed in".into()))
    }
}

// --- row shapes (the wire side of the records) ---

#[derive(Debug, Deserialize)]
struct TripRow {
    id: i64,
    title: String,
    created_at: DateTime<Utc>,
    start_date: Option<NaiveDate>,
    cover_image: Option<String>,
    budget_limit: Option<f64>,
    user_id: String,
    is_public: Option<bool>,
}

impl From<TripRow> for Trip {
    fn from(row: TripRow) -> Trip {
        Trip {
            id: TripId(row.id),
            title: row.title,
            created_at: row.created_at,
            start_date: row.start_date,
            cover_image: row.cover_image,
            budget_limit: row.budget_limit,
            owner: UserId(row.user_id),
            is_public: row.is_public.unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
struct NewTripRow<'a> {
    title: &'a str,
    start_date: Option<NaiveDate>,
    cover_image: Option<&'a str>,
    budget_limit: Option<f64>,
    user_id: &'a str,
    is_public: bool,
}

#[derive(Debug, Deserialize)]
struct DayRow {
    id: i64,
    trip_id: i64,
    day_index: i64,
    title: String,
    date: Option<NaiveDate>,
}

impl From<DayRow> for Day {
    fn from(row: DayRow) -> Day {
        Day {
            id: DayId(row.id),
            trip_id: TripId(row.trip_id),
            day_index: row.day_index,
            title: row.title,
            date: row.date,
        }
    }
}

#[derive(Debug, Serialize)]
struct NewDayRow<'a> {
    trip_id: i64,
    day_index: i64,
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct ActivityRow {
    id: i64,
    day_id: i64,
    #[serde(rename = "type")]
    kind: ActivityKind,
    title: String,
    location: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    time: Option<String>,
    sort_order: i64,
    cost: Option<f64>,
    memo: Option<String>,
    images: Option<Vec<String>>,
    is_tentative: Option<bool>,
    link: Option<String>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Activity {
        Activity {
            id: ActivityId(row.id),
            day_id: DayId(row.day_id),
            kind: row.kind,
            title: row.title,
            location: row.location.unwrap_or_default(),
            lat: row.lat,
            lng: row.lng,
            time: row.time.unwrap_or_default(),
            sort_order: row.sort_order,
            cost: row.cost.unwrap_or(0.0),
            memo: row.memo,
            images: row.images.unwrap_or_default(),
            tentative: row.is_tentative.unwrap_or(false),
            link: row.link,
        }
    }
}

#[derive(Debug, Serialize)]
struct ActivityFields<'a> {
    #[serde(rename = "type")]
    kind: ActivityKind,
    title: &'a str,
    location: &'a str,
    lat: Option<f64>,
    lng: Option<f64>,
    time: &'a str,
    cost: f64,
    memo: Option<&'a str>,
    images: &'a [String],
    is_tentative: bool,
    link: Option<&'a str>,
}

impl<'a> ActivityFields<'a> {
    fn from_draft(draft: &'a ActivityDraft) -> Self {
        ActivityFields {
            kind: draft.kind,
            title: &draft.title,
            location: &draft.location,
            lat: draft.lat,
            lng: draft.lng,
            time: &draft.time,
            cost: draft.cost.unwrap_or(0.0),
            memo: draft.memo.as_deref(),
            images: &draft.images,
            is_tentative: draft.tentative,
            link: draft.link.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct NewActivityRow<'a> {
    day_id: i64,
    sort_order: i64,
    #[serde(flatten)]
    fields: ActivityFields<'a>,
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    id: i64,
    trip_id: i64,
    email: String,
    role: MemberRole,
}

impl From<MemberRow> for TripMember {
    fn from(row: MemberRow) -> TripMember {
        TripMember {
            id: MemberId(row.id),
            trip_id: TripId(row.trip_id),
            email: row.email,
            role: row.role,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    full_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireComment {
    id: i64,
    content: String,
    created_at: DateTime<Utc>,
    user_id: String,
    profiles: Option<ProfileRow>,
}

#[derive(Debug, Deserialize)]
struct WireLike {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct WireMemory {
    id: i64,
    trip_id: i64,
    user_id: String,
    content: Option<String>,
    images: Option<Vec<String>>,
    created_at: DateTime<Utc>,
    profiles: Option<ProfileRow>,
    comments: Option<Vec<WireComment>>,
    likes: Option<Vec<WireLike>>,
}

fn display_name(profile: &Option<ProfileRow>, user_id: &str) -> String {
    profile
        .as_ref()
        .and_then(|p| p.full_name.clone())
        .unwrap_or_else(|| user_id.to_string())
}

impl From<WireMemory> for MemoryPost {
    fn from(row: WireMemory) -> MemoryPost {
        let mut comments: Vec<Comment> = row
            .comments
            .unwrap_or_default()
            .into_iter()
            .map(|c| Comment {
                id: CommentId(c.id),
                author_name: display_name(&c.profiles, &c.user_id),
                author: UserId(c.user_id),
                content: c.content,
                created_at: c.created_at,
            })
            .collect();
        comments.sort_by_key(|c| c.created_at);

        MemoryPost {
            id: MemoryId(row.id),
            trip_id: TripId(row.trip_id),
            author_name: display_name(&row.profiles, &row.user_id),
            avatar: row.profiles.and_then(|p| p.avatar_url),
            author: UserId(row.user_id),
            content: row.content.unwrap_or_default(),
            images: row.images.unwrap_or_default(),
            created_at: row.created_at,
            comments,
            likes: row
                .likes
                .unwrap_or_default()
                .into_iter()
                .map(|l| UserId(l.user_id))
                .collect(),
        }
    }
}

/// Representation inserts only need the id back.
#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

/// Everything a memory card renders, in one embedded select; the comments
/// and likes ride along instead of costing a query each.
const MEMORY_SELECT: &str = "select=*,profiles(full_name,avatar_url),\
comments(id,content,created_at,user_id,profiles(full_name,avatar_url)),likes(user_id)";

fn first<T>(rows: Vec<T>, what: &str) -> Result<T, StoreError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::Rejected(format!("insert into {what} returned no row")))
}

impl RemoteStore for SupabaseStore {
    async fn current_user(&self) -> Option<UserIdentity> {
        self.identity.clone()
    }

    async fn get_trip(&self, id: TripId) -> Result<Trip, StoreError> {
        let row: TripRow = self
            .client
            .select_single(tables::TRIPS, &format!("id=eq.{}", id.0))
            .await?;
        Ok(row.into())
    }

    async fn list_trips_for(&self, user: &UserIdentity) -> Result<Vec<Trip>, StoreError> {
        let owned: Vec<TripRow> = self
            .client
            .select(
                tables::TRIPS,
                &format!("user_id=eq.{}&order=created_at.desc", user.id.0),
            )
            .await?;

        #[derive(Deserialize)]
        struct MemberTripId {
            trip_id: i64,
        }
        let memberships: Vec<MemberTripId> = self
            .client
            .select(
                tables::TRIP_MEMBERS,
                &format!("email=eq.{}&select=trip_id", user.email),
            )
            .await?;

        let mut trips: Vec<Trip> = owned.into_iter().map(Trip::from).collect();
        if !memberships.is_empty() {
            let ids = memberships
                .iter()
                .map(|m| m.trip_id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let shared: Vec<TripRow> = self
                .client
                .select(tables::TRIPS, &format!("id=in.({ids})"))
                .await?;
            for row in shared {
                let trip = Trip::from(row);
                if !trips.iter().any(|t| t.id == trip.id) {
                    trips.push(trip);
                }
            }
            trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(trips)
    }

    async fn create_trip(&self, draft: &TripDraft) -> Result<Trip, StoreError> {
        let rows: Vec<TripRow> = self
            .client
            .insert(
                tables::TRIPS,
                &NewTripRow {
                    title: &draft.title,
                    start_date: draft.start_date,
                    cover_image: draft.cover_image.as_deref(),
                    budget_limit: draft.budget_limit,
                    user_id: self.uid()?,
                    is_public: draft.is_public,
                },
            )
            .await?;
        let trip = Trip::from(first(rows, tables::TRIPS)?);
        self.hub.publish(Change::scoped(tables::TRIPS, trip.id.0));
        Ok(trip)
    }

    async fn delete_trip(&self, id: TripId) -> Result<(), StoreError> {
        // Days, activities, members and memories go with it via the
        // schema's ON DELETE CASCADE foreign keys.
        self.client
            .delete(tables::TRIPS, &format!("id=eq.{}", id.0))
            .await?;
        self.hub.publish(Change::scoped(tables::TRIPS, id.0));
        Ok(())
    }

    async fn list_days(&self, trip: TripId) -> Result<Vec<Day>, StoreError> {
        let rows: Vec<DayRow> = self
            .client
            .select(
                tables::DAYS,
                &format!("trip_id=eq.{}&order=day_index.asc", trip.0),
            )
            .await?;
        Ok(rows.into_iter().map(Day::from).collect())
    }

    async fn create_day(
        &self,
        trip: TripId,
        day_index: i64,
        title: &str,
    ) -> Result<Day, StoreError> {
        // Insert-or-fetch on the (trip_id, day_index) uniqueness: when a
        // collaborator bootstrapped first, the upsert is ignored and the
        // surviving row is fetched instead.
        let rows: Vec<DayRow> = self
            .client
            .insert_or_ignore(
                tables::DAYS,
                "trip_id,day_index",
                &NewDayRow {
                    trip_id: trip.0,
                    day_index,
                    title,
                },
            )
            .await?;
        let day = match rows.into_iter().next() {
            Some(row) => Day::from(row),
            None => {
                log::debug!("day {day_index} of trip {} already existed; fetching", trip.0);
                let row: DayRow = self
                    .client
                    .select_single(
                        tables::DAYS,
                        &format!("trip_id=eq.{}&day_index=eq.{day_index}", trip.0),
                    )
                    .await?;
                Day::from(row)
            }
        };
        self.hub.publish(Change::scoped(tables::DAYS, trip.0));
        Ok(day)
    }

    async fn list_activities(&self, day: DayId) -> Result<Vec<Activity>, StoreError> {
        let rows: Vec<ActivityRow> = self
            .client
            .select(
                tables::ACTIVITIES,
                &format!("day_id=eq.{}&order=sort_order.asc", day.0),
            )
            .await?;
        Ok(rows.into_iter().map(Activity::from).collect())
    }

    async fn create_activity(
        &self,
        day: DayId,
        draft: &ActivityDraft,
        sort_order: i64,
    ) -> Result<Activity, StoreError> {
        let rows: Vec<ActivityRow> = self
            .client
            .insert(
                tables::ACTIVITIES,
                &NewActivityRow {
                    day_id: day.0,
                    sort_order,
                    fields: ActivityFields::from_draft(draft),
                },
            )
            .await?;
        let activity = Activity::from(first(rows, tables::ACTIVITIES)?);
        self.hub.publish(Change::scoped(tables::ACTIVITIES, day.0));
        Ok(activity)
    }

    async fn update_activity(
        &self,
        id: ActivityId,
        draft: &ActivityDraft,
    ) -> Result<(), StoreError> {
        self.client
            .update(
                tables::ACTIVITIES,
                &format!("id=eq.{}", id.0),
                &ActivityFields::from_draft(draft),
            )
            .await?;
        self.hub.publish(Change::table(tables::ACTIVITIES));
        Ok(())
    }

    async fn set_sort_order(&self, id: ActivityId, sort_order: i64) -> Result<(), StoreError> {
        #[derive(Serialize)]
        struct SortPatch {
            sort_order: i64,
        }
        self.client
            .update(
                tables::ACTIVITIES,
                &format!("id=eq.{}", id.0),
                &SortPatch { sort_order },
            )
            .await?;
        self.hub.publish(Change::table(tables::ACTIVITIES));
        Ok(())
    }

    async fn delete_activity(&self, id: ActivityId) -> Result<(), StoreError> {
        self.client
            .delete(tables::ACTIVITIES, &format!("id=eq.{}", id.0))
            .await?;
        self.hub.publish(Change::table(tables::ACTIVITIES));
        Ok(())
    }

    async fn list_members(&self, trip: TripId) -> Result<Vec<TripMember>, StoreError> {
        let rows: Vec<MemberRow> = self
            .client
            .select(tables::TRIP_MEMBERS, &format!("trip_id=eq.{}", trip.0))
            .await?;
        Ok(rows.into_iter().map(TripMember::from).collect())
    }

    async fn invite_member(
        &self,
        trip: TripId,
        email: &str,
        role: MemberRole,
    ) -> Result<TripMember, StoreError> {
        #[derive(Serialize)]
        struct NewMemberRow<'a> {
            trip_id: i64,
            email: &'a str,
            role: MemberRole,
        }
        let rows: Vec<MemberRow> = self
            .client
            .insert(
                tables::TRIP_MEMBERS,
                &NewMemberRow {
                    trip_id: trip.0,
                    email,
                    role,
                },
            )
            .await?;
        let member = TripMember::from(first(rows, tables::TRIP_MEMBERS)?);
        self.hub.publish(Change::scoped(tables::TRIP_MEMBERS, trip.0));
        Ok(member)
    }

    async fn remove_member(&self, id: MemberId) -> Result<(), StoreError> {
        self.client
            .delete(tables::TRIP_MEMBERS, &format!("id=eq.{}", id.0))
            .await?;
        self.hub.publish(Change::table(tables::TRIP_MEMBERS));
        Ok(())
    }

    async fn list_memories(&self, trip: TripId) -> Result<Vec<MemoryPost>, StoreError> {
        let rows: Vec<WireMemory> = self
            .client
            .select(
                tables::MEMORIES,
                &format!("trip_id=eq.{}&order=created_at.desc&{MEMORY_SELECT}", trip.0),
            )
            .await?;
        Ok(rows.into_iter().map(MemoryPost::from).collect())
    }

    async fn create_memory(
        &self,
        trip: TripId,
        draft: &MemoryDraft,
    ) -> Result<MemoryId, StoreError> {
        #[derive(Serialize)]
        struct NewMemoryRow<'a> {
            trip_id: i64,
            user_id: &'a str,
            content: &'a str,
            images: &'a [String],
        }
        let rows: Vec<IdRow> = self
            .client
            .insert(
                tables::MEMORIES,
                &NewMemoryRow {
                    trip_id: trip.0,
                    user_id: self.uid()?,
                    content: &draft.content,
                    images: &draft.images,
                },
            )
            .await?;
        let id = MemoryId(first(rows, tables::MEMORIES)?.id);
        self.hub.publish(Change::scoped(tables::MEMORIES, trip.0));
        Ok(id)
    }

    async fn delete_memory(&self, id: MemoryId) -> Result<(), StoreError> {
        self.client
            .delete(tables::MEMORIES, &format!("id=eq.{}", id.0))
            .await?;
        self.hub.publish(Change::table(tables::MEMORIES));
        Ok(())
    }

    async fn add_comment(&self, memory: MemoryId, content: &str) -> Result<CommentId, StoreError> {
        #[derive(Serialize)]
        struct NewCommentRow<'a> {
            memory_id: i64,
            user_id: &'a str,
            content: &'a str,
        }
        let rows: Vec<IdRow> = self
            .client
            .insert(
                tables::COMMENTS,
                &NewCommentRow {
                    memory_id: memory.0,
                    user_id: self.uid()?,
                    content,
                },
            )
            .await?;
        let id = CommentId(first(rows, tables::COMMENTS)?.id);
        self.hub.publish(Change::table(tables::COMMENTS));
        Ok(id)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError> {
        self.client
            .delete(tables::COMMENTS, &format!("id=eq.{}", id.0))
            .await?;
        self.hub.publish(Change::table(tables::COMMENTS));
        Ok(())
    }

    async fn set_liked(&self, memory: MemoryId, liked: bool) -> Result<(), StoreError> {
        let uid = self.uid()?;
        if liked {
            #[derive(Serialize)]
            struct NewLikeRow<'a> {
                memory_id: i64,
                user_id: &'a str,
            }
            let _: Vec<serde_json::Value> = self
                .client
                .insert_or_ignore(
                    tables::LIKES,
                    "memory_id,user_id",
                    &NewLikeRow {
                        memory_id: memory.0,
                        user_id: uid,
                    },
                )
                .await?;
        } else {
            self.client
                .delete(
                    tables::LIKES,
                    &format!("memory_id=eq.{}&user_id=eq.{uid}", memory.0),
                )
                .await?;
        }
        self.hub.publish(Change::table(tables::LIKES));
        Ok(())
    }

    fn subscribe(&self, filter: ChangeFilter, callback: impl Fn() + 'static) -> ListenerKey {
        self.hub.subscribe(filter, callback)
    }

    fn unsubscribe(&self, key: ListenerKey) {
        self.hub.unsubscribe(key)
    }
}
