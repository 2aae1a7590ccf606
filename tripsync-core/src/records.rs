//! The rows this app keeps in the hosted store, as closed Rust shapes.
//!
//! The original tables grew out of ad-hoc form payloads; here every entity
//! is an explicit struct, optional columns are `Option`, and drafts are
//! validated before they touch any state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Spending cap assumed when a trip has no explicit budget.
pub const DEFAULT_BUDGET_LIMIT: f64 = 50_000.0;

macro_rules! row_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Store-assigned ids are positive; negative ids are local
            /// placeholders that never escape to the store.
            pub fn is_placeholder(&self) -> bool {
                self.0 < 0
            }
        }
    };
}

row_id!(TripId);
row_id!(DayId);
row_id!(ActivityId);
row_id!(MemberId);
row_id!(MemoryId);
row_id!(CommentId);

/// Identity assigned by the hosted auth service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
}

impl UserIdentity {
    /// Short label for avatars and bylines.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub start_date: Option<NaiveDate>,
    pub cover_image: Option<String>,
    pub budget_limit: Option<f64>,
    pub owner: UserId,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub id: DayId,
    pub trip_id: TripId,
    /// Zero-based position within the trip; unique per trip and the only
    /// thing day navigation orders by.
    pub day_index: i64,
    pub title: String,
    pub date: Option<NaiveDate>,
}

/// What kind of itinerary entry an activity is.
///
/// The wire names are the column values the store has always used
/// ("rest" and "spot" predate the richer names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Flight,
    Transport,
    #[serde(rename = "rest")]
    Lodging,
    Food,
    #[serde(rename = "spot")]
    Sightseeing,
    Other,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 6] = [
        ActivityKind::Flight,
        ActivityKind::Transport,
        ActivityKind::Lodging,
        ActivityKind::Food,
        ActivityKind::Sightseeing,
        ActivityKind::Other,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub day_id: DayId,
    pub kind: ActivityKind,
    pub title: String,
    pub location: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Free-text time of day, e.g. "10:00".
    pub time: String,
    /// Position along the day's timeline. The client keeps these dense; the
    /// store only promises an ascending sort over whatever is there.
    pub sort_order: i64,
    pub cost: f64,
    pub memo: Option<String>,
    pub images: Vec<String>,
    /// Not confirmed yet; left out of the route path on the map.
    pub tentative: bool,
    pub link: Option<String>,
}

impl Activity {
    pub fn from_draft(id: ActivityId, day_id: DayId, sort_order: i64, draft: &ActivityDraft) -> Self {
        Activity {
            id,
            day_id,
            kind: draft.kind,
            title: draft.title.clone(),
            location: draft.location.clone(),
            lat: draft.lat,
            lng: draft.lng,
            time: draft.time.clone(),
            sort_order,
            cost: draft.cost.unwrap_or(0.0),
            memo: draft.memo.clone(),
            images: draft.images.clone(),
            tentative: draft.tentative,
            link: draft.link.clone(),
        }
    }

    /// Overwrite the editable fields, keeping identity and position.
    pub fn apply_draft(&mut self, draft: &ActivityDraft) {
        self.kind = draft.kind;
        self.title = draft.title.clone();
        self.location = draft.location.clone();
        self.lat = draft.lat;
        self.lng = draft.lng;
        self.time = draft.time.clone();
        self.cost = draft.cost.unwrap_or(0.0);
        self.memo = draft.memo.clone();
        self.images = draft.images.clone();
        self.tentative = draft.tentative;
        self.link = draft.link.clone();
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Form payload for creating or fully editing an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub kind: ActivityKind,
    pub title: String,
    pub location: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub time: String,
    pub cost: Option<f64>,
    pub memo: Option<String>,
    pub images: Vec<String>,
    pub tentative: bool,
    pub link: Option<String>,
}

impl Default for ActivityDraft {
    fn default() -> Self {
        ActivityDraft {
            kind: ActivityKind::Sightseeing,
            title: String::new(),
            location: String::new(),
            lat: None,
            lng: None,
            time: "10:00".to_string(),
            cost: None,
            memo: None,
            images: Vec::new(),
            tentative: false,
            link: None,
        }
    }
}

impl ActivityDraft {
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.title.trim().is_empty() {
            return Err(PlanError::Validation("An activity needs a title".into()));
        }
        if let Some(cost) = self.cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(PlanError::Validation(
                    "Cost must be a non-negative amount".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripDraft {
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub cover_image: Option<String>,
    pub budget_limit: Option<f64>,
    pub is_public: bool,
}

impl TripDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        TripDraft {
            title: title.into(),
            start_date: None,
            cover_image: None,
            budget_limit: None,
            is_public: false,
        }
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.title.trim().is_empty() {
            return Err(PlanError::Validation("A trip needs a title".into()));
        }
        if let Some(limit) = self.budget_limit {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(PlanError::Validation(
                    "Budget must be a positive amount".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Editor,
    Viewer,
}

/// An invited collaborator. The owner is not a member row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripMember {
    pub id: MemberId,
    pub trip_id: TripId,
    pub email: String,
    pub role: MemberRole,
}

/// What the current session may do with the open trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    Member(MemberRole),
    ReadOnly,
}

impl Access {
    /// Owner or invited member, allowed to navigate and collaborate.
    pub fn is_participant(&self) -> bool {
        !matches!(self, Access::ReadOnly)
    }

    /// Allowed to change the itinerary.
    pub fn can_edit(&self) -> bool {
        matches!(self, Access::Owner | Access::Member(MemberRole::Editor))
    }
}

/// Loose plausibility check for invite addresses; the mail service is the
/// real authority.
pub fn looks_like_email(s: &str) -> bool {
    let s = s.trim();
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_draft_requires_title() {
        let draft = ActivityDraft::default();
        assert!(matches!(draft.validate(), Err(PlanError::Validation(_))));

        let whitespace = ActivityDraft {
            title: "   ".into(),
            ..ActivityDraft::default()
        };
        assert!(whitespace.validate().is_err());

        let ok = ActivityDraft {
            title: "Lunch".into(),
            ..ActivityDraft::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn activity_draft_rejects_bad_costs() {
        let negative = ActivityDraft {
            title: "Lunch".into(),
            cost: Some(-5.0),
            ..ActivityDraft::default()
        };
        assert!(negative.validate().is_err());

        let nan = ActivityDraft {
            title: "Lunch".into(),
            cost: Some(f64::NAN),
            ..ActivityDraft::default()
        };
        assert!(nan.validate().is_err());

        let free = ActivityDraft {
            title: "Lunch".into(),
            cost: None,
            ..ActivityDraft::default()
        };
        assert!(free.validate().is_ok());
    }

    #[test]
    fn missing_cost_becomes_zero() {
        let draft = ActivityDraft {
            title: "Walk".into(),
            ..ActivityDraft::default()
        };
        let act = Activity::from_draft(ActivityId(1), DayId(1), 0, &draft);
        assert_eq!(act.cost, 0.0);
    }

    #[test]
    fn placeholder_ids_are_negative() {
        assert!(ActivityId(-1).is_placeholder());
        assert!(!ActivityId(1).is_placeholder());
    }

    #[test]
    fn kind_uses_legacy_column_values() {
        let json = serde_json::to_string(&ActivityKind::Lodging).unwrap();
        assert_eq!(json, "\"rest\"");
        let json = serde_json::to_string(&ActivityKind::Sightseeing).unwrap();
        assert_eq!(json, "\"spot\"");
        let back: ActivityKind = serde_json::from_str("\"flight\"").unwrap();
        assert_eq!(back, ActivityKind::Flight);
    }

    #[test]
    fn access_rights() {
        assert!(Access::Owner.can_edit());
        assert!(Access::Member(MemberRole::Editor).can_edit());
        assert!(!Access::Member(MemberRole::Viewer).can_edit());
        assert!(Access::Member(MemberRole::Viewer).is_participant());
        assert!(!Access::ReadOnly.is_participant());
        assert!(!Access::ReadOnly.can_edit());
    }

    #[test]
    fn email_plausibility() {
        assert!(looks_like_email("ana@example.com"));
        assert!(!looks_like_email("ana"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ana@nodot"));
    }
}
