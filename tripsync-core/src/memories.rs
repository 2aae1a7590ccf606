//! The shared photo-and-notes feed for a trip.
//!
//! Plain CRUD with none of the itinerary's optimistic machinery: mutations
//! go to the store first and the feed reloads afterwards, locally or via a
//! change notification from a collaborator's session.

use chrono::{DateTime, Utc};
use im::Vector;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::records::{CommentId, MemoryId, TripId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: UserId,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPost {
    pub id: MemoryId,
    pub trip_id: TripId,
    pub author: UserId,
    pub author_name: String,
    pub avatar: Option<String>,
    pub content: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Oldest first.
    pub comments: Vec<Comment>,
    /// Who has liked this post; one entry per user.
    pub likes: Vec<UserId>,
}

impl MemoryPost {
    pub fn liked_by(&self, user: &UserId) -> bool {
        self.likes.iter().any(|u| u == user)
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDraft {
    pub content: String,
    pub images: Vec<String>,
}

impl MemoryDraft {
    pub fn text(content: impl Into<String>) -> Self {
        MemoryDraft {
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// A post needs something to show: text, a photo, or both.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.content.trim().is_empty() && self.images.is_empty() {
            return Err(PlanError::Validation(
                "Write something or add a photo first".into(),
            ));
        }
        Ok(())
    }
}

/// The loaded feed for the open trip, newest post first.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
    posts: Vector<MemoryPost>,
    loaded: bool,
}

impl MemoryFeed {
    pub fn new() -> Self {
        MemoryFeed::default()
    }

    pub fn posts(&self) -> &Vector<MemoryPost> {
        &self.posts
    }

    /// False until the first load finishes; the view shows a spinner.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn post(&self, id: MemoryId) -> Option<&MemoryPost> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn replace(&mut self, posts: Vec<MemoryPost>) {
        self.posts = posts.into_iter().collect();
        self.loaded = true;
    }

    pub fn reset(&mut self) {
        self.posts = Vector::new();
        self.loaded = false;
    }
}
