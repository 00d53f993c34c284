//! Domain payloads carried inside event envelopes.
//!
//! These are the protocol-level shapes of comments, reaction counters and
//! notifications. Persistence of these entities belongs to the CRUD layer;
//! this crate only moves them around.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A comment or reply as published over the wire. `parent_id` is `None` for
/// top-level comments and set for replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_at_ms: i64,
    pub counters: ReactionCounters,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Aggregate like/dislike totals for one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounters {
    pub likes: u32,
    pub dislikes: u32,
}

/// The acting subject's own reaction on an entity, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnReaction {
    Liked,
    Disliked,
}

/// What kind of reaction mutation produced a `reaction_changed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Added,
    Removed,
    Switched,
}

/// Private notification delivered on a subject topic only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reply,
    Reaction,
}
