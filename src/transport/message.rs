//! Wire protocol between client and server.
//!
//! Both directions are JSON with an internal `type` tag. Client messages are
//! fire-and-forget: there is no acknowledgement contract, and a malformed
//! message is ignored rather than answered.

use serde::{Deserialize, Serialize};

use crate::model::{Comment, Notification, OwnReaction, ReactionAction, ReactionCounters};

/// Messages a client may send after the handshake admitted it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join")]
    Join { entity_id: String },
    #[serde(rename = "leave")]
    Leave { entity_id: String },
    #[serde(rename = "typing_start")]
    TypingStart { entity_id: String },
    #[serde(rename = "typing_stop")]
    TypingStop { entity_id: String },
}

/// One published event envelope. Immutable after construction; every member
/// of the target topic receives its own copy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "comment_created")]
    CommentCreated { comment: Comment },
    #[serde(rename = "comment_updated")]
    CommentUpdated { comment: Comment },
    #[serde(rename = "comment_deleted")]
    CommentDeleted {
        entity_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
    },
    #[serde(rename = "reply_created")]
    ReplyCreated { reply: Comment, parent_id: String },
    #[serde(rename = "reaction_changed")]
    ReactionChanged {
        entity_id: String,
        subject_id: String,
        action: ReactionAction,
        counters: ReactionCounters,
        /// Only present when the envelope describes the receiving subject's
        /// own reaction. Absent on plain counter broadcasts, in which case
        /// the client keeps whatever own-state it already holds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        own_reaction: Option<OwnReaction>,
    },
    #[serde(rename = "typing")]
    Typing {
        entity_id: String,
        subject_id: String,
        typing: bool,
    },
    #[serde(rename = "notification")]
    Notification(Notification),
}

/// JWT claims accepted by the connection gate.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}
