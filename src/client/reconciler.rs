//! State reconciliation
//!
//! The reconciler merges inbound envelopes into the view-bound local state:
//! the ordered top-level comment list, per-parent reply lists, the per-entity
//! reaction cache and the per-entity typing sets. The broadcast channel is
//! fire-and-forget and untrusted, so a malformed or unexpected envelope is
//! logged and dropped; it never tears the pipeline down.
//!
//! The one merge rule that matters: reaction counters and the subject's own
//! reaction state arrive through different paths (broadcast vs. REST) and
//! are merged field by field. An envelope that carries no own-state leaves
//! the cached own-state untouched.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::model::{Comment, OwnReaction, ReactionAction, ReactionCounters};
use crate::transport::message::ServerEvent;

/// Cached reaction totals plus the viewing subject's own reaction, when
/// known. `own: None` means unknown or no reaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionEntry {
    pub counters: ReactionCounters,
    pub own: Option<OwnReaction>,
}

pub struct Reconciler {
    subject: String,
    comments: Vec<Comment>,
    replies: HashMap<String, Vec<Comment>>,
    reactions: HashMap<String, ReactionEntry>,
    typing: HashMap<String, HashSet<String>>,
}

impl Reconciler {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            comments: Vec::new(),
            replies: HashMap::new(),
            reactions: HashMap::new(),
            typing: HashMap::new(),
        }
    }

    // -- seeding from the REST fetch path --

    pub fn seed_comments(&mut self, comments: Vec<Comment>) {
        self.comments = comments;
    }

    pub fn seed_replies(&mut self, parent_id: &str, replies: Vec<Comment>) {
        self.replies.insert(parent_id.to_string(), replies);
    }

    /// Update cached totals without touching own-state.
    pub fn seed_reaction(&mut self, entity_id: &str, counters: ReactionCounters) {
        self.reactions.entry(entity_id.to_string()).or_default().counters = counters;
    }

    /// Update own-state without touching totals.
    pub fn set_own_reaction(&mut self, entity_id: &str, own: Option<OwnReaction>) {
        self.reactions.entry(entity_id.to_string()).or_default().own = own;
    }

    // -- views --

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn replies_of(&self, parent_id: &str) -> &[Comment] {
        self.replies.get(parent_id).map_or(&[], Vec::as_slice)
    }

    pub fn reaction(&self, entity_id: &str) -> Option<&ReactionEntry> {
        self.reactions.get(entity_id)
    }

    /// Subjects currently composing under an entity, excluding the viewer:
    /// self never shows in one's own typing indicator.
    pub fn typing_for(&self, entity_id: &str) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .typing
            .get(entity_id)
            .map(|set| set.iter().filter(|s| **s != self.subject).cloned().collect())
            .unwrap_or_default();
        subjects.sort();
        subjects
    }

    // -- merging --

    /// Decode and apply one inbound frame. Decode failures are warned and
    /// dropped.
    pub fn apply_json(&mut self, text: &str) {
        match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => self.apply(event),
            Err(e) => warn!("dropping malformed event: {e}"),
        }
    }

    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::CommentCreated { comment } => match comment.parent_id.clone() {
                None => self.insert_comment(comment),
                Some(parent_id) => self.insert_reply(&parent_id, comment),
            },
            ServerEvent::ReplyCreated { reply, parent_id } => {
                self.insert_reply(&parent_id, reply);
            }
            ServerEvent::CommentUpdated { comment } => self.replace_comment(comment),
            ServerEvent::CommentDeleted { entity_id, .. } => self.remove_everywhere(&entity_id),
            ServerEvent::ReactionChanged {
                entity_id,
                subject_id,
                action,
                counters,
                own_reaction,
            } => self.merge_reaction(&entity_id, &subject_id, action, counters, own_reaction),
            ServerEvent::Typing {
                entity_id,
                subject_id,
                typing,
            } => {
                let set = self.typing.entry(entity_id).or_default();
                if typing {
                    set.insert(subject_id);
                } else {
                    set.remove(&subject_id);
                }
            }
            ServerEvent::Notification(_) => {
                // Notifications feed the notification tray, not this state;
                // the consumer taps them off the event channel separately.
            }
        }
    }

    /// Insert iff the id is not already held. Duplicate delivery of the same
    /// creation envelope must be idempotent.
    fn insert_comment(&mut self, comment: Comment) {
        if self.comments.iter().any(|c| c.id == comment.id) {
            return;
        }
        self.comments.push(comment);
    }

    fn insert_reply(&mut self, parent_id: &str, reply: Comment) {
        let list = self.replies.entry(parent_id.to_string()).or_default();
        if list.iter().any(|r| r.id == reply.id) {
            return;
        }
        list.push(reply);
    }

    /// Replace in place wherever held; never insert on update.
    fn replace_comment(&mut self, comment: Comment) {
        if let Some(held) = self.comments.iter_mut().find(|c| c.id == comment.id) {
            *held = comment;
            return;
        }
        for list in self.replies.values_mut() {
            if let Some(held) = list.iter_mut().find(|r| r.id == comment.id) {
                *held = comment;
                return;
            }
        }
    }

    /// Remove from every collection that might hold the id: the top-level
    /// list, each reply list, its own reply list, and the caches keyed by
    /// it.
    fn remove_everywhere(&mut self, entity_id: &str) {
        self.comments.retain(|c| c.id != entity_id);
        for list in self.replies.values_mut() {
            list.retain(|r| r.id != entity_id);
        }
        self.replies.remove(entity_id);
        self.reactions.remove(entity_id);
        self.typing.remove(entity_id);
    }

    fn merge_reaction(
        &mut self,
        entity_id: &str,
        subject_id: &str,
        action: ReactionAction,
        counters: ReactionCounters,
        own_reaction: Option<OwnReaction>,
    ) {
        let entry = self.reactions.entry(entity_id.to_string()).or_default();
        entry.counters = counters;

        // Own-state only moves when the envelope speaks for this subject:
        // either it carries the state explicitly, or it reports our own
        // removal. A counters-only broadcast from someone else's action
        // leaves it alone.
        if let Some(own) = own_reaction {
            entry.own = Some(own);
        } else if subject_id == self.subject && action == ReactionAction::Removed {
            entry.own = None;
        }

        // Keep embedded counters in sync where the entity is held.
        if let Some(held) = self.comments.iter_mut().find(|c| c.id == entity_id) {
            held.counters = counters;
        }
        for list in self.replies.values_mut() {
            if let Some(held) = list.iter_mut().find(|r| r.id == entity_id) {
                held.counters = counters;
            }
        }
    }
}
