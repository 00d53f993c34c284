//! Topic management
//!
//! A `Topic` holds the set of connection ids joined to a particular topic
//! name. Membership is a `HashSet`, so duplicate joins are a no-op.
//!
//! Topic names are namespaced strings. The three constructors below are the
//! single source of truth for the naming scheme; nothing else in the crate
//! builds a topic name by hand. Entity topics are keyed by entity id
//! uniformly for comments and replies.
//!
//! Concurrency note: callers must synchronize access to `Topic` (for example
//! via the registry lock) when modifying membership.

use std::collections::HashSet;

use crate::registry::connection::ConnectionId;

/// Topic scoped to one comment or reply: its replies and reactions.
pub fn entity_topic(entity_id: &str) -> String {
    format!("entity:{entity_id}")
}

/// The single well-known topic receiving every new top-level comment.
pub fn broadcast_topic() -> String {
    "broadcast".to_string()
}

/// Private per-subject topic, used for notifications only that subject
/// should see. Joined automatically by the gate, never by request.
pub fn subject_topic(subject: &str) -> String {
    format!("subject:{subject}")
}

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub members: HashSet<ConnectionId>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: HashSet::new(),
        }
    }

    /// Add a member. Duplicate adds are ignored.
    pub fn add(&mut self, id: ConnectionId) {
        self.members.insert(id);
    }

    /// Remove a member. Returns true when the topic is now empty and should
    /// be dropped from the registry map.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        self.members.remove(id);
        self.members.is_empty()
    }
}
