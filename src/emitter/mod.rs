//! Event emitter
//!
//! Facade the CRUD layer calls after a mutation commits. Each method builds
//! the typed envelope, picks the target topic (parent entity topic for
//! replies, the broadcast topic for top-level comments), publishes it, and
//! notifies the entity owner's subject topic when the actor is someone else.
//!
//! The emitter is stateless: it holds nothing between calls beyond the
//! registry handle, and every call receives the mutated entity, the acting
//! subject, and optionally the owner as arguments. Construct it once at
//! startup next to the registry and pass references to the handlers that
//! need it.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::debug;

use crate::model::{Comment, Notification, NotificationKind, OwnReaction, ReactionAction, ReactionCounters};
use crate::registry::engine::Registry;
use crate::registry::{ConnectionId, topic};
use crate::transport::message::ServerEvent;

#[derive(Clone)]
pub struct EventEmitter {
    registry: Arc<Mutex<Registry>>,
}

impl EventEmitter {
    pub fn new(registry: Arc<Mutex<Registry>>) -> Self {
        Self { registry }
    }

    /// A new top-level comment. Fans out on the broadcast topic.
    pub fn comment_created(&self, comment: &Comment) {
        self.publish(
            &topic::broadcast_topic(),
            &ServerEvent::CommentCreated {
                comment: comment.clone(),
            },
        );
    }

    /// A new reply. Fans out on the parent's entity topic and, unless the
    /// author replied to themselves, notifies the parent's owner privately.
    pub fn reply_created(&self, reply: &Comment, parent_id: &str, parent_owner: &str) {
        self.publish(
            &topic::entity_topic(parent_id),
            &ServerEvent::ReplyCreated {
                reply: reply.clone(),
                parent_id: parent_id.to_string(),
            },
        );
        self.notify(
            parent_owner,
            &reply.author_id,
            Notification {
                kind: NotificationKind::Reply,
                message: format!("{} replied to your comment", reply.author_name),
                data: json!({ "comment_id": parent_id, "reply_id": reply.id }),
            },
        );
    }

    /// An edited comment or reply. Same topic selection as creation.
    pub fn comment_updated(&self, comment: &Comment) {
        let topic_name = match &comment.parent_id {
            Some(parent) => topic::entity_topic(parent),
            None => topic::broadcast_topic(),
        };
        self.publish(
            &topic_name,
            &ServerEvent::CommentUpdated {
                comment: comment.clone(),
            },
        );
    }

    /// A deleted comment or reply. Same topic selection as creation.
    pub fn comment_deleted(&self, entity_id: &str, parent_id: Option<&str>) {
        let topic_name = match parent_id {
            Some(parent) => topic::entity_topic(parent),
            None => topic::broadcast_topic(),
        };
        self.publish(
            &topic_name,
            &ServerEvent::CommentDeleted {
                entity_id: entity_id.to_string(),
                parent_id: parent_id.map(str::to_string),
            },
        );
    }

    /// A reaction mutation. Counters fan out on both the entity topic and
    /// the broadcast topic (list views watch the latter); the entity owner
    /// gets a private notification unless they reacted to their own entity.
    /// Own-reaction state is never broadcast: subjects learn their own state
    /// from the REST response, not from this envelope.
    pub fn reaction_changed(
        &self,
        entity_id: &str,
        actor: &str,
        action: ReactionAction,
        counters: ReactionCounters,
        owner: &str,
    ) {
        let event = ServerEvent::ReactionChanged {
            entity_id: entity_id.to_string(),
            subject_id: actor.to_string(),
            action,
            counters,
            own_reaction: None,
        };
        self.publish(&topic::entity_topic(entity_id), &event);
        self.publish(&topic::broadcast_topic(), &event);

        if matches!(action, ReactionAction::Added | ReactionAction::Switched) {
            self.notify(
                owner,
                actor,
                Notification {
                    kind: NotificationKind::Reaction,
                    message: "someone reacted to your comment".to_string(),
                    data: json!({ "comment_id": entity_id, "action": action }),
                },
            );
        }
    }

    /// Echo a reaction result back to the actor's own subject topic,
    /// carrying their new own-reaction state.
    pub fn reaction_ack(
        &self,
        entity_id: &str,
        actor: &str,
        action: ReactionAction,
        counters: ReactionCounters,
        own_reaction: Option<OwnReaction>,
    ) {
        self.publish(
            &topic::subject_topic(actor),
            &ServerEvent::ReactionChanged {
                entity_id: entity_id.to_string(),
                subject_id: actor.to_string(),
                action,
                counters,
                own_reaction,
            },
        );
    }

    /// Relay a typing signal to the entity topic, excluding the sender's own
    /// connection. The server retains no typing state; the signal is passed
    /// through as-is.
    pub fn relay_typing(
        &self,
        entity_id: &str,
        subject: &str,
        sender: &ConnectionId,
        typing: bool,
    ) {
        let registry = self.registry.lock().unwrap();
        registry.publish_except(
            &topic::entity_topic(entity_id),
            &ServerEvent::Typing {
                entity_id: entity_id.to_string(),
                subject_id: subject.to_string(),
                typing,
            },
            sender,
        );
    }

    fn publish(&self, topic_name: &str, event: &ServerEvent) {
        let registry = self.registry.lock().unwrap();
        let delivered = registry.publish(topic_name, event);
        debug!(topic = topic_name, delivered, "envelope published");
    }

    /// Publish a private notification unless the actor is the owner. An
    /// actor never hears about their own action.
    fn notify(&self, owner: &str, actor: &str, notification: Notification) {
        if owner == actor {
            return;
        }
        self.publish(
            &topic::subject_topic(owner),
            &ServerEvent::Notification(notification),
        );
    }
}
