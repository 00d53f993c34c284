//! Broadcast registry
//!
//! In-memory mapping from topic name to the set of connections joined to it,
//! responsible for:
//! - registering connections admitted by the gate
//! - idempotent join/leave of named topics
//! - fanning published envelopes out to current members
//! - dropping every membership of a connection when its transport closes
//!
//! Concurrency and usage notes:
//! - The public API here is synchronous and designed to be held behind a
//!   lock (`Arc<Mutex<Registry>>`) by the transport layer and the emitter.
//!   Callers should avoid holding the registry lock across network I/O.
//! - Envelopes published by one `publish` call reach all current members in
//!   order; no ordering is guaranteed across separate publish calls racing
//!   from different request handlers.

use std::collections::HashMap;

use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::registry::connection::{Connection, ConnectionId};
use crate::registry::topic::Topic;
use crate::transport::message::ServerEvent;

#[derive(Debug, Default)]
pub struct Registry {
    pub topics: HashMap<String, Topic>,
    pub connections: HashMap<ConnectionId, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection: Connection) {
        self.connections.insert(connection.id.clone(), connection);
    }

    /// Add a connection to a topic. A no-op if already a member or if the
    /// connection is unknown.
    pub fn join(&mut self, connection_id: &ConnectionId, topic_name: &str) {
        let Some(connection) = self.connections.get_mut(connection_id) else {
            warn!(%connection_id, topic = topic_name, "join from unknown connection");
            return;
        };
        connection.topics.insert(topic_name.to_string());

        self.topics
            .entry(topic_name.to_string())
            .or_insert_with(|| Topic::new(topic_name))
            .add(connection_id.clone());
    }

    /// Remove a connection from a topic. A no-op if not a member. An empty
    /// topic is dropped from the map entirely; it has no existence beyond
    /// its membership.
    pub fn leave(&mut self, connection_id: &ConnectionId, topic_name: &str) {
        if let Some(connection) = self.connections.get_mut(connection_id) {
            connection.topics.remove(topic_name);
        }
        if let Some(topic) = self.topics.get_mut(topic_name) {
            if topic.remove(connection_id) {
                self.topics.remove(topic_name);
            }
        }
    }

    /// Deliver an envelope to every current member of a topic. Publishing to
    /// a topic with no members is a silent no-op. Returns the number of
    /// copies handed to the transport.
    pub fn publish(&self, topic_name: &str, event: &ServerEvent) -> usize {
        self.fan_out(topic_name, event, None)
    }

    /// Like `publish`, but skips one connection. Used for typing relays,
    /// where the sender must not receive its own signal back.
    pub fn publish_except(
        &self,
        topic_name: &str,
        event: &ServerEvent,
        except: &ConnectionId,
    ) -> usize {
        self.fan_out(topic_name, event, Some(except))
    }

    fn fan_out(&self, topic_name: &str, event: &ServerEvent, except: Option<&ConnectionId>) -> usize {
        let Some(topic) = self.topics.get(topic_name) else {
            return 0;
        };

        let text = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                warn!(topic = topic_name, "failed to serialize envelope: {e}");
                return 0;
            }
        };
        let ws_msg = WsMessage::text(text);

        let mut delivered = 0;
        for member_id in &topic.members {
            if except.is_some_and(|id| id == member_id) {
                continue;
            }
            if let Some(connection) = self.connections.get(member_id) {
                if let Err(e) = connection.sender.send(ws_msg.clone()) {
                    warn!(connection = %member_id, "failed to send envelope: {e}");
                } else {
                    delivered += 1;
                }
            } else {
                warn!(connection = %member_id, topic = topic_name, "member without connection");
            }
        }
        delivered
    }

    /// Remove a connection from every topic it belonged to and forget it.
    /// Invoked exactly once by the transport's cleanup guard when the
    /// connection closes.
    pub fn drop_connection(&mut self, connection_id: &ConnectionId) {
        let Some(connection) = self.connections.remove(connection_id) else {
            return;
        };
        for topic_name in &connection.topics {
            if let Some(topic) = self.topics.get_mut(topic_name) {
                if topic.remove(connection_id) {
                    self.topics.remove(topic_name);
                }
            }
        }
        debug!(connection = %connection_id, subject = %connection.subject, "connection dropped");
    }
}
