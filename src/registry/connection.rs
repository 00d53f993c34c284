//! Connection representation
//!
//! `Connection` models one admitted client session and holds the sending
//! side of a per-connection channel used by the registry to push envelopes.
//! The `subject` is resolved by the connection gate before the connection is
//! constructed and never changes afterwards.

use std::collections::HashSet;

use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

pub type ConnectionId = String;

#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Authenticated subject identifier. Immutable after the handshake.
    pub subject: String,
    pub sender: UnboundedSender<WsMessage>,
    /// Topic names this connection currently belongs to. Maintained by the
    /// registry; dropped wholesale when the connection closes.
    pub topics: HashSet<String>,
}

impl Connection {
    /// Create a connection for an authenticated subject. The `id` is a UUID
    /// used to identify the connection across registry operations.
    pub fn new(subject: impl Into<String>, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject: subject.into(),
            sender,
            topics: HashSet::new(),
        }
    }
}
