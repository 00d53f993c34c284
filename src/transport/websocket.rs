//! WebSocket server
//!
//! Accepts connections, runs the gate during the HTTP upgrade, and
//! translates protocol JSON into registry operations. Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Refuse the upgrade outright when the gate rejects the credential
//! - Create a `Connection` per admitted socket, register it, and auto-join
//!   the subject's private topic
//! - Forward join/leave/typing requests to the registry and emitter
//!
//! Malformed client messages are logged and ignored; these channels carry no
//! acknowledgement contract, so there is nothing useful to answer and no
//! reason to disconnect.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, info, warn};
use tungstenite::handshake::server::{Request, Response};
use tungstenite::protocol::Message as WsMessage;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::emitter::EventEmitter;
use crate::registry::{Connection, Registry, topic};
use crate::transport::gate::{self, IdentityVerifier};
use crate::transport::message::ClientMessage;
use crate::utils::error::AuthError;

pub async fn start_websocket_server(
    addr: String,
    registry: Arc<Mutex<Registry>>,
    emitter: EventEmitter,
    verifier: Arc<dyn IdentityVerifier>,
) {
    let listener = TcpListener::bind(addr.clone()).await.expect("Can't bind");

    info!("live update server listening on ws://{addr}");

    while let Ok((stream, _)) = listener.accept().await {
        let registry = registry.clone();
        let emitter = emitter.clone();
        let verifier = verifier.clone();

        tokio::spawn(async move {
            handle_connection(stream, registry, emitter, verifier).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    registry: Arc<Mutex<Registry>>,
    emitter: EventEmitter,
    verifier: Arc<dyn IdentityVerifier>,
) {
    // The gate runs inside the upgrade callback so a refused credential
    // never becomes a WebSocket connection at all.
    let mut subject: Option<String> = None;
    let callback = |req: &Request, response: Response| {
        let Some(token) = req.uri().query().and_then(gate::token_from_query) else {
            return Err(gate::refusal(&AuthError::MissingCredential));
        };
        match verifier.verify(token) {
            Ok(sub) => {
                subject = Some(sub);
                Ok(response)
            }
            Err(e) => Err(gate::refusal(&e)),
        }
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("handshake refused: {e}");
            return;
        }
    };
    let Some(subject) = subject else {
        // accept_hdr_async succeeded without running the gate; never happens.
        warn!("admitted connection without a subject");
        return;
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let connection = Connection::new(subject.clone(), tx);
    let connection_id = connection.id.clone();
    {
        let mut registry = registry.lock().unwrap();
        registry.register(connection);
        // Every admitted subject listens on their private topic from the
        // first moment; it is never joined by request.
        registry.join(&connection_id, &topic::subject_topic(&subject));
    }
    info!(connection = %connection_id, subject = %subject, "connection admitted");

    let cleanup_called = Arc::new(AtomicBool::new(false));

    let do_cleanup = {
        let registry = registry.clone();
        let connection_id = connection_id.clone();
        let cleanup_called = cleanup_called.clone();

        move || {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                let mut registry = registry.lock().unwrap();
                registry.drop_connection(&connection_id);
            }
        }
    };

    {
        let connection_id = connection_id.clone();
        let do_cleanup = do_cleanup.clone();

        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    debug!(connection = %connection_id, "send loop closing: {e}");
                    break;
                }
            }

            do_cleanup();
        });
    }

    while let Some(Ok(msg)) = ws_receiver.next().await {
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else { continue };

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Join { entity_id }) => {
                let mut registry = registry.lock().unwrap();
                registry.join(&connection_id, &topic::entity_topic(&entity_id));
                debug!(connection = %connection_id, entity = %entity_id, "joined entity topic");
            }
            Ok(ClientMessage::Leave { entity_id }) => {
                let mut registry = registry.lock().unwrap();
                registry.leave(&connection_id, &topic::entity_topic(&entity_id));
                debug!(connection = %connection_id, entity = %entity_id, "left entity topic");
            }
            Ok(ClientMessage::TypingStart { entity_id }) => {
                emitter.relay_typing(&entity_id, &subject, &connection_id, true);
            }
            Ok(ClientMessage::TypingStop { entity_id }) => {
                emitter.relay_typing(&entity_id, &subject, &connection_id, false);
            }
            Err(err) => {
                debug!(
                    connection = %connection_id,
                    "ignoring malformed client message: {err} | {}",
                    &text.chars().take(100).collect::<String>()
                );
            }
        }
    }

    do_cleanup();
}
