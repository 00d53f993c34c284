//! Client connection lifecycle
//!
//! `SocketManager` owns the client's WebSocket and its reconnection state
//! machine: `Disconnected -> Connecting -> Connected`, with unclean closes
//! feeding `Reconnecting` under a bounded exponential backoff and `Failed`
//! once the retry budget runs out. A `Failed` manager only moves again on an
//! explicit `reconnect()`, which is the caller's cue to surface a manual
//! reconnect affordance instead of retrying silently forever.
//!
//! All operations return immediately; connecting, reading and writing happen
//! on spawned tasks. Every scheduled callback re-checks the manager's
//! generation counter, so a deliberate `disconnect()` or `reconnect()`
//! (which bump the generation) invalidates any timer or dial still in
//! flight. An in-flight dial cannot be aborted mid-handshake, only ignored
//! once it lands.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::transport::message::{ClientMessage, ServerEvent};
use crate::utils::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

/// Backoff parameters for automatic reconnection.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Delay before the Nth reconnection attempt: `min(base * 2^(N-1), cap)`.
pub fn retry_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    policy
        .base
        .saturating_mul(1u32 << exponent)
        .min(policy.cap)
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    attempts: u32,
    /// Bumped by disconnect/reconnect; stale timers and dials check it and
    /// stand down instead of firing into a context that moved on.
    generation: u64,
    retry_timer: Option<JoinHandle<()>>,
    writer: Option<UnboundedSender<WsMessage>>,
}

#[derive(Clone)]
pub struct SocketManager {
    url: String,
    token: Option<String>,
    policy: RetryPolicy,
    events: UnboundedSender<ServerEvent>,
    inner: Arc<Mutex<Inner>>,
}

impl SocketManager {
    /// `events` receives every well-formed inbound envelope; the reconciler
    /// sits on the other end.
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        policy: RetryPolicy,
        events: UnboundedSender<ServerEvent>,
    ) -> Self {
        Self {
            url: url.into(),
            token,
            policy,
            events,
            inner: Arc::new(Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                attempts: 0,
                generation: 0,
                retry_timer: None,
                writer: None,
            })),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().unwrap().state
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.inner.lock().unwrap().attempts
    }

    /// Begin connecting. Without a stored credential this fails immediately
    /// and the manager lands in `Failed` without dialing.
    pub fn connect(&self) -> Result<(), ClientError> {
        if self.token.is_none() {
            self.inner.lock().unwrap().state = ConnectionState::Failed;
            return Err(ClientError::MissingCredential);
        }
        let generation = {
            let mut inner = self.inner.lock().unwrap();
            if matches!(
                inner.state,
                ConnectionState::Connecting
                    | ConnectionState::Connected
                    | ConnectionState::Reconnecting { .. }
            ) {
                // Already in progress; a manual reconnect is the way to
                // preempt a scheduled retry.
                return Ok(());
            }
            inner.state = ConnectionState::Connecting;
            inner.generation
        };
        self.spawn_dial(generation);
        Ok(())
    }

    /// Tear the connection down. Pending retry timers are cancelled before
    /// the transport goes, so no stale attempt can fire afterwards.
    /// Idempotent and immediate from the caller's perspective.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        if let Some(timer) = inner.retry_timer.take() {
            timer.abort();
        }
        // Dropping the writer ends the write loop, which closes the socket.
        inner.writer = None;
        inner.attempts = 0;
        inner.state = ConnectionState::Disconnected;
    }

    /// Manual reconnect: cancels any scheduled retry, resets the attempt
    /// counter and dials immediately.
    pub fn reconnect(&self) -> Result<(), ClientError> {
        if self.token.is_none() {
            self.inner.lock().unwrap().state = ConnectionState::Failed;
            return Err(ClientError::MissingCredential);
        }
        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.generation += 1;
            if let Some(timer) = inner.retry_timer.take() {
                timer.abort();
            }
            inner.writer = None;
            inner.attempts = 0;
            inner.state = ConnectionState::Connecting;
            inner.generation
        };
        self.spawn_dial(generation);
        Ok(())
    }

    /// Fire-and-forget: queued when connected, silently dropped otherwise.
    pub fn send(&self, msg: &ClientMessage) {
        let inner = self.inner.lock().unwrap();
        let Some(writer) = &inner.writer else {
            debug!("not connected, dropping outbound message");
            return;
        };
        match serde_json::to_string(msg) {
            Ok(text) => {
                let _ = writer.send(WsMessage::text(text));
            }
            Err(e) => warn!("failed to serialize outbound message: {e}"),
        }
    }

    fn spawn_dial(&self, generation: u64) {
        let this = self.clone();
        tokio::spawn(async move {
            this.run_connection(generation).await;
        });
    }

    async fn run_connection(self, generation: u64) {
        let Some(token) = self.token.clone() else {
            return;
        };
        let url = format!("{}/?token={token}", self.url.trim_end_matches('/'));

        match connect_async(url).await {
            Ok((ws, _response)) => {
                let (mut sink, mut stream) = ws.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
                {
                    let mut inner = self.inner.lock().unwrap();
                    if inner.generation != generation {
                        // A disconnect raced the dial; abandon the socket.
                        return;
                    }
                    inner.state = ConnectionState::Connected;
                    inner.attempts = 0;
                    inner.writer = Some(tx);
                }
                info!("connected to {}", self.url);

                let write_loop = tokio::spawn(async move {
                    while let Some(msg) = rx.recv().await {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    let _ = sink.close().await;
                });

                while let Some(Ok(msg)) = stream.next().await {
                    if msg.is_text() {
                        if let Ok(text) = msg.to_text() {
                            self.deliver(text);
                        }
                    }
                }
                write_loop.abort();

                {
                    let mut inner = self.inner.lock().unwrap();
                    if inner.generation != generation {
                        // Deliberate disconnect; state was already settled.
                        return;
                    }
                    inner.writer = None;
                }
                warn!("connection to {} lost", self.url);
                self.schedule_retry(generation);
            }
            Err(e) => {
                debug!("dial to {} failed: {e}", self.url);
                if self.inner.lock().unwrap().generation != generation {
                    return;
                }
                self.schedule_retry(generation);
            }
        }
    }

    fn deliver(&self, text: &str) {
        match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => {
                let _ = self.events.send(event);
            }
            Err(e) => warn!("dropping malformed event: {e}"),
        }
    }

    fn schedule_retry(&self, generation: u64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.generation != generation {
            return;
        }
        inner.attempts += 1;
        if inner.attempts >= self.policy.max_attempts {
            inner.state = ConnectionState::Failed;
            warn!(
                "reconnect budget exhausted after {} attempts",
                inner.attempts
            );
            return;
        }
        let attempt = inner.attempts;
        inner.state = ConnectionState::Reconnecting { attempt };
        let delay = retry_delay(&self.policy, attempt);
        debug!(attempt, ?delay, "scheduling reconnect");

        let this = self.clone();
        inner.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let proceed = {
                let mut inner = this.inner.lock().unwrap();
                if inner.generation == generation {
                    inner.state = ConnectionState::Connecting;
                    true
                } else {
                    false
                }
            };
            if proceed {
                this.run_connection(generation).await;
            }
        }));
    }
}
