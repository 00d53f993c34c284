//! Topic membership tracking
//!
//! `Memberships` records which entity topics the current view has joined and
//! issues the join/leave wire messages as components mount and unmount.
//! Redundant joins are de-duplicated here and are idempotent at the registry
//! anyway. The joined set deliberately survives a transport disconnect;
//! `rejoin_all` re-issues every held join once the connection is ready again.
//!
//! Typing emission is debounced: the start signal goes out only after a
//! short delay past the first keystroke, and a matching stop is emitted
//! automatically after an idle timeout if the caller never stops explicitly.
//! Every pending timer is cancelled on `teardown`, so nothing fires against
//! an unmounted view.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::transport::SocketManager;
use crate::transport::message::ClientMessage;

#[derive(Debug, Default)]
struct TypingState {
    start_timer: Option<JoinHandle<()>>,
    idle_timer: Option<JoinHandle<()>>,
    /// True once the start signal actually went out on the wire.
    started: bool,
}

impl TypingState {
    fn cancel_timers(&mut self) {
        if let Some(t) = self.start_timer.take() {
            t.abort();
        }
        if let Some(t) = self.idle_timer.take() {
            t.abort();
        }
    }
}

#[derive(Default)]
struct MembershipInner {
    joined: HashSet<String>,
    typing: HashMap<String, TypingState>,
}

#[derive(Clone)]
pub struct Memberships {
    socket: SocketManager,
    debounce: Duration,
    idle: Duration,
    inner: Arc<Mutex<MembershipInner>>,
}

impl Memberships {
    pub fn new(socket: SocketManager, debounce: Duration, idle: Duration) -> Self {
        Self {
            socket,
            debounce,
            idle,
            inner: Arc::new(Mutex::new(MembershipInner::default())),
        }
    }

    /// Join an entity topic. Sends the wire message only when this is a new
    /// membership.
    pub fn join(&self, entity_id: &str) {
        let newly_joined = self.inner.lock().unwrap().joined.insert(entity_id.to_string());
        if newly_joined {
            self.socket.send(&ClientMessage::Join {
                entity_id: entity_id.to_string(),
            });
        }
    }

    /// Leave an entity topic and cancel any typing state held for it.
    pub fn leave(&self, entity_id: &str) {
        self.stop_typing(entity_id);
        let was_member = self.inner.lock().unwrap().joined.remove(entity_id);
        if was_member {
            self.socket.send(&ClientMessage::Leave {
                entity_id: entity_id.to_string(),
            });
        }
    }

    pub fn is_joined(&self, entity_id: &str) -> bool {
        self.inner.lock().unwrap().joined.contains(entity_id)
    }

    /// Re-issue every held join. Called after the connection comes back;
    /// the server forgot this connection's memberships when it dropped.
    pub fn rejoin_all(&self) {
        let joined: Vec<String> = self.inner.lock().unwrap().joined.iter().cloned().collect();
        for entity_id in joined {
            self.socket.send(&ClientMessage::Join { entity_id });
        }
    }

    /// Note a keystroke in the composer for an entity. The first keystroke
    /// arms the debounced start; every one pushes the idle stop deadline out.
    pub fn keystroke(&self, entity_id: &str) {
        let already_started = {
            let mut inner = self.inner.lock().unwrap();
            let state = inner.typing.entry(entity_id.to_string()).or_default();
            if !state.started && state.start_timer.is_none() {
                let this = self.clone();
                let id = entity_id.to_string();
                let debounce = self.debounce;
                state.start_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(debounce).await;
                    this.emit_start(&id);
                }));
            }
            state.started
        };
        if already_started {
            self.arm_idle(entity_id);
        }
    }

    /// Explicitly stop typing: cancel pending timers and send the stop if a
    /// start ever went out. A no-op for entities never typed in.
    pub fn stop_typing(&self, entity_id: &str) {
        let started = {
            let mut inner = self.inner.lock().unwrap();
            match inner.typing.remove(entity_id) {
                Some(mut state) => {
                    state.cancel_timers();
                    state.started
                }
                None => false,
            }
        };
        if started {
            self.socket.send(&ClientMessage::TypingStop {
                entity_id: entity_id.to_string(),
            });
        }
    }

    /// True while this view believes its own typing start is on the wire.
    pub fn is_typing(&self, entity_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .typing
            .get(entity_id)
            .is_some_and(|s| s.started)
    }

    /// Cancel every pending timer and stop every active typing signal. Must
    /// run on unmount; a timer firing against a dead view is the main leak
    /// risk in this layer.
    pub fn teardown(&self) {
        let entities: Vec<String> = self.inner.lock().unwrap().typing.keys().cloned().collect();
        for entity_id in entities {
            self.stop_typing(&entity_id);
        }
    }

    fn emit_start(&self, entity_id: &str) {
        {
            let mut inner = self.inner.lock().unwrap();
            let Some(state) = inner.typing.get_mut(entity_id) else {
                // stop_typing won the race; nothing to start
                return;
            };
            state.start_timer = None;
            state.started = true;
        }
        self.socket.send(&ClientMessage::TypingStart {
            entity_id: entity_id.to_string(),
        });
        self.arm_idle(entity_id);
    }

    fn arm_idle(&self, entity_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        let Some(state) = inner.typing.get_mut(entity_id) else {
            return;
        };
        if let Some(t) = state.idle_timer.take() {
            t.abort();
        }
        let this = self.clone();
        let id = entity_id.to_string();
        let idle = self.idle;
        state.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            this.stop_typing(&id);
        }));
    }
}
