//! # livethread
//!
//! `livethread` is the real-time event-distribution layer of a web comment
//! platform: the server-side broadcast registry and event emitter, the
//! authenticating WebSocket transport between them and the browser, and the
//! client-side reconnection and state-reconciliation machinery.
//!
//! ## Core Modules
//!
//! - `registry`: topic membership and envelope fan-out to connected clients.
//! - `emitter`: typed event construction and topic selection for the CRUD
//!   layer's mutations, including private owner notifications.
//! - `transport`: the wire protocol, the connection gate authenticating each
//!   handshake, and the WebSocket server loop.
//! - `client`: connection lifecycle with bounded exponential backoff, topic
//!   membership tracking with debounced typing signals, and the reconciler
//!   merging inbound envelopes into local state.
//! - `model`: the entity and counter payloads envelopes carry.
//! - `config` / `utils`: configuration loading, error types, logging.

pub mod client;
pub mod config;
pub mod emitter;
pub mod model;
pub mod registry;
pub mod transport;
pub mod utils;
