//! Network communication with clients over WebSockets.
//!
//! Defines the wire protocol, the connection gate that authenticates each
//! handshake, and the server loop that forwards admitted clients' requests
//! to the registry.

pub mod gate;
pub mod message;
pub mod websocket;

pub use gate::{IdentityVerifier, JwtVerifier};
pub use message::{Claims, ClientMessage, ServerEvent};
pub use websocket::start_websocket_server;
