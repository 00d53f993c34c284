//! Client-side real-time layer: connection lifecycle, topic membership and
//! state reconciliation.
//!
//! A view wires these together as: `SocketManager` owns the socket and
//! forwards decoded envelopes over a channel; `Memberships` issues
//! join/leave/typing messages through it; the `Reconciler` consumes the
//! channel and merges envelopes into the local state the view renders.

pub mod membership;
pub mod reconciler;
pub mod transport;

pub use membership::Memberships;
pub use reconciler::{ReactionEntry, Reconciler};
pub use transport::{ConnectionState, RetryPolicy, SocketManager};

#[cfg(test)]
mod tests;
