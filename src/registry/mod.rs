pub mod connection;
pub mod engine;
pub mod topic;

pub use connection::{Connection, ConnectionId};
pub use engine::Registry;
