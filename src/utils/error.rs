use thiserror::Error;

/// Why the connection gate refused a handshake.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredential,
    #[error("invalid credential")]
    InvalidCredential,
}

/// Client-side connection failures surfaced to the caller. Transport-level
/// failures are not here: they feed the reconnection state machine instead
/// of the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("no stored credential, cannot connect")]
    MissingCredential,
}
