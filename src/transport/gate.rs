//! Connection gate
//!
//! Admission control for the WebSocket handshake. The credential arrives as
//! a `token` query parameter on the handshake URI; there is no in-band auth
//! exchange after the upgrade. A missing token is refused with 401, an
//! invalid or expired one with 403, both before the connection ever reaches
//! the registry. No anonymous connections are admitted: live updates need an
//! identity for targeted notifications, unlike anonymous REST reads.

use jsonwebtoken::{DecodingKey, Validation, decode};
use tungstenite::handshake::server::ErrorResponse;
use tungstenite::http::StatusCode;

use crate::transport::message::Claims;
use crate::utils::error::AuthError;

/// Resolves a bearer credential to a stable subject identifier.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// JWT-backed verifier. The secret comes from configuration and must match
/// whatever issued the token on the REST side.
pub struct JwtVerifier {
    secret: String,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidCredential)?;
        Ok(data.claims.sub)
    }
}

/// Pull the `token` parameter out of a handshake query string.
pub fn token_from_query(query: &str) -> Option<&str> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|t| !t.is_empty())
}

/// Build the pre-upgrade HTTP rejection for a refused handshake.
pub fn refusal(error: &AuthError) -> ErrorResponse {
    let status = match error {
        AuthError::MissingCredential => StatusCode::UNAUTHORIZED,
        AuthError::InvalidCredential => StatusCode::FORBIDDEN,
    };
    let mut response = ErrorResponse::new(Some(error.to_string()));
    *response.status_mut() = status;
    response
}
