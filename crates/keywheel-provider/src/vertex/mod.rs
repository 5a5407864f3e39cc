//! Vertex AI service-account authentication: an RS256 JWT bearer grant
//! against the account's token endpoint, with per-process token caching.

mod auth;
mod oauth;
mod service_account;

pub use auth::VertexAuthenticator;
pub use oauth::{
    CachedToken, EXPIRY_MARGIN_SECS, JwtBearerMinter, TOKEN_SCOPE, TokenCache, TokenGrant,
    TokenMinter, sign_assertion,
};
pub use service_account::ServiceAccountKey;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),
    #[error("failed to sign token assertion: {0}")]
    Signing(String),
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
    #[error("token exchange rejected ({status}): {body}")]
    TokenExchange { status: u16, body: String },
    #[error("malformed token grant: {0}")]
    MalformedGrant(String),
}
