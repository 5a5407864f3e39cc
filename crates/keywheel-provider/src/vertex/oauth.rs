use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::service_account::ServiceAccountKey;

/// OAuth scope requested for Vertex calls.
pub const TOKEN_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Tokens closer than this to expiry are treated as stale and re-minted.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

const ASSERTION_LIFETIME_SECS: i64 = 3600;
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub bearer: String,
    pub expires_at: i64,
}

/// Process-lifetime cache of minted bearer tokens, keyed by service-account
/// email. A race here costs at most one redundant token exchange, so a
/// plain mutex is all the coordination it needs.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached bearer for `email`, if it still has more than the expiry
    /// margin left. A poisoned lock reads as a miss.
    pub fn fresh(&self, email: &str, now: i64) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(email)?;
        (entry.expires_at - now > EXPIRY_MARGIN_SECS).then(|| entry.bearer.clone())
    }

    pub fn store(&self, email: &str, token: CachedToken) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(email.to_string(), token);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Builds and signs the OAuth assertion for a service account: RS256, the
/// account's key id when present, audience pinned to its token endpoint.
pub fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String, AuthError> {
    use jsonwebtoken::{Algorithm, EncodingKey, Header};

    let claims = Claims {
        iss: &key.client_email,
        sub: &key.client_email,
        scope: TOKEN_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    if let Some(kid) = &key.private_key_id
        && !kid.trim().is_empty()
    {
        header.kid = Some(kid.clone());
    }
    let encoding_key = EncodingKey::from_rsa_pem(key.normalized_private_key().as_bytes())
        .map_err(|err| AuthError::InvalidCredentials(format!("bad private key: {err}")))?;
    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|err| AuthError::Signing(err.to_string()))
}

/// Successful response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Seam between the authenticator and the signing/exchange legwork, so
/// cache behavior stays testable without keys or network.
#[async_trait]
pub trait TokenMinter: Send + Sync {
    async fn mint(&self, key: &ServiceAccountKey, now: i64) -> Result<TokenGrant, AuthError>;
}

/// The real minter: sign the assertion and POST it to the account's token
/// endpoint as a form-encoded JWT bearer grant.
#[derive(Debug)]
pub struct JwtBearerMinter {
    client: wreq::Client,
}

impl JwtBearerMinter {
    pub fn new(proxy: Option<&str>) -> Result<Self, AuthError> {
        let mut builder = wreq::Client::builder();
        if let Some(proxy_url) = proxy {
            builder = builder.proxy(
                wreq::Proxy::all(proxy_url)
                    .map_err(|err| AuthError::Transport(err.to_string()))?,
            );
        }
        let client = builder
            .build()
            .map_err(|err| AuthError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TokenMinter for JwtBearerMinter {
    async fn mint(&self, key: &ServiceAccountKey, now: i64) -> Result<TokenGrant, AuthError> {
        let assertion = sign_assertion(key, now)?;
        let body = format!(
            "grant_type={JWT_BEARER_GRANT}&assertion={}",
            urlencoding::encode(&assertion)
        );
        let response = self
            .client
            .post(key.token_uri.as_str())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|err| AuthError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| AuthError::Transport(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| AuthError::MalformedGrant(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_honors_the_expiry_margin() {
        let cache = TokenCache::new();
        cache.store(
            "svc@demo.iam",
            CachedToken {
                bearer: "token-1".to_string(),
                expires_at: 1_000,
            },
        );

        assert_eq!(cache.fresh("svc@demo.iam", 600).as_deref(), Some("token-1"));
        // 699 seconds left: still beyond the margin. 700 is exactly on it.
        assert_eq!(cache.fresh("svc@demo.iam", 301).as_deref(), Some("token-1"));
        assert_eq!(cache.fresh("svc@demo.iam", 700), None);
        assert_eq!(cache.fresh("other@demo.iam", 0), None);
    }

    #[test]
    fn clear_drops_every_entry() {
        let cache = TokenCache::new();
        cache.store(
            "svc@demo.iam",
            CachedToken {
                bearer: "token-1".to_string(),
                expires_at: i64::MAX,
            },
        );
        cache.clear();
        assert_eq!(cache.fresh("svc@demo.iam", 0), None);
    }

    #[test]
    fn signing_with_a_garbage_key_is_invalid_credentials() {
        let key = ServiceAccountKey::from_value(serde_json::json!({
            "client_email": "svc@demo.iam",
            "private_key": "not a pem block",
            "token_uri": "https://oauth2.googleapis.com/token",
        }))
        .expect("fields are present");
        let err = sign_assertion(&key, 0).expect_err("must fail");
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }
}
