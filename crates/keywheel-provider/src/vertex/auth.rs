use std::sync::Arc;

use keywheel_common::{Clock, SystemClock};
use tracing::debug;

use super::AuthError;
use super::oauth::{CachedToken, JwtBearerMinter, TokenCache, TokenMinter};
use super::service_account::ServiceAccountKey;

/// Turns a stored service-account document into a usable bearer token,
/// reusing cached tokens until they come within the expiry margin. The
/// cache is injected: construct one per process and share it.
pub struct VertexAuthenticator {
    cache: Arc<TokenCache>,
    minter: Arc<dyn TokenMinter>,
    clock: Arc<dyn Clock>,
}

impl VertexAuthenticator {
    pub fn new(cache: Arc<TokenCache>, minter: Arc<dyn TokenMinter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            minter,
            clock,
        }
    }

    /// Default wiring: fresh cache, HTTP minting, system clock.
    pub fn with_http(proxy: Option<&str>) -> Result<Self, AuthError> {
        Ok(Self::new(
            Arc::new(TokenCache::new()),
            Arc::new(JwtBearerMinter::new(proxy)?),
            Arc::new(SystemClock),
        ))
    }

    /// Accepts the document as raw JSON, the way stores hand it over.
    pub async fn access_token_for_doc(&self, doc: &str) -> Result<String, AuthError> {
        let key = ServiceAccountKey::parse(doc)?;
        self.access_token(&key).await
    }

    pub async fn access_token(&self, key: &ServiceAccountKey) -> Result<String, AuthError> {
        let now = self.clock.unix_now();
        if let Some(bearer) = self.cache.fresh(&key.client_email, now) {
            return Ok(bearer);
        }
        let grant = self.minter.mint(key, now).await?;
        let expires_at = now + grant.expires_in.unwrap_or(3600);
        debug!(account = %key.client_email, expires_at, "minted vertex access token");
        self.cache.store(
            &key.client_email,
            CachedToken {
                bearer: grant.access_token.clone(),
                expires_at,
            },
        );
        Ok(grant.access_token)
    }

    /// Test and maintenance surface; normal request handling never clears.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
