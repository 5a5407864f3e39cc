//! The two rotation registries. Both pick the least-recently-used active
//! credential; the generic one sorts client-side while the Vertex store owns
//! its pick server-side. Fairness is best-effort: two concurrent selections
//! for the same pool can pick the same key before either stamp lands.

mod order;

pub use order::{RotationEntry, display_rank, pick_next, rotation_order};

use std::sync::Arc;

use keywheel_common::{Clock, CredentialId, Provider, UserId};
use tracing::warn;

use crate::credential::{CredentialSource, ResolvedCredential, VertexRuntime};
use crate::store::{CredentialStore, CredentialUpdate, VertexStore};

/// Round-robin selection over a user's generic provider keys.
pub struct KeyRotation<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: CredentialStore> KeyRotation<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Picks the least-recently-used active key for `(user, provider)`,
    /// stamps it used, and returns its decrypted secret. `None` means the
    /// pool has nothing usable: it is empty, the listing failed, or the
    /// pick would not decrypt. Callers treat all three the same way.
    pub async fn select_next(
        &self,
        user: &UserId,
        provider: Provider,
    ) -> Option<ResolvedCredential> {
        self.select_excluding(user, provider, None).await
    }

    /// Marks `key_id` exhausted, then re-selects from the remainder. The
    /// exhaustion write is best-effort; the re-select excludes `key_id`
    /// explicitly so a lost write cannot hand the same key straight back.
    pub async fn mark_exhausted_and_select_next(
        &self,
        user: &UserId,
        key_id: &CredentialId,
        provider: Provider,
    ) -> Option<ResolvedCredential> {
        let now = self.clock.unix_now();
        if let Err(err) = self.store.update(key_id, CredentialUpdate::exhaust(now)).await {
            warn!(
                key_id = %key_id,
                provider = %provider,
                error = %err,
                "failed to persist exhaustion mark"
            );
        }
        self.select_excluding(user, provider, Some(key_id)).await
    }

    async fn select_excluding(
        &self,
        user: &UserId,
        provider: Provider,
        exclude: Option<&CredentialId>,
    ) -> Option<ResolvedCredential> {
        let mut pool = match self.store.list_active(user, provider).await {
            Ok(pool) => pool,
            Err(err) => {
                warn!(provider = %provider, error = %err, "credential listing failed");
                return None;
            }
        };
        pool.retain(|credential| credential.active && Some(&credential.id) != exclude);

        let picked = pick_next(&pool)?;
        let selected = &pool[picked];
        let rank = display_rank(&pool, selected);
        let total = pool.len();

        let now = self.clock.unix_now();
        if let Err(err) = self
            .store
            .update(&selected.id, CredentialUpdate::touch(now))
            .await
        {
            warn!(
                key_id = %selected.id,
                provider = %provider,
                error = %err,
                "failed to stamp last_used_at"
            );
        }

        let secret = match self.store.decrypt(&selected.secret, user).await {
            Ok(secret) => secret,
            Err(err) => {
                warn!(
                    key_id = %selected.id,
                    provider = %provider,
                    error = %err,
                    "credential decrypt failed"
                );
                return None;
            }
        };

        Some(ResolvedCredential {
            secret,
            source: CredentialSource::UserPool {
                id: selected.id.clone(),
                display_rank: rank,
                active_total: total,
            },
            vertex: None,
        })
    }
}

/// Rotation over the isolated Vertex pool. The store owns the
/// least-recently-used pick; this layer adds rank computation, decryption,
/// and the exhaustion path. It never consults the generic gemini pool or
/// the environment.
pub struct VertexRotation<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: VertexStore> VertexRotation<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn select_next(&self, user: &UserId) -> Option<ResolvedCredential> {
        self.select_excluding(user, None).await
    }

    pub async fn mark_exhausted_and_select_next(
        &self,
        user: &UserId,
        key_id: &CredentialId,
    ) -> Option<ResolvedCredential> {
        let now = self.clock.unix_now();
        if let Err(err) = self.store.update(key_id, CredentialUpdate::exhaust(now)).await {
            warn!(key_id = %key_id, error = %err, "failed to persist vertex exhaustion mark");
        }
        self.select_excluding(user, Some(key_id)).await
    }

    async fn select_excluding(
        &self,
        user: &UserId,
        exclude: Option<&CredentialId>,
    ) -> Option<ResolvedCredential> {
        let selected = match self.store.acquire_next(user, exclude).await {
            Ok(Some(credential)) => credential,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "vertex credential acquire failed");
                return None;
            }
        };

        // Rank and total are observability only; a failed listing does not
        // void the pick.
        let (rank, total) = match self.store.list_active(user).await {
            Ok(pool) => (display_rank(&pool, &selected), pool.len()),
            Err(err) => {
                warn!(error = %err, "vertex pool listing failed");
                (1, 1)
            }
        };

        let secret = match self.store.decrypt(&selected.secret, user).await {
            Ok(secret) => secret,
            Err(err) => {
                warn!(key_id = %selected.id, error = %err, "vertex credential decrypt failed");
                return None;
            }
        };

        Some(ResolvedCredential {
            secret,
            source: CredentialSource::UserPool {
                id: selected.id.clone(),
                display_rank: rank,
                active_total: total,
            },
            vertex: Some(VertexRuntime {
                project_id: selected.project_id.clone(),
                location: selected.location.clone(),
            }),
        })
    }
}
