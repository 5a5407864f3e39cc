use async_trait::async_trait;
use keywheel_common::{CredentialId, Provider, UserId};

use crate::credential::{Credential, EncryptedSecret, QuotaStatus, VertexCredential};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential lookup failed: {0}")]
    Lookup(String),
    #[error("decrypt failed: {0}")]
    Decrypt(String),
    #[error("credential update failed: {0}")]
    Update(String),
}

/// Fields this core is allowed to write back. Everything else on a
/// credential belongs to the credential-entry surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub last_used_at: Option<i64>,
    pub active: Option<bool>,
    pub quota: Option<QuotaStatus>,
}

impl CredentialUpdate {
    /// Stamp a selection.
    pub fn touch(now: i64) -> Self {
        Self {
            last_used_at: Some(now),
            ..Self::default()
        }
    }

    /// Deactivate after a quota signal.
    pub fn exhaust(now: i64) -> Self {
        Self {
            active: Some(false),
            quota: Some(QuotaStatus {
                exhausted: true,
                exhausted_at: now,
            }),
            ..Self::default()
        }
    }
}

/// Persistence seam for the generic per-user pools. Implementations enforce
/// that decryption is scoped to the owning user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn list_active(
        &self,
        user: &UserId,
        provider: Provider,
    ) -> Result<Vec<Credential>, StoreError>;

    async fn decrypt(&self, secret: &EncryptedSecret, user: &UserId)
    -> Result<String, StoreError>;

    async fn update(&self, id: &CredentialId, update: CredentialUpdate) -> Result<(), StoreError>;
}

/// Persistence seam for the isolated Vertex pool. The least-recently-used
/// pick and its `last_used_at` stamp happen server-side in one operation.
#[async_trait]
pub trait VertexStore: Send + Sync {
    /// Pops the least-recently-used active credential for the user,
    /// stamping `last_used_at` atomically. `exclude` guards the re-select
    /// after an exhaustion mark whose write may not have landed yet.
    async fn acquire_next(
        &self,
        user: &UserId,
        exclude: Option<&CredentialId>,
    ) -> Result<Option<VertexCredential>, StoreError>;

    async fn list_active(&self, user: &UserId) -> Result<Vec<VertexCredential>, StoreError>;

    async fn decrypt(&self, secret: &EncryptedSecret, user: &UserId)
    -> Result<String, StoreError>;

    async fn update(&self, id: &CredentialId, update: CredentialUpdate) -> Result<(), StoreError>;
}
