use keywheel_common::{CredentialId, Provider, UserId};
use serde::{Deserialize, Serialize};

/// Encrypted secret material as held by the credential store. Opaque to this
/// crate; only the store can produce the plaintext, scoped to the owning
/// user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret(pub String);

/// Quota verdict stamped on a credential when its provider signals
/// exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub exhausted: bool,
    pub exhausted_at: i64,
}

/// One stored API key for a (user, provider) pair.
///
/// This core only ever reads these, stamps `last_used_at`, or flips
/// `active`/`quota` on exhaustion. Creation and deletion belong to the
/// credential-entry surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    /// `None` marks a credential seeded from the process environment rather
    /// than a user's own entry.
    pub user_id: Option<UserId>,
    pub provider: Provider,
    pub secret: EncryptedSecret,
    /// Tie-break rank; lower sorts first.
    pub priority: i32,
    pub last_used_at: Option<i64>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaStatus>,
}

/// A stored Vertex AI credential. Lives in its own pool, addressed only by
/// user; the pool never mixes with the free gemini tier, which would bill or
/// rate-limit the wrong account. The encrypted payload decrypts to the
/// service-account JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexCredential {
    pub id: CredentialId,
    pub user_id: UserId,
    pub secret: EncryptedSecret,
    pub priority: i32,
    pub last_used_at: Option<i64>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaStatus>,
    pub project_id: String,
    pub location: String,
}

/// Where a resolved secret came from. Only user-pool keys participate in
/// rotation; an environment key has nothing to rotate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Process-wide fallback from the environment.
    Environment,
    /// Selected from the user's rotation pool. `display_rank` is the stable
    /// "key N of M" position in (priority, id) order, deliberately decoupled
    /// from rotation order so the number a user sees does not drift as
    /// usage timestamps change.
    UserPool {
        id: CredentialId,
        display_rank: usize,
        active_total: usize,
    },
}

impl CredentialSource {
    pub fn key_id(&self) -> Option<&CredentialId> {
        match self {
            CredentialSource::UserPool { id, .. } => Some(id),
            CredentialSource::Environment => None,
        }
    }
}

/// Call-shaping facts carried by a resolved Vertex credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexRuntime {
    pub project_id: String,
    pub location: String,
}

/// Outcome of a successful selection: the decrypted secret plus what a
/// caller needs to execute the request and report "key N of M". For Vertex
/// credentials the secret is the service-account JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub secret: String,
    pub source: CredentialSource,
    pub vertex: Option<VertexRuntime>,
}

impl ResolvedCredential {
    pub fn from_environment(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            source: CredentialSource::Environment,
            vertex: None,
        }
    }
}
