use async_trait::async_trait;
use keywheel_common::{Clock, CredentialId, Provider, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One usage-ledger row, appended after a successful metered call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: Option<UserId>,
    pub provider: Provider,
    /// Name of the calling operation, e.g. `generate-script`.
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<CredentialId>,
    pub recorded_at: i64,
}

impl UsageRecord {
    pub fn new(
        clock: &dyn Clock,
        user: Option<&UserId>,
        provider: Provider,
        operation: &str,
        key_id: Option<&CredentialId>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user.cloned(),
            provider,
            operation: operation.to_string(),
            key_id: key_id.cloned(),
            recorded_at: clock.unix_now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("usage sink rejected record: {0}")]
pub struct UsageError(pub String);

/// Ledger seam. Failures here are advisory by contract: they must never
/// fail a call that already succeeded upstream.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: UsageRecord) -> Result<(), UsageError>;
}

/// A non-critical side effect that failed. The primary outcome stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryFailure {
    pub effect: &'static str,
    pub detail: String,
}
