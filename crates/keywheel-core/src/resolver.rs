use keywheel_common::{CredentialId, Provider, UserId};
use tracing::debug;

use crate::credential::ResolvedCredential;
use crate::env::EnvKeys;
use crate::rotation::{KeyRotation, VertexRotation};
use crate::store::{CredentialStore, VertexStore};

/// Resolution hierarchy over the three credential sources.
///
/// vertex-ai is per-user only and fails closed without a user. The free
/// gemini tier always answers from the environment and never reads per-user
/// storage. Every other provider prefers the user's pool and falls back to
/// the environment; per-user lookup failures are logged inside the registry
/// and fold into the fallback, never out to the caller.
pub struct CredentialResolver<S, V> {
    rotation: KeyRotation<S>,
    vertex: VertexRotation<V>,
    env: EnvKeys,
}

impl<S: CredentialStore, V: VertexStore> CredentialResolver<S, V> {
    pub fn new(rotation: KeyRotation<S>, vertex: VertexRotation<V>, env: EnvKeys) -> Self {
        Self {
            rotation,
            vertex,
            env,
        }
    }

    /// `None` is a configuration outcome ("add an API key"), not a fault.
    pub async fn resolve(
        &self,
        user: Option<&UserId>,
        provider: Provider,
    ) -> Option<ResolvedCredential> {
        match provider {
            Provider::VertexAi => {
                let user = user?;
                self.vertex.select_next(user).await
            }
            Provider::Gemini => self.env.resolve(Provider::Gemini),
            _ => {
                if let Some(user) = user
                    && let Some(found) = self.rotation.select_next(user, provider).await
                {
                    return Some(found);
                }
                debug!(provider = %provider, "falling back to environment credential");
                self.env.resolve(provider)
            }
        }
    }

    /// Direct exhaustion-and-rotate surface for callers that drive their own
    /// retry loop instead of using the orchestrator.
    pub async fn mark_exhausted_and_rotate(
        &self,
        user: Option<&UserId>,
        key_id: &CredentialId,
        provider: Provider,
    ) -> Option<ResolvedCredential> {
        let user = user?;
        match provider {
            Provider::VertexAi => {
                self.vertex
                    .mark_exhausted_and_select_next(user, key_id)
                    .await
            }
            // The free tier has no per-user pool to rotate.
            Provider::Gemini => None,
            _ => {
                self.rotation
                    .mark_exhausted_and_select_next(user, key_id, provider)
                    .await
            }
        }
    }
}
