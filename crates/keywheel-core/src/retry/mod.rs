//! The select -> execute -> classify -> rotate loop. Attempts are strictly
//! sequential: rotation has to observe the previous attempt's failure
//! before it can decide anything.

mod policy;

pub use policy::{
    DEFAULT_QUOTA_MARKERS, FailureSignal, QuotaClassifier, RetryPolicy, RetryState,
    TerminalFailure,
};

use std::future::Future;
use std::sync::Arc;

use keywheel_common::{Clock, CredentialId, Provider, SystemClock, UserId};
use tracing::warn;

use crate::credential::ResolvedCredential;
use crate::resolver::CredentialResolver;
use crate::store::{CredentialStore, VertexStore};
use crate::usage::{AdvisoryFailure, UsageRecord, UsageSink};

/// Terminal failure of a rotation run.
#[derive(Debug, thiserror::Error)]
pub enum RunError<E> {
    #[error("no credential available for {provider}; add an API key")]
    NoCredential { provider: Provider },
    #[error("all credentials exhausted for {provider}; add a new API key")]
    PoolExhausted { provider: Provider },
    #[error("max retries exceeded for {provider} after {attempts} attempts")]
    RetriesExceeded { provider: Provider, attempts: u32 },
    /// A failure this core does not understand, surfaced unchanged.
    #[error("{0}")]
    Upstream(E),
}

/// Primary outcome of a run plus advisory context. Advisory failures (the
/// usage-ledger write) never affect the primary result.
#[derive(Debug)]
pub struct RunReport<T> {
    pub value: T,
    /// Attempts actually executed, counting the successful one.
    pub attempts: u32,
    /// Whether rotation happened on the way to success. Collaborators use
    /// this for the "quota exhausted, rotated automatically" notice.
    pub rotated: bool,
    pub advisories: Vec<AdvisoryFailure>,
}

/// Drives request execution against the credential hierarchy, rotating
/// exhausted user-pool keys up to the policy's attempt budget.
pub struct Orchestrator<S, V> {
    resolver: CredentialResolver<S, V>,
    policy: RetryPolicy,
    usage: Option<Arc<dyn UsageSink>>,
    clock: Arc<dyn Clock>,
}

impl<S: CredentialStore, V: VertexStore> Orchestrator<S, V> {
    pub fn new(resolver: CredentialResolver<S, V>, policy: RetryPolicy) -> Self {
        Self {
            resolver,
            policy,
            usage: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn resolver(&self) -> &CredentialResolver<S, V> {
        &self.resolver
    }

    /// Runs `execute` with a resolved credential, rotating on quota
    /// exhaustion. Failures that are not quota-shaped, or that hit an
    /// environment key, surface unchanged and immediately.
    pub async fn run<T, E, F, Fut>(
        &self,
        user: Option<&UserId>,
        provider: Provider,
        operation: &str,
        mut execute: F,
    ) -> Result<RunReport<T>, RunError<E>>
    where
        F: FnMut(ResolvedCredential) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureSignal,
    {
        let mut state = self.policy.start();
        loop {
            state = match state {
                RetryState::Selecting { attempt } => {
                    let found = self.resolver.resolve(user, provider).await;
                    self.policy.on_selected(attempt, found)
                }
                RetryState::Executing { attempt, credential } => {
                    match execute(credential.clone()).await {
                        Ok(value) => {
                            let advisories =
                                self.settle_usage(user, provider, operation, &credential).await;
                            return Ok(RunReport {
                                value,
                                attempts: attempt + 1,
                                rotated: attempt > 0,
                                advisories,
                            });
                        }
                        Err(failure) => {
                            let quota = self.policy.classifier.is_quota(&failure);
                            match self
                                .policy
                                .on_failure(attempt, &credential, quota, user.is_some())
                            {
                                Some(next) => {
                                    if let RetryState::Rotating { exhausted, .. } = &next {
                                        warn!(
                                            provider = %provider,
                                            key_id = %exhausted,
                                            attempt = attempt + 1,
                                            "quota exhausted, rotating to next key"
                                        );
                                    }
                                    next
                                }
                                None => return Err(RunError::Upstream(failure)),
                            }
                        }
                    }
                }
                RetryState::Rotating { attempt, exhausted } => {
                    let replacement = self
                        .resolver
                        .mark_exhausted_and_rotate(user, &exhausted, provider)
                        .await;
                    self.policy.on_rotated(attempt, replacement)
                }
                RetryState::FailedTerminal(failure) => {
                    return Err(self.terminal_error(provider, failure));
                }
                // Success returns from the executing arm with its value.
                RetryState::Succeeded => {
                    return Err(self.terminal_error(provider, TerminalFailure::RetriesExceeded));
                }
            };
        }
    }

    /// Best-effort usage append, exposed for callers that manage their own
    /// loop. Never fails the caller; a rejection comes back as an advisory.
    pub async fn record_usage(
        &self,
        user: Option<&UserId>,
        provider: Provider,
        operation: &str,
        key_id: Option<&CredentialId>,
    ) -> Option<AdvisoryFailure> {
        let sink = self.usage.as_ref()?;
        let record = UsageRecord::new(&*self.clock, user, provider, operation, key_id);
        match sink.record(record).await {
            Ok(()) => None,
            Err(err) => {
                warn!(
                    provider = %provider,
                    operation = %operation,
                    error = %err,
                    "usage record dropped"
                );
                Some(AdvisoryFailure {
                    effect: "usage-record",
                    detail: err.to_string(),
                })
            }
        }
    }

    async fn settle_usage(
        &self,
        user: Option<&UserId>,
        provider: Provider,
        operation: &str,
        credential: &ResolvedCredential,
    ) -> Vec<AdvisoryFailure> {
        let mut advisories = Vec::new();
        if provider.is_metered()
            && let Some(advisory) = self
                .record_usage(user, provider, operation, credential.source.key_id())
                .await
        {
            advisories.push(advisory);
        }
        advisories
    }

    fn terminal_error<E>(&self, provider: Provider, failure: TerminalFailure) -> RunError<E> {
        match failure {
            TerminalFailure::NoCredential => RunError::NoCredential { provider },
            TerminalFailure::PoolExhausted => RunError::PoolExhausted { provider },
            TerminalFailure::RetriesExceeded => RunError::RetriesExceeded {
                provider,
                attempts: self.policy.max_attempts,
            },
        }
    }
}
