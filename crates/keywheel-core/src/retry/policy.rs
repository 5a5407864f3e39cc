use keywheel_common::CredentialId;

use crate::credential::ResolvedCredential;

/// Exposes the two facts quota classification needs from a failure.
/// Implement it on whatever error type your request execution produces;
/// `message` defaults to the display form.
pub trait FailureSignal: std::fmt::Display {
    /// HTTP status, when the failure carries one.
    fn status(&self) -> Option<u16> {
        None
    }

    /// Message text scanned for quota markers.
    fn message(&self) -> String {
        self.to_string()
    }
}

/// Markers treated as quota exhaustion when they appear in a failure
/// message. Held as data rather than logic: providers reword these.
pub const DEFAULT_QUOTA_MARKERS: [&str; 4] =
    ["quota", "limit exceeded", "quotaexceeded", "rate limit"];

#[derive(Debug, Clone)]
pub struct QuotaClassifier {
    markers: Vec<String>,
}

impl Default for QuotaClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA_MARKERS.into_iter().map(str::to_string))
    }
}

impl QuotaClassifier {
    pub fn new(markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            markers: markers
                .into_iter()
                .map(|marker| marker.to_lowercase())
                .collect(),
        }
    }

    /// HTTP 429, or any configured marker in the message,
    /// case-insensitively. Everything else is not rotation's business.
    pub fn is_quota(&self, failure: &impl FailureSignal) -> bool {
        if failure.status() == Some(429) {
            return true;
        }
        let message = failure.message().to_lowercase();
        self.markers
            .iter()
            .any(|marker| message.contains(marker.as_str()))
    }
}

/// Terminal ways a run can end without an upstream error to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalFailure {
    /// Nothing resolvable anywhere for the provider.
    NoCredential,
    /// Rotation ran the user's pool dry.
    PoolExhausted,
    /// The attempt budget ran out while keys were still available.
    RetriesExceeded,
}

/// The retry loop as explicit states. Transitions live on [`RetryPolicy`]
/// and are pure, so the rotation policy is testable with no store or
/// network behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    Selecting {
        attempt: u32,
    },
    Executing {
        attempt: u32,
        credential: ResolvedCredential,
    },
    Rotating {
        attempt: u32,
        exhausted: CredentialId,
    },
    Succeeded,
    FailedTerminal(TerminalFailure),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub classifier: QuotaClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            classifier: QuotaClassifier::default(),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn start(&self) -> RetryState {
        RetryState::Selecting { attempt: 0 }
    }

    /// Selecting -> Executing, or terminal when nothing was found. A dry
    /// first selection means no credential exists at all; a dry later one
    /// means rotation emptied the pool.
    pub fn on_selected(&self, attempt: u32, found: Option<ResolvedCredential>) -> RetryState {
        match found {
            Some(credential) => RetryState::Executing {
                attempt,
                credential,
            },
            None if attempt == 0 => RetryState::FailedTerminal(TerminalFailure::NoCredential),
            None => RetryState::FailedTerminal(TerminalFailure::PoolExhausted),
        }
    }

    pub fn on_success(&self) -> RetryState {
        RetryState::Succeeded
    }

    /// Executing -> Rotating or terminal, purely from the attempt counter
    /// and the failure's shape. `None` means the failure is not rotation's
    /// business: surface it to the caller unchanged.
    ///
    /// Rotation applies only to quota-shaped failures on a genuine
    /// user-pool key; an environment key or an anonymous call has nothing
    /// to rotate to.
    pub fn on_failure(
        &self,
        attempt: u32,
        credential: &ResolvedCredential,
        quota: bool,
        has_user: bool,
    ) -> Option<RetryState> {
        if !quota || !has_user {
            return None;
        }
        let id = credential.source.key_id()?;
        if attempt + 1 >= self.max_attempts {
            return Some(RetryState::FailedTerminal(TerminalFailure::RetriesExceeded));
        }
        Some(RetryState::Rotating {
            attempt: attempt + 1,
            exhausted: id.clone(),
        })
    }

    /// Rotating -> Executing with the replacement, or terminal when the
    /// pool is dry.
    pub fn on_rotated(&self, attempt: u32, replacement: Option<ResolvedCredential>) -> RetryState {
        match replacement {
            Some(credential) => RetryState::Executing {
                attempt,
                credential,
            },
            None => RetryState::FailedTerminal(TerminalFailure::PoolExhausted),
        }
    }
}
