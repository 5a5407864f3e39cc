use keywheel_core::FailureSignal;

/// Failure shape for caller-owned upstream fetches: enough for quota
/// classification, nothing provider-specific.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl FailureSignal for UpstreamError {
    fn status(&self) -> Option<u16> {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keywheel_core::QuotaClassifier;

    #[test]
    fn carries_status_into_classification() {
        let classifier = QuotaClassifier::default();
        assert!(classifier.is_quota(&UpstreamError::from_status(429, "slow down")));
        assert!(classifier.is_quota(&UpstreamError::new("Quota exceeded for minute")));
        assert!(!classifier.is_quota(&UpstreamError::from_status(503, "overloaded")));
    }
}
