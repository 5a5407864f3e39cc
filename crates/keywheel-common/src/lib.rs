//! Shared vocabulary for the keywheel crates: the provider taxonomy, opaque
//! ids, and the clock seam used wherever unix timestamps are stamped.

use serde::{Deserialize, Serialize};

/// Opaque credential id as assigned by the credential store.
pub type CredentialId = String;

/// Opaque owning-user id. Absence means "no user": only process-wide
/// environment credentials apply.
pub type UserId = String;

#[derive(Debug, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

/// The closed set of upstream services this core mediates access to.
///
/// `Gemini` is the free public Generative Language tier; `VertexAi` is the
/// paid per-user Google Cloud path. The two are never interchangeable: they
/// bill different accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Youtube,
    Claude,
    Openai,
    Gemini,
    VertexAi,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Youtube,
        Provider::Claude,
        Provider::Openai,
        Provider::Gemini,
        Provider::VertexAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Youtube => "youtube",
            Provider::Claude => "claude",
            Provider::Openai => "openai",
            Provider::Gemini => "gemini",
            Provider::VertexAi => "vertex-ai",
        }
    }

    /// Environment variable holding the process-wide fallback key, if the
    /// provider has one. Vertex credentials are always per-user.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Provider::Youtube => Some("YOUTUBE_API_KEY"),
            Provider::Claude => Some("ANTHROPIC_API_KEY"),
            Provider::Openai => Some("OPENAI_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::VertexAi => None,
        }
    }

    /// Whether successful calls are billed per request and belong in the
    /// usage ledger. The free Gemini tier and the YouTube Data API are not.
    pub fn is_metered(&self) -> bool {
        matches!(
            self,
            Provider::Claude | Provider::Openai | Provider::VertexAi
        )
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(Provider::Youtube),
            "claude" => Ok(Provider::Claude),
            "openai" => Ok(Provider::Openai),
            "gemini" => Ok(Provider::Gemini),
            "vertex-ai" => Ok(Provider::VertexAi),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Source of "now" in unix seconds. Injected wherever expiry or usage
/// ordering is decided so tests can drive time explicitly.
pub trait Clock: Send + Sync {
    fn unix_now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }
}
