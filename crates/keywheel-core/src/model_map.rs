use keywheel_common::Provider;
use tracing::warn;

/// A provider routing decision for a user-facing model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub provider: Provider,
    pub model: String,
}

const OPENAI_PREFIXES: [&str; 4] = ["gpt", "o1", "o3", "o4"];

/// Maps a user-facing model name onto the provider that serves it. Total:
/// every input routes somewhere, with unrecognized names falling open to
/// the free gemini tier rather than erroring.
///
/// The `vertex-` prefix is an addressing convention, stripped once to
/// recover the underlying model id; every other prefix passes through
/// unchanged.
pub fn resolve_model(name: &str) -> ModelSpec {
    if let Some(stripped) = name.strip_prefix("vertex-") {
        return ModelSpec {
            provider: Provider::VertexAi,
            model: stripped.to_string(),
        };
    }
    if name.starts_with("claude") {
        return ModelSpec {
            provider: Provider::Claude,
            model: name.to_string(),
        };
    }
    if OPENAI_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return ModelSpec {
            provider: Provider::Openai,
            model: name.to_string(),
        };
    }
    if name.starts_with("gemini") {
        return ModelSpec {
            provider: Provider::Gemini,
            model: name.to_string(),
        };
    }
    warn!(model = %name, "unrecognized model name, routing to gemini");
    ModelSpec {
        provider: Provider::Gemini,
        model: name.to_string(),
    }
}
