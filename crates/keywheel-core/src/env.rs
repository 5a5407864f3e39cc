use std::collections::HashMap;

use keywheel_common::Provider;

use crate::credential::ResolvedCredential;

/// Process-wide fallback keys, one per provider, read from the environment
/// once at startup. Injectable so tests never touch real process state.
#[derive(Debug, Clone, Default)]
pub struct EnvKeys {
    keys: HashMap<Provider, String>,
}

impl EnvKeys {
    pub fn from_env() -> Self {
        let mut keys = HashMap::new();
        for provider in Provider::ALL {
            if let Some(var) = provider.env_var()
                && let Ok(value) = std::env::var(var)
            {
                let value = value.trim();
                if !value.is_empty() {
                    keys.insert(provider, value.to_string());
                }
            }
        }
        Self { keys }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider: Provider, secret: impl Into<String>) -> Self {
        self.keys.insert(provider, secret.into());
        self
    }

    pub fn get(&self, provider: Provider) -> Option<&str> {
        self.keys.get(&provider).map(String::as_str)
    }

    pub fn resolve(&self, provider: Provider) -> Option<ResolvedCredential> {
        self.get(provider).map(ResolvedCredential::from_environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialSource;

    #[test]
    fn resolve_tags_the_source_as_environment() {
        let env = EnvKeys::empty().with_key(Provider::Gemini, "free-key");
        let resolved = env.resolve(Provider::Gemini).expect("key present");
        assert_eq!(resolved.secret, "free-key");
        assert_eq!(resolved.source, CredentialSource::Environment);
        assert!(resolved.vertex.is_none());
    }

    #[test]
    fn missing_provider_resolves_to_none() {
        let env = EnvKeys::empty();
        assert!(env.resolve(Provider::Openai).is_none());
    }
}
