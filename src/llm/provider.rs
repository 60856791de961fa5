//! Provider selection and client caching
//!
//! Maps externally-supplied vendor keys onto the known provider set and hands
//! out one shared client per vendor, constructed on first use.

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::llm::client::LlmClient;
use crate::llm::config::LlmConfig;
use crate::llm::ratelimit::RateLimiter;

/// The known LLM vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Claude,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Claude];

    /// Resolve an externally-supplied key. Exact match only: keys are
    /// case-sensitive, so `"OpenAI"` is unknown.
    pub fn from_key(key: &str) -> Result<Self, UnknownProviderError> {
        match key {
            "openai" => Ok(ProviderKind::OpenAi),
            "claude" => Ok(ProviderKind::Claude),
            _ => Err(UnknownProviderError {
                key: key.to_string(),
            }),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
        }
    }

    pub fn api_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Claude => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4",
            ProviderKind::Claude => "claude-3-5-sonnet-20241022",
        }
    }

    /// Environment variable consulted when the config has no API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Raised for provider keys outside the known set. The message embeds the
/// offending key verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProviderError {
    pub key: String,
}

impl fmt::Display for UnknownProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown LLM provider: {}", self.key)
    }
}

impl std::error::Error for UnknownProviderError {}

/// Lazily constructs and caches one client per vendor.
///
/// The first `get_provider` call for a vendor builds its client from the
/// held config (API key, model and base-url overrides); later calls return
/// the same shared instance. The factory also owns the static rate-limit
/// table so callers can display provider budgets alongside clients.
pub struct ProviderFactory {
    config: LlmConfig,
    rate_limiter: RateLimiter,
    clients: HashMap<ProviderKind, Arc<LlmClient>>,
}

impl ProviderFactory {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            rate_limiter: RateLimiter::new(),
            clients: HashMap::new(),
        }
    }

    /// Shared client for `key`.
    pub fn get_provider(&mut self, key: &str) -> Result<Arc<LlmClient>> {
        let kind = ProviderKind::from_key(key)?;

        if let Some(client) = self.clients.get(&kind) {
            return Ok(Arc::clone(client));
        }

        let api_key = self.config.get_api_key_with_fallback(kind).ok_or_else(|| {
            anyhow!(
                "No API key configured for {}. Run `shadowpilot config set-key {} <key>` or set {}.",
                kind,
                kind.key(),
                kind.env_var()
            )
        })?;

        let mut client = LlmClient::new(kind, api_key)?;
        if let Some(model) = self.config.get_model(kind) {
            client = client.with_model(model.to_string());
        }
        if let Some(base_url) = self.config.get_base_url(kind) {
            client = client.with_base_url(base_url.to_string());
        }

        let client = Arc::new(client);
        self.clients.insert(kind, Arc::clone(&client));
        Ok(client)
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory_with_keys() -> ProviderFactory {
        let mut config = LlmConfig::default();
        config.set_api_key(ProviderKind::OpenAi, "openai-test-key".to_string());
        config.set_api_key(ProviderKind::Claude, "claude-test-key".to_string());
        ProviderFactory::new(config)
    }

    #[test]
    fn test_exact_keys_resolve() {
        assert_eq!(ProviderKind::from_key("openai").unwrap(), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_key("claude").unwrap(), ProviderKind::Claude);
    }

    #[test]
    fn test_case_variants_are_unknown() {
        let error = ProviderKind::from_key("OpenAI").unwrap_err();
        assert_eq!(error.key, "OpenAI");
        assert!(error.to_string().contains("OpenAI"));

        assert!(ProviderKind::from_key("Claude").is_err());
        assert!(ProviderKind::from_key("CLAUDE").is_err());
    }

    #[test]
    fn test_empty_and_foreign_keys_are_unknown() {
        let error = ProviderKind::from_key("").unwrap_err();
        assert_eq!(error.key, "");

        let error = ProviderKind::from_key("gemini").unwrap_err();
        assert!(error.to_string().contains("gemini"));
    }

    #[test]
    fn test_repeated_lookup_returns_identical_instance() {
        let mut factory = factory_with_keys();
        let first = factory.get_provider("openai").unwrap();
        let second = factory.get_provider("openai").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_distinct_vendors_get_distinct_instances() {
        let mut factory = factory_with_keys();
        let openai = factory.get_provider("openai").unwrap();
        let claude = factory.get_provider("claude").unwrap();
        assert!(!Arc::ptr_eq(&openai, &claude));
        assert_eq!(openai.kind(), ProviderKind::OpenAi);
        assert_eq!(claude.kind(), ProviderKind::Claude);
    }

    #[test]
    fn test_unknown_key_error_carries_the_key() {
        let mut factory = factory_with_keys();
        let error = factory.get_provider("OpenAI").unwrap_err();
        assert!(error.to_string().contains("OpenAI"));
    }

    #[test]
    fn test_config_overrides_apply_on_first_construction() {
        let mut config = LlmConfig::default();
        config.set_api_key(ProviderKind::Claude, "key".to_string());
        config.set_model(ProviderKind::Claude, "claude-3-haiku-20240307".to_string());
        let mut factory = ProviderFactory::new(config);

        let client = factory.get_provider("claude").unwrap();
        assert_eq!(client.model(), "claude-3-haiku-20240307");
    }

    #[test]
    fn test_missing_api_key_is_a_configuration_error() {
        let mut factory = ProviderFactory::new(LlmConfig::default());
        // Neither the config nor the environment carries a key for a vendor
        // nobody sets in CI.
        if std::env::var("OPENAI_API_KEY").is_err() {
            let error = factory.get_provider("openai").unwrap_err();
            assert!(error.to_string().contains("No API key"));
        }
    }

    #[test]
    fn test_rate_limiter_is_exposed() {
        let factory = factory_with_keys();
        assert!(
            factory
                .rate_limiter()
                .config(ProviderKind::OpenAi)
                .is_some()
        );
    }
}
