//! Static per-provider request budgets
//!
//! Configuration only: the table records each vendor's request budget, but no
//! admission check consumes it here. Enforcement is an extension point; the
//! outbound clients own their retry behavior.

use std::collections::HashMap;

use crate::llm::provider::ProviderKind;

/// Request budget for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
}

/// Immutable table of provider budgets. Each constructed instance owns its
/// own value-equal copy of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiter {
    configs: HashMap<ProviderKind, RateLimitConfig>,
}

impl RateLimiter {
    pub fn new() -> Self {
        let mut configs = HashMap::new();
        configs.insert(
            ProviderKind::OpenAi,
            RateLimitConfig {
                max_requests: 60,
                window_ms: 60_000,
            },
        );
        configs.insert(
            ProviderKind::Claude,
            RateLimitConfig {
                max_requests: 50,
                window_ms: 60_000,
            },
        );
        Self { configs }
    }

    /// Budget for one provider.
    pub fn config(&self, provider: ProviderKind) -> Option<RateLimitConfig> {
        self.configs.get(&provider).copied()
    }

    /// All budgets in stable key order, for display.
    pub fn configs(&self) -> Vec<(ProviderKind, RateLimitConfig)> {
        let mut entries: Vec<_> = self.configs.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by_key(|(kind, _)| kind.key());
        entries
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
