pub mod client;
pub mod config;
pub mod error_handler;
pub mod prompt;
pub mod provider;
pub mod ratelimit;


pub use client::{LlmClient, LlmRequest, LlmResponse, Usage};
pub use config::{LlmConfig, ProviderConfig};
pub use error_handler::{ErrorHandler, LlmError, RetryConfig};
pub use provider::{ProviderFactory, ProviderKind, UnknownProviderError};
pub use ratelimit::{RateLimitConfig, RateLimiter};
