use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Classified failures from the outbound LLM boundary.
#[derive(Debug, Clone)]
pub enum LlmError {
    RateLimited {
        provider: String,
        message: String,
        retry_after: Option<Duration>,
    },
    NetworkError {
        provider: String,
        error: String,
        retryable: bool,
    },
    ApiError {
        provider: String,
        message: String,
    },
    ParseError {
        provider: String,
        message: String,
    },
    AuthenticationError {
        provider: String,
        message: String,
    },
    ServiceUnavailable {
        provider: String,
        retry_after: Option<Duration>,
    },
    CircuitBreakerOpen {
        provider: String,
        reset_time: Duration,
    },
    MaxRetriesExceeded {
        provider: String,
        attempts: u32,
        last_error: String,
    },
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::RateLimited {
                provider,
                message,
                retry_after,
            } => {
                write!(
                    f,
                    "Rate limited by {}: {}. Retry after: {:?}",
                    provider, message, retry_after
                )
            }
            LlmError::NetworkError {
                provider,
                error,
                retryable,
            } => {
                write!(
                    f,
                    "Network error with {} (retryable: {}): {}",
                    provider, retryable, error
                )
            }
            LlmError::ApiError { provider, message } => {
                write!(f, "API error from {}: {}", provider, message)
            }
            LlmError::ParseError { provider, message } => {
                write!(f, "Parse error from {}: {}", provider, message)
            }
            LlmError::AuthenticationError { provider, message } => {
                write!(f, "Authentication error with {}: {}", provider, message)
            }
            LlmError::ServiceUnavailable {
                provider,
                retry_after,
            } => {
                write!(
                    f,
                    "Service unavailable for {}. Retry after: {:?}",
                    provider, retry_after
                )
            }
            LlmError::CircuitBreakerOpen {
                provider,
                reset_time,
            } => {
                write!(
                    f,
                    "Circuit breaker open for {}. Reset in: {:?}",
                    provider, reset_time
                )
            }
            LlmError::MaxRetriesExceeded {
                provider,
                attempts,
                last_error,
            } => {
                write!(
                    f,
                    "Max retries ({}) exceeded for {}: {}",
                    attempts, provider, last_error
                )
            }
        }
    }
}

impl std::error::Error for LlmError {}

#[derive(Debug)]
struct CircuitBreakerState {
    failure_count: u32,
    reset_time: std::time::Instant,
}

impl CircuitBreakerState {
    fn is_open(&self) -> bool {
        self.failure_count >= 5 && std::time::Instant::now() < self.reset_time
    }
}

/// Retry loop for one provider's outbound calls.
#[derive(Debug)]
pub struct ErrorHandler {
    provider: String,
    config: RetryConfig,
    circuit_breaker: Option<CircuitBreakerState>,
}

impl ErrorHandler {
    pub fn new(provider: impl Into<String>, config: RetryConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            circuit_breaker: None,
        }
    }

    /// Execute an operation, retrying transient failures with exponential
    /// backoff. Rate-limit responses wait out their advertised delay instead
    /// of the backoff schedule.
    pub async fn execute_with_retry<F, Fut, T>(&mut self, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts <= self.config.max_retries {
            if let Some(state) = &self.circuit_breaker {
                if state.is_open() {
                    return Err(LlmError::CircuitBreakerOpen {
                        provider: self.provider.clone(),
                        reset_time: state
                            .reset_time
                            .saturating_duration_since(std::time::Instant::now()),
                    });
                }
            }

            match operation().await {
                Ok(result) => {
                    // Reset circuit breaker on success
                    self.circuit_breaker = None;
                    return Ok(result);
                }
                Err(error) => {
                    attempts += 1;
                    last_error = Some(error.clone());

                    if let LlmError::RateLimited {
                        retry_after: Some(delay),
                        ..
                    } = &error
                    {
                        sleep(*delay).await;
                        continue;
                    }

                    if !self.is_retryable(&error) || attempts > self.config.max_retries {
                        if matches!(error, LlmError::ServiceUnavailable { .. }) {
                            self.circuit_breaker = Some(CircuitBreakerState {
                                failure_count: 1,
                                reset_time: std::time::Instant::now() + Duration::from_secs(60),
                            });
                        }
                        break;
                    }

                    let delay = self.calculate_delay(attempts);
                    sleep(delay).await;
                }
            }
        }

        Err(LlmError::MaxRetriesExceeded {
            provider: self.provider.clone(),
            attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    fn is_retryable(&self, error: &LlmError) -> bool {
        match error {
            LlmError::RateLimited { .. } => true,
            LlmError::NetworkError { retryable, .. } => *retryable,
            LlmError::ServiceUnavailable { .. } => true,
            LlmError::ApiError { .. } => false,
            LlmError::ParseError { .. } => false,
            LlmError::AuthenticationError { .. } => false,
            LlmError::CircuitBreakerOpen { .. } => false,
            LlmError::MaxRetriesExceeded { .. } => false,
        }
    }

    /// Exponential backoff, optionally with ±25% jitter.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.config.base_delay.as_millis() as f64;
        let delay_ms = base_delay_ms * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let final_delay_ms = if self.config.jitter {
            let jitter = rand::thread_rng().gen_range(-0.25..=0.25);
            delay_ms * (1.0 + jitter)
        } else {
            delay_ms
        };

        let delay = Duration::from_millis(final_delay_ms as u64);
        std::cmp::min(delay, self.config.max_delay)
    }
}
