//! Outbound LLM clients
//!
//! One reqwest-backed client per vendor. Failures are classified into
//! [`LlmError`] values and retried here, at the provider boundary; callers
//! above this layer never retry. The client also implements the planning
//! strategy: prompt in, parsed plan out.

use anyhow::{Result, anyhow};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::llm::error_handler::{ErrorHandler, LlmError, RetryConfig};
use crate::llm::prompt::PLANNING_SYSTEM_PROMPT;
use crate::llm::provider::ProviderKind;
use crate::planning::plan::TestPlan;
use crate::planning::service::TestStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug)]
pub struct LlmClient {
    kind: ProviderKind,
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
    error_handler: Mutex<ErrorHandler>,
}

impl LlmClient {
    pub fn new(kind: ProviderKind, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("API key cannot be empty"));
        }

        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        let retry_config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        };

        Ok(Self {
            kind,
            api_key,
            client,
            model: kind.default_model().to_string(),
            base_url: kind.api_base_url().to_string(),
            error_handler: Mutex::new(ErrorHandler::new(kind.key(), retry_config)),
        })
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one generation request, retrying transient failures.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let operation = || async {
            match self.kind {
                ProviderKind::Claude => self.generate_claude(request).await,
                ProviderKind::OpenAi => self.generate_openai(request).await,
            }
        };

        let mut handler = self.error_handler.lock().await;
        handler
            .execute_with_retry(operation)
            .await
            .map_err(|e| anyhow!("LLM request failed: {}", e))
    }

    async fn generate_claude(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/messages", self.base_url);

        let mut payload = json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(1000),
            "temperature": request.temperature.unwrap_or(0.7),
            "messages": [{
                "role": "user",
                "content": request.prompt
            }]
        });
        // The system prompt is a top-level parameter for Claude
        if let Some(system) = &request.system_prompt {
            payload["system"] = json!(system);
        }

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_error(status, body));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| self.parse_error(format!("invalid JSON body: {}", e)))?;

        let content = response_json["content"][0]["text"]
            .as_str()
            .ok_or_else(|| self.parse_error("missing content[0].text in response".to_string()))?
            .to_string();

        let usage = response_json.get("usage").map(|usage_data| {
            let prompt_tokens = usage_data["input_tokens"].as_u64().unwrap_or(0) as u32;
            let completion_tokens = usage_data["output_tokens"].as_u64().unwrap_or(0) as u32;
            Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }
        });

        Ok(LlmResponse {
            content,
            usage,
            model: self.model.clone(),
            provider: self.kind.key().to_string(),
        })
    }

    async fn generate_openai(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(json!({
                "role": "system",
                "content": system
            }));
        }
        messages.push(json!({
            "role": "user",
            "content": request.prompt
        }));

        let payload = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(1000),
            "temperature": request.temperature.unwrap_or(0.7)
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_error(status, body));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| self.parse_error(format!("invalid JSON body: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                self.parse_error("missing choices[0].message.content in response".to_string())
            })?
            .to_string();

        let usage = response_json.get("usage").map(|usage_data| Usage {
            prompt_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: usage_data["total_tokens"].as_u64().unwrap_or(0) as u32,
        });

        Ok(LlmResponse {
            content,
            usage,
            model: self.model.clone(),
            provider: self.kind.key().to_string(),
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> LlmError {
        LlmError::NetworkError {
            provider: self.kind.key().to_string(),
            error: error.to_string(),
            retryable: !error.is_builder(),
        }
    }

    fn status_error(&self, status: StatusCode, body: String) -> LlmError {
        let provider = self.kind.key().to_string();
        match status {
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
                provider,
                message: body,
                retry_after: Some(Duration::from_secs(60)),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthenticationError {
                provider,
                message: body,
            },
            status if status.is_server_error() => LlmError::ServiceUnavailable {
                provider,
                retry_after: Some(Duration::from_secs(30)),
            },
            _ => LlmError::ApiError {
                provider,
                message: format!("{}: {}", status, body),
            },
        }
    }

    fn parse_error(&self, message: String) -> LlmError {
        LlmError::ParseError {
            provider: self.kind.key().to_string(),
            message,
        }
    }

    /// Cheap round trip to verify credentials and connectivity.
    pub async fn test_connection(&self) -> Result<()> {
        let request = LlmRequest {
            prompt: "Hello, this is a connectivity check. Please respond with 'OK'.".to_string(),
            max_tokens: Some(10),
            temperature: Some(0.1),
            system_prompt: None,
        };

        let response = self.generate(&request).await?;
        if response.content.trim().is_empty() {
            return Err(anyhow!("Empty response from LLM provider"));
        }
        Ok(())
    }
}

impl TestStrategy for LlmClient {
    /// Run the planning prompt and decode the JSON plan from the response
    /// text.
    async fn generate_test_strategy(&self, prompt: &str) -> Result<TestPlan> {
        let request = LlmRequest {
            prompt: prompt.to_string(),
            max_tokens: Some(4000),
            temperature: Some(0.2),
            system_prompt: Some(PLANNING_SYSTEM_PROMPT.to_string()),
        };

        let response = self.generate(&request).await?;
        let json_text = extract_json_object(&response.content)
            .map_err(|e| anyhow!("{} returned no JSON plan: {}", self.kind, e))?;
        let plan: TestPlan = serde_json::from_str(json_text)
            .map_err(|e| anyhow!("{} returned an invalid plan: {}", self.kind, e))?;
        Ok(plan)
    }
}

/// Pull the first JSON object out of a model response, tolerating prose or
/// code fences around it.
fn extract_json_object(content: &str) -> Result<&str> {
    if serde_json::from_str::<Value>(content).is_ok() {
        return Ok(content);
    }

    let start = content
        .find('{')
        .ok_or_else(|| anyhow!("response contains no JSON object"))?;
    let end = content
        .rfind('}')
        .ok_or_else(|| anyhow!("response contains no JSON object end"))?;
    if end < start {
        return Err(anyhow!("response contains no JSON object"));
    }

    Ok(&content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(ProviderKind::Claude, "test-key".to_string()).unwrap();
        assert_eq!(client.kind(), ProviderKind::Claude);
        assert_eq!(client.model(), ProviderKind::Claude.default_model());
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        assert!(LlmClient::new(ProviderKind::OpenAi, "".to_string()).is_err());
        assert!(LlmClient::new(ProviderKind::OpenAi, "   ".to_string()).is_err());
    }

    #[test]
    fn test_model_and_base_url_overrides() {
        let client = LlmClient::new(ProviderKind::Claude, "test-key".to_string())
            .unwrap()
            .with_model("claude-3-opus-20240229".to_string())
            .with_base_url("http://localhost:8080/v1".to_string());

        assert_eq!(client.model(), "claude-3-opus-20240229");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_status_classification() {
        let client = LlmClient::new(ProviderKind::OpenAi, "test-key".to_string()).unwrap();

        assert!(matches!(
            client.status_error(StatusCode::TOO_MANY_REQUESTS, "slow down".to_string()),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            client.status_error(StatusCode::UNAUTHORIZED, "bad key".to_string()),
            LlmError::AuthenticationError { .. }
        ));
        assert!(matches!(
            client.status_error(StatusCode::BAD_GATEWAY, "".to_string()),
            LlmError::ServiceUnavailable { .. }
        ));
        assert!(matches!(
            client.status_error(StatusCode::BAD_REQUEST, "oops".to_string()),
            LlmError::ApiError { .. }
        ));
    }

    #[test]
    fn test_extract_plain_json() {
        let content = r#"{"total_functions": 1}"#;
        assert_eq!(extract_json_object(content).unwrap(), content);
    }

    #[test]
    fn test_extract_fenced_json() {
        let content = "```json\n{\"total_functions\": 1}\n```";
        assert_eq!(
            extract_json_object(content).unwrap(),
            "{\"total_functions\": 1}"
        );
    }

    #[test]
    fn test_extract_json_wrapped_in_prose() {
        let content = "Here is the plan you asked for:\n{\"a\": {\"b\": 2}}\nLet me know!";
        assert_eq!(extract_json_object(content).unwrap(), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_extract_rejects_json_free_text() {
        assert!(extract_json_object("no plan here").is_err());
        assert!(extract_json_object("} backwards {").is_err());
    }

    #[test]
    fn test_request_serialization_round_trip() {
        let request = LlmRequest {
            prompt: "Test prompt".to_string(),
            max_tokens: Some(1000),
            temperature: Some(0.7),
            system_prompt: Some("System prompt".to_string()),
        };

        let json = serde_json::to_string(&request).unwrap();
        let deserialized: LlmRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.prompt, deserialized.prompt);
        assert_eq!(request.max_tokens, deserialized.max_tokens);
    }
}
