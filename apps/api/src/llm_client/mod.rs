/// LLM Client — the single point of entry for all completion-service calls.
///
/// Talks to an OpenAI-compatible chat-completions endpoint (Groq by default).
/// No other module may issue completion requests directly; handlers receive a
/// `CompletionProvider` through `AppState`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key for the completion service")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("No response from the completion service")]
    EmptyContent,
}

impl LlmError {
    /// Transport failures, 429 and 5xx are worth another attempt.
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(_) | LlmError::Timeout(_) => true,
            LlmError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }

    /// True when the failure points at the credential rather than the service.
    pub fn is_credential_error(&self) -> bool {
        match self {
            LlmError::MissingApiKey => true,
            LlmError::Api { status, message } => {
                *status == StatusCode::UNAUTHORIZED.as_u16()
                    || message.to_lowercase().contains("api key")
            }
            _ => false,
        }
    }
}

/// Anything that can turn a single-turn prompt into one completion.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    n: u8,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Text of the first choice, if it carries any non-blank content.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Chat-completions client built once at startup and shared by every request.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(config.llm_timeout).build()?,
            api_key: config.groq_api_key.clone(),
            base_url: config.llm_base_url.clone(),
            model: config.llm_model.clone(),
            timeout: config.llm_timeout,
            max_retries: config.llm_max_retries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Makes a raw chat-completions call requesting exactly one choice.
    /// Retries on 429, 5xx and transport errors only when `max_retries > 0`;
    /// a 429 on the final attempt becomes `LlmError::RateLimited`.
    pub async fn call(&self, prompt: &str) -> Result<ChatResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            n: 1,
            max_tokens: MAX_TOKENS,
        };
        let url = format!("{}/chat/completions", self.base_url);

        let mut attempt = 0;
        loop {
            let err = match self.send_once(&url, api_key, &request_body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            if attempt == self.max_retries {
                return Err(match err {
                    LlmError::Api { status: 429, .. } => {
                        LlmError::RateLimited { retries: attempt }
                    }
                    other => other,
                });
            }

            attempt += 1;
            // Exponential backoff: 1s, 2s, 4s, ...
            let delay = Duration::from_millis(1000 * (1 << (attempt - 1).min(5)));
            warn!(
                "LLM call attempt {} failed ({}), retrying after {}ms...",
                attempt,
                err,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(
        &self,
        url: &str,
        api_key: &str,
        request_body: &ChatRequest<'_>,
    ) -> Result<ChatResponse, LlmError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(request_body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!("LLM API returned {}: {}", status, body);
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_message(body),
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let chat_response: ChatResponse = serde_json::from_str(&body)?;

        if let Some(usage) = &chat_response.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(chat_response)
    }

    /// Timeouts during send or body read both surface as `LlmError::Timeout`.
    fn transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Http(e)
        }
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self.call(prompt).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

/// Pulls `error.message` out of a provider error envelope, else returns the raw body.
fn error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, api_key: Option<&str>, max_retries: u32) -> LlmClient {
        let config = Config {
            groq_api_key: api_key.map(String::from),
            llm_base_url: server.uri(),
            llm_model: "test-model".to_string(),
            llm_timeout: Duration::from_secs(2),
            llm_max_retries: max_retries,
            max_upload_bytes: 1024,
            port: 0,
            rust_log: "debug".to_string(),
        };
        LlmClient::new(&config).unwrap()
    }

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-123",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
    }

    #[tokio::test]
    async fn test_complete_sends_single_turn_prompt_and_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer gsk_test"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "n": 1,
                "messages": [{"role": "user", "content": "write an email"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hello")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("gsk_test"), 0);
        let text = client.complete("write an email").await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hello")))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, None, 0);
        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
        assert!(err.is_credential_error());
    }

    #[tokio::test]
    async fn test_empty_choices_is_no_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"), 0);
        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[tokio::test]
    async fn test_unauthorized_is_a_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API Key", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("bad"), 0);
        let err = client.complete("prompt").await.unwrap_err();
        match &err {
            LlmError::Api { status, message } => {
                assert_eq!(*status, 401);
                assert_eq!(message, "Invalid API Key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_credential_error());
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"), 0);
        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 503, .. }));
        assert!(!err.is_credential_error());
    }

    #[tokio::test]
    async fn test_rate_limit_without_retries_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"), 0);
        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { retries: 0 }));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"), 1);
        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { retries: 1 }));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"), 3);
        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"), 0);
        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        assert_eq!(error_message("plain failure".to_string()), "plain failure");
        assert_eq!(
            error_message(r#"{"error":{"message":"quota exceeded"}}"#.to_string()),
            "quota exceeded"
        );
    }
}
