use std::time::Duration;

use async_trait::async_trait;
use recibo_core::ModelSettings;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Could not reach model server: {0}")]
    Connect(String),
    #[error("Model call timed out")]
    Timeout,
    #[error("Model '{0}' not found on the server — pull it first")]
    ModelNotFound(String),
    #[error("Model server returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Malformed model response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Connection and timeout failures are worth retrying; a missing model
    /// or an API rejection will not fix itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Connect(_) | LlmError::Timeout)
    }
}

/// Abstraction over the chat-style LLM boundary: one user message in, the
/// model's free-form text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Ollama chat client. Non-streaming, single user-role message, low
/// temperature to bias toward schema-compliant output.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OllamaClient {
    pub fn new(settings: &ModelSettings) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connect(e.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_retries: settings.max_retries,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        })
    }

    async fn send_once(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "stream": false,
                "options": { "temperature": self.temperature },
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Connect(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotFound(self.model.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        payload
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("missing message.content".into()))
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat(&self, prompt: &str) -> Result<String, LlmError> {
        retry_transient(self.max_retries, self.retry_backoff, || self.send_once(prompt)).await
    }
}

/// Run `op`, retrying transient failures up to `max_retries` times with a
/// linearly growing backoff. Fatal errors return on the first attempt.
async fn retry_transient<F, Fut>(
    max_retries: u32,
    backoff: Duration,
    mut op: F,
) -> Result<String, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String, LlmError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(content) => return Ok(content),
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let delay = backoff * attempt;
                tracing::warn!(
                    "Transient model error ({e}); retry {attempt}/{max_retries} after {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

// ── Mock model (used for tests) ───────────────────────────────────────────────

/// Returns a pre-set reply and counts invocations — lets pipeline tests
/// assert that short-circuit paths never reach the model. The counter is
/// shared so callers can keep a handle after moving the mock in.
pub struct MockChat {
    reply: Result<String, &'static str>,
    calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl MockChat {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            calls: Default::default(),
        }
    }

    pub fn failing(message: &'static str) -> Self {
        Self {
            reply: Err(message),
            calls: Default::default(),
        }
    }

    pub fn call_counter(&self) -> std::sync::Arc<std::sync::atomic::AtomicUsize> {
        self.calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn chat(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.reply {
            Ok(s) => Ok(s.clone()),
            Err(msg) => Err(LlmError::Connect((*msg).to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::Connect("refused".into()).is_transient());
        assert!(LlmError::Timeout.is_transient());
        assert!(!LlmError::ModelNotFound("llama2:7b".into()).is_transient());
        assert!(!LlmError::Api { status: 500, body: String::new() }.is_transient());
        assert!(!LlmError::InvalidResponse("junk".into()).is_transient());
    }

    #[test]
    fn client_strips_trailing_slash_from_base_url() {
        let mut settings = ModelSettings::default();
        settings.base_url = "http://localhost:11434/".into();
        let client = OllamaClient::new(&settings).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let attempts = std::cell::Cell::new(0u32);
        let result = retry_transient(3, Duration::ZERO, || {
            let n = attempts.get();
            attempts.set(n + 1);
            async move {
                if n < 2 {
                    Err(LlmError::Connect("connection refused".into()))
                } else {
                    Ok("recovered".to_string())
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = std::cell::Cell::new(0u32);
        let result = retry_transient(2, Duration::ZERO, || {
            attempts.set(attempts.get() + 1);
            async { Err::<String, _>(LlmError::Timeout) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Timeout)));
        // Initial attempt plus two retries.
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn fatal_errors_return_without_retrying() {
        let attempts = std::cell::Cell::new(0u32);
        let result = retry_transient(5, Duration::ZERO, || {
            attempts.set(attempts.get() + 1);
            async { Err::<String, _>(LlmError::ModelNotFound("llama2:7b".into())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::ModelNotFound(_))));
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn mock_counts_calls() {
        let chat = MockChat::new("{}");
        assert_eq!(chat.call_count(), 0);
        chat.chat("hi").await.unwrap();
        chat.chat("hi").await.unwrap();
        assert_eq!(chat.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_failing_returns_connect_error() {
        let chat = MockChat::failing("connection refused");
        let err = chat.chat("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::Connect(_)));
    }
}
