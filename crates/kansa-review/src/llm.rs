use std::future::Future;
use std::time::Duration;

use kansa_core::{KansaError, LlmConfig};
use serde::{Deserialize, Serialize};

/// A prompt-in, text-out completion service.
///
/// The review pipeline only talks to this trait, so tests can substitute a
/// canned implementation for the HTTP client.
pub trait Completion {
    /// Model identifier reported in review statistics.
    fn model(&self) -> &str;

    /// Send `prompt` as a single user message and return the generated text.
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, KansaError>> + Send;
}

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use kansa_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Review this code".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation. Prompts are always sent as a single
/// user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input.
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Anthropic,
    OpenAi,
}

impl Provider {
    fn parse(name: &str) -> Result<Self, KansaError> {
        match name {
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            other => Err(KansaError::Config(format!(
                "unsupported llm.provider '{other}'; expected anthropic or openai"
            ))),
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::OpenAi => "https://api.openai.com",
        }
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

/// HTTP completion client for the Anthropic Messages API or any
/// OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// One request per call: no retries, no streaming.
///
/// # Examples
///
/// ```
/// use kansa_core::LlmConfig;
/// use kansa_review::llm::{Completion, LlmClient};
///
/// let client = LlmClient::new(&LlmConfig::default()).unwrap();
/// assert_eq!(client.model(), "claude-sonnet-4-20250514");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    provider: Provider,
    config: LlmConfig,
    api_key: Option<String>,
}

impl LlmClient {
    /// Create a new client from configuration.
    ///
    /// The API key is taken from the config or, failing that, from the
    /// provider's environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`KansaError::Config`] for an unknown provider and
    /// [`KansaError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, KansaError> {
        let provider = Provider::parse(&config.provider)?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| KansaError::Llm(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            provider,
            config: config.clone(),
            api_key: config.resolved_api_key(),
        })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(self.provider.default_base_url())
            .trim_end_matches('/')
    }

    async fn post(
        &self,
        request: reqwest::RequestBuilder,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, KansaError> {
        let response = request
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| KansaError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(KansaError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| KansaError::Llm(format!("failed to parse response: {e}")))
    }

    async fn complete_anthropic(&self, prompt: &str) -> Result<String, KansaError> {
        let url = format!("{}/v1/messages", self.base_url());
        let messages = vec![ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        }];
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": messages,
        });

        let mut request = self
            .client
            .post(&url)
            .header("anthropic-version", "2023-06-01");
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key);
        }

        let value = self.post(request, body).await?;
        let parsed: AnthropicResponse = serde_json::from_value(value.clone())
            .map_err(|_| KansaError::Llm(format!("unexpected response structure: {value}")))?;

        // No text blocks is an empty answer, not a failure.
        let text: Vec<String> = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        Ok(text.join("\n"))
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String, KansaError> {
        let url = format!("{}/v1/chat/completions", self.base_url());
        let messages = vec![ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        }];
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": messages,
        });

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let value = self.post(request, body).await?;
        let content = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| KansaError::Llm(format!("unexpected response structure: {value}")))?;

        Ok(content.to_string())
    }
}

impl Completion for LlmClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, KansaError> {
        match self.provider {
            Provider::Anthropic => self.complete_anthropic(prompt).await,
            Provider::OpenAi => self.complete_openai(prompt).await,
        }
    }
}
