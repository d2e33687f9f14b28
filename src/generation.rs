//! Generation gateway: role-tagged chat messages in, free text out.
//!
//! [`ChatModel`] is the seam the pipeline depends on; [`OpenAIChat`] speaks
//! the OpenAI chat completions protocol, which also covers OpenRouter, Groq,
//! and Ollama's `/v1` compatibility endpoint. No streaming, no retries.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, GenerationConfig};
use crate::error::{service_label, status_error, RagError, RagResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A remote text generation service.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Complete a conversation. `temperature` trades creativity for
    /// determinism (lower is more deterministic).
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> RagResult<String>;
}

/// OpenAI-compatible chat completions backend.
pub struct OpenAIChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    service: String,
}

impl OpenAIChat {
    /// Build a client for `generation.base_url`.
    ///
    /// The key may only be omitted for self-hosted endpoints; talking to
    /// `api.openai.com` without one is a configuration error.
    pub fn new(config: &GenerationConfig, api_key: Option<String>) -> RagResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if api_key.is_none() && base_url.contains("api.openai.com") {
            return Err(RagError::Configuration(
                "an API key is required for the OpenAI generation endpoint".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            service: service_label(&base_url),
            base_url,
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> RagResult<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        tracing::debug!(model = %self.model, messages = messages.len(), "chat completion");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(status_error(&self.service, status, &body_text));
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

/// The configured generation backend, keyed with `api_key_env` when set.
pub fn create_chat_model(config: &Config) -> RagResult<Arc<dyn ChatModel>> {
    Ok(Arc::new(OpenAIChat::new(&config.generation, config.api_key())?))
}

/// Extract `choices[0].message.content` from a chat completions response.
pub fn parse_chat_response(json: &serde_json::Value) -> RagResult<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| RagError::permanent("Invalid chat response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_serialize_with_lowercase_roles() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let json = serde_json::to_value(&messages).unwrap();
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[1]["content"], "hi");
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Founded in 2010." } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Founded in 2010.");
    }

    #[test]
    fn test_parse_chat_response_without_choices() {
        let err = parse_chat_response(&serde_json::json!({ "choices": [] })).unwrap_err();
        assert!(err.is_gateway());
    }

    #[test]
    fn test_openai_endpoint_requires_key() {
        let config = GenerationConfig::default();
        assert!(matches!(
            OpenAIChat::new(&config, None),
            Err(RagError::Configuration(_))
        ));
        assert!(OpenAIChat::new(&config, Some("sk-test".to_string())).is_ok());
    }

    #[test]
    fn test_self_hosted_endpoint_without_key() {
        let config = GenerationConfig {
            base_url: "http://localhost:11434/v1".to_string(),
            ..GenerationConfig::default()
        };
        assert!(OpenAIChat::new(&config, None).is_ok());
    }
}
