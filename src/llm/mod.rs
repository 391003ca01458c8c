//! Completion client for the hosted LLM API.
//!
//! The [`CompletionClient`] trait is the seam the dispatcher talks
//! through; [`GroqClient`] is the production implementation.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::{COMPLETION_MAX_TOKENS, COMPLETION_TEMPERATURE, COMPLETION_TIMEOUT_SECS};

/// Errors from the completion API boundary.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("JSON error: {0}")]
    Json(String),
}

/// One entry of a conversation history.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A request/response exchange with the language-model service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Completes `user_text` given a system preamble and a bounded
    /// history window.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_text: &str,
    ) -> Result<String, CompletionError>;
}

/// Completion client for the Groq OpenAI-compatible chat API.
pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

impl GroqClient {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: http::create_http_client(COMPLETION_TIMEOUT_SECS),
            api_key,
            model,
        }
    }

    fn prepare_messages(
        system_prompt: &str,
        history: &[ChatMessage],
        user_text: &str,
    ) -> Vec<serde_json::Value> {
        let mut messages = vec![json!({
            "role": "system",
            "content": system_prompt
        })];

        for msg in history {
            messages.push(json!({
                "role": msg.role,
                "content": msg.content
            }));
        }

        messages.push(json!({
            "role": "user",
            "content": user_text
        }));

        messages
    }
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_text: &str,
    ) -> Result<String, CompletionError> {
        let messages = Self::prepare_messages(system_prompt, history, user_text);
        debug!("Sending completion request with {} messages", messages.len());

        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": COMPLETION_MAX_TOKENS,
            "temperature": COMPLETION_TEMPERATURE,
        });

        let auth = format!("Bearer {}", self.api_key);
        let response =
            http::send_json_request(&self.client, GROQ_CHAT_URL, &body, &auth).await?;

        http::extract_text_content(&response, &["choices", "0", "message", "content"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_messages_ordering() {
        let history = vec![ChatMessage::user("earlier"), ChatMessage::assistant("reply")];
        let messages = GroqClient::prepare_messages("preamble", &history, "now");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "preamble");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "now");
    }

    #[test]
    fn test_chat_message_constructors() {
        assert_eq!(ChatMessage::user("x").role, "user");
        assert_eq!(ChatMessage::assistant("y").role, "assistant");
    }
}
