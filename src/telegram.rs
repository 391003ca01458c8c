//! Telegram Bot API transport.
//!
//! [`Transport`] is the narrow contract the poller and dispatcher consume;
//! [`TelegramTransport`] implements it over the HTTP Bot API. Text sends
//! use HTML parse mode, voice and document sends use multipart uploads.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::{POLL_HTTP_TIMEOUT_SECS, TRANSPORT_TIMEOUT_SECS};

/// Errors from the messaging boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("File error: {0}")]
    File(String),
}

/// One inbound event from the messaging platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

/// The message payload of an update, when present.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub from: Option<Sender>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

/// Bot identity returned by the startup check.
#[derive(Debug, Clone, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

/// Standard Bot API response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, TransportError> {
    if !envelope.ok {
        return Err(TransportError::Api(
            envelope
                .description
                .unwrap_or_else(|| "request rejected".to_string()),
        ));
    }
    envelope
        .result
        .ok_or_else(|| TransportError::Api("missing result field".to_string()))
}

/// Delivers outbound payloads and fetches inbound updates.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Long-poll for updates with identifiers >= `offset`.
    async fn get_updates(&self, offset: i64, wait_secs: u64)
        -> Result<Vec<Update>, TransportError>;

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;

    async fn send_voice(&self, chat_id: i64, file: &Path) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        chat_id: i64,
        file: &Path,
        caption: &str,
    ) -> Result<(), TransportError>;

    /// One-time identity check, used at startup.
    async fn get_identity(&self) -> Result<BotIdentity, TransportError>;
}

/// Production transport over the Telegram Bot HTTP API.
pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramTransport {
    #[must_use]
    pub fn new(token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TRANSPORT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: format!("https://api.telegram.org/bot{token}"),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let status = response.status();
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Api(format!("{status}: {e}")))?;
        unwrap_envelope(envelope)
    }

    async fn read_file_part(
        file: &Path,
        part_name: &'static str,
    ) -> Result<reqwest::multipart::Part, TransportError> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| TransportError::File(format!("{}: {e}", file.display())))?;
        let file_name = file
            .file_name()
            .map_or_else(|| part_name.to_string(), |n| n.to_string_lossy().into_owned());
        Ok(reqwest::multipart::Part::bytes(bytes).file_name(file_name))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn get_updates(
        &self,
        offset: i64,
        wait_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let response = self
            .client
            .get(self.url("getUpdates"))
            .query(&[("offset", offset), ("timeout", wait_secs as i64)])
            // Client timeout must outlast the server-side wait
            .timeout(Duration::from_secs(POLL_HTTP_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let updates: Vec<Update> = Self::decode(response).await?;
        if !updates.is_empty() {
            debug!("Fetched {} update(s)", updates.len());
        }
        Ok(updates)
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        let response = self
            .client
            .post(self.url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Self::decode::<serde_json::Value>(response).await.map(|_| ())
    }

    async fn send_voice(&self, chat_id: i64, file: &Path) -> Result<(), TransportError> {
        let part = Self::read_file_part(file, "voice").await?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("voice", part);
        let response = self
            .client
            .post(self.url("sendVoice"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Self::decode::<serde_json::Value>(response).await.map(|_| ())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file: &Path,
        caption: &str,
    ) -> Result<(), TransportError> {
        let part = Self::read_file_part(file, "document").await?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);
        let response = self
            .client
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Self::decode::<serde_json::Value>(response).await.map(|_| ())
    }

    async fn get_identity(&self) -> Result<BotIdentity, TransportError> {
        let response = self
            .client
            .get(self.url("getMe"))
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_deserialization() {
        let raw = r#"{
            "update_id": 100,
            "message": {
                "chat": {"id": 5},
                "from": {"id": 5, "first_name": "Alice", "username": "alice99"},
                "text": "/start"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).expect("valid update");
        assert_eq!(update.update_id, 100);
        let message = update.message.expect("message present");
        assert_eq!(message.chat.id, 5);
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert_eq!(
            message.from.and_then(|f| f.username).as_deref(),
            Some("alice99")
        );
    }

    #[test]
    fn test_update_without_text_payload() {
        // e.g. a sticker or photo update; text is simply absent
        let raw = r#"{"update_id": 7, "message": {"chat": {"id": 1}, "from": null, "text": null}}"#;
        let update: Update = serde_json::from_str(raw).expect("valid update");
        assert!(update.message.expect("message").text.is_none());
    }

    #[test]
    fn test_envelope_rejection_maps_to_api_error() {
        let envelope: Envelope<Vec<Update>> = serde_json::from_str(
            r#"{"ok": false, "description": "Unauthorized"}"#,
        )
        .expect("valid envelope");
        let err = unwrap_envelope(envelope).expect_err("rejected");
        assert!(matches!(err, TransportError::Api(msg) if msg == "Unauthorized"));
    }

    #[test]
    fn test_envelope_ok_unwraps_result() {
        let envelope: Envelope<i64> =
            serde_json::from_str(r#"{"ok": true, "result": 42}"#).expect("valid envelope");
        assert_eq!(unwrap_envelope(envelope).expect("ok"), 42);
    }
}
