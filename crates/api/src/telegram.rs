//! Telegram Bot API client for notifications and command polling.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Telegram delivery or polling failure. Callers log these; they are
/// never allowed to take a monitor loop down.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("telegram returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("telegram rejected the request: {0}")]
    Rejected(String),
}

/// Telegram Bot API client.
///
/// When token or chat id are unconfigured the client degrades to log-only
/// mode: outbound messages are written to the log and reported as sent.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    chat_id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

/// One update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

/// Incoming message, reduced to the fields the command surface needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            chat_id,
        }
    }

    /// Whether a token and chat id are present.
    pub fn is_configured(&self) -> bool {
        !self.token.is_empty() && self.chat_id != 0
    }

    /// Send a message to the configured operator chat.
    pub async fn send_message(&self, text: &str) -> Result<(), TelegramError> {
        if !self.is_configured() {
            warn!(message = text, "telegram unconfigured; logging message instead");
            return Ok(());
        }
        self.send_message_to(self.chat_id, text).await
    }

    /// Send a message to an arbitrary chat (command replies).
    pub async fn send_message_to(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let url = self.method_url("sendMessage");
        let request = SendMessageRequest {
            chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Status(status));
        }

        let body: ApiResponse<serde_json::Value> = response.json().await?;
        if !body.ok {
            return Err(TelegramError::Rejected(
                body.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }

    /// Long-poll for updates past `offset`. Blocks up to `timeout_secs`
    /// server-side before returning an empty batch.
    pub async fn poll_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let url = self.method_url("getUpdates");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".to_string()),
            ])
            // request timeout must outlive the server-side long poll
            .timeout(Duration::from_secs(timeout_secs + 10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Status(status));
        }

        let body: ApiResponse<Vec<Update>> = response.json().await?;
        if !body.ok {
            return Err(TelegramError::Rejected(
                body.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(body.result.unwrap_or_default())
    }

    fn method_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.token, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_detection() {
        assert!(!TelegramClient::new("", 0).is_configured());
        assert!(!TelegramClient::new("123:abc", 0).is_configured());
        assert!(TelegramClient::new("123:abc", 42).is_configured());
    }

    #[test]
    fn test_deserialize_updates() {
        let json = r#"{
            "ok": true,
            "result": [
                {"update_id": 7, "message": {"chat": {"id": 99}, "text": "/status"}},
                {"update_id": 8, "message": {"chat": {"id": 99}}}
            ]
        }"#;

        let body: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(body.ok);
        let updates = body.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/status"));
        assert!(updates[1].message.as_ref().unwrap().text.is_none());
    }
}
