//! Minimal Telegram Bot API client: long polling plus the three sends the
//! delivery pipeline needs (HTML text, audio upload, typing indicator).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use semangat_core::{AudioArtifact, MessageTransport, Result, SemangatError, SubscriberId};

use crate::config::TelegramConfig;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    /// Telegram user id of the sender; channel posts have none
    pub fn sender_id(&self) -> Option<i64> {
        self.from.as_ref().map(|u| u.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

pub struct TelegramClient {
    http: Client,
    base: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(cfg: &TelegramConfig) -> Result<Self> {
        if cfg.token.trim().is_empty() {
            return Err(SemangatError::ConfigError("TELEGRAM_TOKEN is not set".into()));
        }
        // Long polls hold the request open for poll_timeout_secs
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.poll_timeout_secs + 15))
            .build()
            .map_err(|e| SemangatError::TransportError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base: format!("{}/bot{}", cfg.api_url.trim_end_matches('/'), cfg.token),
            poll_timeout_secs: cfg.poll_timeout_secs,
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let resp = self
            .http
            .post(self.url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| SemangatError::TransportError(format!("{method}: {e}")))?;
        Self::unwrap_response(method, resp).await
    }

    async fn unwrap_response<T: DeserializeOwned>(method: &str, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SemangatError::TransportError(format!("{method}: {e}")))?;
        let parsed: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            SemangatError::TransportError(format!("{method}: unexpected response ({status}): {e}"))
        })?;
        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(SemangatError::TransportError(format!(
                "{method} failed ({status}): {}",
                parsed.description.unwrap_or_default()
            ))),
        }
    }

    /// Identity of the bot behind the token; doubles as a credential check
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", json!({})).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
            }),
        )
        .await
    }
}

#[async_trait]
impl MessageTransport for TelegramClient {
    async fn send_text(&self, subscriber: SubscriberId, text: &str) -> Result<()> {
        self.send_message(subscriber.0, text).await.map(|_| ())
    }

    async fn send_audio(
        &self,
        subscriber: SubscriberId,
        audio: &AudioArtifact,
        caption: &str,
    ) -> Result<()> {
        let bytes = audio.read().await?;
        let part = Part::bytes(bytes)
            .file_name(audio.file_name())
            .mime_str("audio/wav")
            .map_err(|e| SemangatError::TransportError(format!("sendAudio: {e}")))?;
        let form = Form::new()
            .text("chat_id", subscriber.0.to_string())
            .text("caption", caption.to_string())
            .part("audio", part);

        debug!(target = "telegram", subscriber = %subscriber, bytes = audio.len(), "Uploading audio");
        let resp = self
            .http
            .post(self.url("sendAudio"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| SemangatError::TransportError(format!("sendAudio: {e}")))?;
        Self::unwrap_response::<Message>("sendAudio", resp)
            .await
            .map(|_| ())
    }

    async fn send_typing(&self, subscriber: SubscriberId) -> Result<()> {
        self.call::<bool>(
            "sendChatAction",
            json!({ "chat_id": subscriber.0, "action": "typing" }),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_update() {
        let raw = r#"{"ok":true,"result":[{"update_id":10,"message":{"message_id":5,
            "chat":{"id":-100,"type":"private"},"from":{"id":7,"is_bot":false,"first_name":"Sari"},
            "date":0,"text":"/start"}}]}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let updates = parsed.result.unwrap();
        let msg = updates[0].message.as_ref().unwrap();
        assert_eq!(updates[0].update_id, 10);
        assert_eq!(msg.chat.id, -100);
        assert_eq!(msg.message_id, 5);
        assert_eq!(msg.sender_id(), Some(7));
        assert_eq!(msg.from.as_ref().unwrap().first_name, "Sari");
        assert_eq!(msg.text.as_deref(), Some("/start"));
    }

    #[test]
    fn non_message_updates_are_tolerated() {
        let raw = r#"{"ok":true,"result":[{"update_id":11,"edited_message":{}}]}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(parsed.result.unwrap()[0].message.is_none());
    }

    #[test]
    fn channel_post_has_no_sender() {
        let raw = r#"{"message_id":9,"chat":{"id":-200,"type":"channel"},"text":"/test"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.message_id, 9);
        assert_eq!(msg.sender_id(), None);
    }

    #[test]
    fn error_response_carries_description() {
        let raw = r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#;
        let parsed: ApiResponse<User> = serde_json::from_str(raw).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn rejects_empty_token() {
        let cfg = TelegramConfig {
            api_url: "https://api.telegram.org".into(),
            token: String::new(),
            poll_timeout_secs: 30,
            admin_chat_id: None,
        };
        assert!(TelegramClient::new(&cfg).is_err());
    }
}
