//! Telegram Bot API messenger.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{MessageHandle, TelegramConfig};
use crate::notify::Messenger;

/// Longest flood-control wait honoured before giving up.
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Messenger backed by the Telegram Bot API with HTML parse mode.
#[derive(Clone)]
pub struct TelegramMessenger {
    client: Client,
    base_url: String,
    chat_id: String,
    max_retries: u8,
}

impl TelegramMessenger {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
            chat_id: config.chat_id.clone(),
            max_retries: 2,
        })
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    fn payload(&self, thread_id: Option<i64>) -> serde_json::Map<String, Value> {
        let mut payload = serde_json::Map::new();
        payload.insert("chat_id".into(), json!(self.chat_id));
        if let Some(thread_id) = thread_id {
            payload.insert("message_thread_id".into(), json!(thread_id));
        }
        payload
    }

    /// Call a Bot API method, waiting out flood control when asked to.
    async fn call(&self, method: &str, payload: &serde_json::Map<String, Value>) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, method);
        let mut attempt: u8 = 0;

        loop {
            attempt += 1;
            let response = self.client.post(&url).json(payload).send().await?;
            let status = response.status();
            let body: ApiResponse = response.json().await.map_err(|e| {
                AppError::telegram(method, format!("HTTP {status}, unreadable body: {e}"))
            })?;

            if body.ok {
                return body
                    .result
                    .ok_or_else(|| AppError::telegram(method, "response has no result"));
            }

            let retry_after = body.parameters.as_ref().and_then(|p| p.retry_after);
            if status == StatusCode::TOO_MANY_REQUESTS && attempt <= self.max_retries {
                let wait = retry_after.unwrap_or(1).min(MAX_RETRY_AFTER_SECS);
                log::warn!("Telegram {} rate limited, retrying in {}s", method, wait);
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            let description = body
                .description
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(AppError::telegram(method, description));
        }
    }
}

/// Pull `message_id` out of a Message, or the first Message of an array.
fn message_handle(method: &str, result: &Value) -> Result<MessageHandle> {
    let message = match result {
        Value::Array(messages) => messages.first(),
        other => Some(other),
    };
    message
        .and_then(|m| m.get("message_id"))
        .and_then(Value::as_i64)
        .map(MessageHandle)
        .ok_or_else(|| AppError::telegram(method, "result has no message_id"))
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, text: &str, thread_id: Option<i64>) -> Result<MessageHandle> {
        let mut payload = self.payload(thread_id);
        payload.insert("text".into(), json!(text));
        payload.insert("parse_mode".into(), json!("HTML"));
        payload.insert("disable_web_page_preview".into(), json!(true));

        let result = self.call("sendMessage", &payload).await?;
        message_handle("sendMessage", &result)
    }

    async fn send_photo(
        &self,
        url: &str,
        caption: &str,
        thread_id: Option<i64>,
    ) -> Result<MessageHandle> {
        let mut payload = self.payload(thread_id);
        payload.insert("photo".into(), json!(url));
        payload.insert("caption".into(), json!(caption));
        payload.insert("parse_mode".into(), json!("HTML"));

        let result = self.call("sendPhoto", &payload).await?;
        message_handle("sendPhoto", &result)
    }

    async fn send_media_group(
        &self,
        urls: &[String],
        caption: &str,
        thread_id: Option<i64>,
    ) -> Result<MessageHandle> {
        let media: Vec<Value> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| {
                if i == 0 {
                    json!({ "type": "photo", "media": url, "caption": caption, "parse_mode": "HTML" })
                } else {
                    json!({ "type": "photo", "media": url })
                }
            })
            .collect();

        let mut payload = self.payload(thread_id);
        payload.insert("media".into(), Value::Array(media));

        let result = self.call("sendMediaGroup", &payload).await?;
        message_handle("sendMediaGroup", &result)
    }

    async fn edit_text(&self, handle: MessageHandle, text: &str) -> Result<()> {
        let mut payload = self.payload(None);
        payload.insert("message_id".into(), json!(handle.0));
        payload.insert("text".into(), json!(text));
        payload.insert("parse_mode".into(), json!("HTML"));
        payload.insert("disable_web_page_preview".into(), json!(true));

        match self.call("editMessageText", &payload).await {
            Ok(_) => Ok(()),
            Err(AppError::Telegram { description, .. })
                if description.contains("message is not modified") =>
            {
                log::debug!("Message {} already shows this text", handle);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
