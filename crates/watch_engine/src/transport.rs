use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use watch_logging::{watch_debug, watch_info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport setup failed: {0}")]
    Setup(String),
    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Delivers one formatted message to the configured channel.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), TransportError>;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Telegram Bot API `sendMessage`, plain text.
///
/// The endpoint embeds the bot token, so errors are reported without urls.
#[derive(Clone)]
pub struct TelegramTransport {
    endpoint: Url,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub const DEFAULT_API_BASE: &'static str = "https://api.telegram.org";

    pub fn new(
        api_base: &str,
        bot_token: &str,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let endpoint = Url::parse(&format!(
            "{}/bot{}/sendMessage",
            api_base.trim_end_matches('/'),
            bot_token
        ))
        .map_err(|err| TransportError::Setup(err.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Setup(err.to_string()))?;
        Ok(Self {
            endpoint,
            chat_id: chat_id.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let body = serde_json::to_vec(&SendMessage {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        })
        .map_err(|err| TransportError::Setup(err.to_string()))?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.without_url().to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::Network(err.without_url().to_string()))?;
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        // The API reports refusals in the body as `{"ok": false, "description": ..}`.
        let reply: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        if reply.get("ok").and_then(Value::as_bool) == Some(false) {
            let description = reply
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(TransportError::Rejected(description.to_string()));
        }
        watch_debug!("Message delivered to chat {}", self.chat_id);
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunTransport;

#[async_trait::async_trait]
impl Transport for DryRunTransport {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        watch_info!("[dry run] would send:\n{}", text);
        Ok(())
    }
}
