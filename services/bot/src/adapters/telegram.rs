//! services/bot/src/adapters/telegram.rs
//!
//! This module contains the adapter for the Telegram Bot API.
//! It implements the `ChatTransport` port from the `core` crate using long polling.

use async_trait::async_trait;
use bytes::Bytes;
use feedback_desk_core::domain::{InboundMessage, OutboundMessage, Sender};
use feedback_desk_core::ports::{ChatTransport, InboundStream, PortError, PortResult};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Telegram measures message length in UTF-16 code units.
const MAX_MESSAGE_UTF16_UNITS: usize = 4096;
/// Pause before polling again after a failed `getUpdates` call.
const RETRY_DELAY: Duration = Duration::from_secs(5);
/// Attempts per outbound call, counting the first one.
const MAX_SEND_ATTEMPTS: u32 = 3;
/// Flood-control waits longer than this are not worth holding a lane for.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ChatTransport` port on top of the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    /// `{api_url}/bot{token}`; never logged since it embeds the token.
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramTransport {
    /// Creates a new `TelegramTransport`.
    pub fn new(
        api_url: &str,
        token: &str,
        poll_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        // The HTTP timeout has to outlast the long-poll window.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// POSTs a Bot API method, waiting out flood-control replies. `build` runs once per
    /// attempt because a multipart body cannot be replayed.
    async fn post_with_retry<F>(&self, method: &str, build: F) -> PortResult<()>
    where
        F: Fn(reqwest::RequestBuilder) -> PortResult<reqwest::RequestBuilder>,
    {
        let mut attempt = 1;
        loop {
            let request = build(self.client.post(self.method_url(method)))?;
            let response = request.send().await.map_err(transport_error)?;
            let status = response.status();
            let body: ApiResponse<serde_json::Value> =
                response.json().await.map_err(transport_error)?;

            match body.retry_after() {
                Some(delay) if attempt < MAX_SEND_ATTEMPTS && delay <= MAX_RETRY_WAIT => {
                    warn!(
                        "{} was flood limited, retrying in {}s (attempt {})",
                        method,
                        delay.as_secs(),
                        attempt
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => return body.into_result(status).map(|_| ()),
            }
        }
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> PortResult<()> {
        for chunk in split_text(text, MAX_MESSAGE_UTF16_UNITS) {
            self.post_with_retry("sendMessage", |request| {
                Ok(request.json(&serde_json::json!({ "chat_id": chat_id, "text": chunk })))
            })
            .await?;
        }
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, filename: &str, bytes: &Bytes) -> PortResult<()> {
        self.post_with_retry("sendDocument", |request| {
            let part = Part::bytes(bytes.to_vec())
                .file_name(filename.to_string())
                .mime_str("text/csv")
                .map_err(transport_error)?;
            let form = Form::new()
                .text("chat_id", chat_id.to_string())
                .part("document", part);
            Ok(request.multipart(form))
        })
        .await
    }
}

/// Fetches the next batch of updates, waiting up to `timeout_secs` for one to arrive.
async fn fetch_updates(
    client: &reqwest::Client,
    url: &str,
    offset: i64,
    timeout_secs: u64,
) -> PortResult<Vec<Update>> {
    let response = client
        .get(url)
        .query(&[
            ("offset", offset.to_string()),
            ("timeout", timeout_secs.to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ])
        .send()
        .await
        .map_err(transport_error)?;
    unwrap_response(response).await
}

async fn unwrap_response<T: DeserializeOwned>(response: reqwest::Response) -> PortResult<T> {
    let status = response.status();
    let body: ApiResponse<T> = response.json().await.map_err(transport_error)?;
    body.into_result(status)
}

/// The request URL carries the bot token, so it is stripped from every error.
fn transport_error(e: reqwest::Error) -> PortError {
    PortError::Transport(e.without_url().to_string())
}

/// Splits `text` into chunks of at most `limit` UTF-16 code units, cutting at line
/// breaks where one is available.
fn split_text(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.encode_utf16().count() > limit {
        let mut units = 0;
        let hard_end = rest
            .char_indices()
            .find(|(_, c)| {
                units += c.len_utf16();
                units > limit
            })
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        // Always make progress, even if a single character exceeds the limit.
        let hard_end = if hard_end == 0 {
            rest.chars().next().map_or(rest.len(), char::len_utf8)
        } else {
            hard_end
        };
        let cut = rest[..hard_end]
            .rfind('\n')
            .filter(|&idx| idx > 0)
            .unwrap_or(hard_end);
        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start_matches('\n');
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

//=========================================================================================
// Bot API Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

impl<T> ApiResponse<T> {
    /// The back-off Telegram asks for when a call was flood limited.
    fn retry_after(&self) -> Option<Duration> {
        if self.ok {
            return None;
        }
        self.parameters
            .as_ref()?
            .retry_after
            .map(Duration::from_secs)
    }

    fn into_result(self, status: reqwest::StatusCode) -> PortResult<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(PortError::Transport(format!(
                "Bot API call failed with {}: {}",
                status,
                self.description
                    .unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Deserialize)]
struct TgMessage {
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
}

impl TgMessage {
    /// Messages without an author (channel posts) have nobody to answer and are dropped.
    fn into_domain(self) -> Option<InboundMessage> {
        let user = self.from?;
        let full_name = match user.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", user.first_name, last),
            _ => user.first_name,
        };
        Some(InboundMessage {
            chat_id: self.chat.id,
            sender: Sender {
                id: user.id,
                username: user.username,
                full_name: Some(full_name).filter(|name| !name.trim().is_empty()),
            },
            text: self.text,
        })
    }
}

//=========================================================================================
// `ChatTransport` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatTransport for TelegramTransport {
    fn inbound(&self) -> InboundStream {
        let client = self.client.clone();
        let url = self.method_url("getUpdates");
        let timeout_secs = self.poll_timeout_secs;

        Box::pin(async_stream::stream! {
            info!("Long polling the Bot API for updates");
            let mut offset: i64 = 0;
            loop {
                match fetch_updates(&client, &url, offset, timeout_secs).await {
                    Ok(updates) => {
                        debug!("Received {} updates", updates.len());
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            let message = update.message.and_then(TgMessage::into_domain);
                            if let Some(message) = message {
                                yield Ok(message);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        })
    }

    async fn send(&self, chat_id: i64, message: OutboundMessage) -> PortResult<()> {
        match message {
            OutboundMessage::Text(text) => self.send_text(chat_id, &text).await,
            OutboundMessage::Document { filename, bytes } => {
                self.send_document(chat_id, &filename, &bytes).await
            }
        }
    }
}
