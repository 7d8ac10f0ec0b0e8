//! Telegram notification sink.
//!
//! Posts messages to the Bot API `sendMessage` endpoint for every
//! configured chat id. Messages are clamped to the API's 4096-byte limit;
//! delivery errors are logged and swallowed so a flaky sink cannot stall
//! the scan loop.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

use crate::config::TelegramConfig;
use crate::notify::{NotifySink, MAX_MESSAGE_BYTES};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TelegramSink {
    http: Client,
    base_url: String,
    chat_ids: Vec<String>,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig) -> anyhow::Result<Self> {
        Self::with_base_url("https://api.telegram.org", config)
    }

    pub fn with_base_url(api_base: &str, config: &TelegramConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build Telegram HTTP client: {e}"))?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), config.token),
            chat_ids: config.chat_ids.clone(),
        })
    }
}

/// Clamp a message to the sink's byte limit without splitting a UTF-8
/// code point.
pub fn clamp_message(text: &str) -> &str {
    if text.len() <= MAX_MESSAGE_BYTES {
        return text;
    }
    let mut end = MAX_MESSAGE_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl NotifySink for TelegramSink {
    async fn send(&self, text: &str) {
        let text = clamp_message(text);
        for chat_id in &self.chat_ids {
            let result = self
                .http
                .post(format!("{}/sendMessage", self.base_url))
                .json(&serde_json::json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }))
                .send()
                .await;

            match result {
                Ok(resp) if !resp.status().is_success() => {
                    warn!(chat_id, status = %resp.status(), "Telegram rejected message");
                }
                Err(e) => {
                    warn!(chat_id, error = %e, "Telegram delivery failed");
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_short_message_untouched() {
        assert_eq!(clamp_message("hello"), "hello");
    }

    #[test]
    fn test_clamp_long_message() {
        let long = "a".repeat(MAX_MESSAGE_BYTES + 100);
        assert_eq!(clamp_message(&long).len(), MAX_MESSAGE_BYTES);
    }

    #[test]
    fn test_clamp_respects_utf8_boundary() {
        // Fill with 3-byte chars so the limit lands mid-character.
        let long = "€".repeat(MAX_MESSAGE_BYTES / 3 + 10);
        let clamped = clamp_message(&long);
        assert!(clamped.len() <= MAX_MESSAGE_BYTES);
        assert!(clamped.chars().all(|c| c == '€'));
    }

    #[test]
    fn test_sink_construction() {
        let cfg = TelegramConfig {
            token: "123:abc".to_string(),
            chat_ids: vec!["1".to_string(), "2".to_string()],
        };
        let sink = TelegramSink::new(&cfg).unwrap();
        assert_eq!(sink.chat_ids.len(), 2);
        assert!(sink.base_url.ends_with("/bot123:abc"));
    }
}
