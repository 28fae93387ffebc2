//! LINE Messaging API client: reply to an event with its reply token.

use serde::Serialize;

pub const LINE_API_BASE: &str = "https://api.line.me";

/// Text message length limit enforced by LINE (characters).
pub const MAX_TEXT_LEN: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("line request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("line api error: {0}")]
    Api(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    typ: &'static str,
    text: &'a str,
}

/// Client for the reply endpoint. Cheap to clone; shares the underlying connection pool.
#[derive(Clone)]
pub struct LineClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl LineClient {
    pub fn new(access_token: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| LINE_API_BASE.to_string());
        Self {
            base_url,
            access_token: access_token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// POST /v2/bot/message/reply: send one text message using a single-use reply token.
    /// Text longer than [`MAX_TEXT_LEN`] characters is truncated.
    pub async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/message/reply", self.base_url);
        let body = ReplyRequest {
            reply_token,
            messages: vec![TextMessage {
                typ: "text",
                text: truncate_chars(text, MAX_TEXT_LEN),
            }],
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LineError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
