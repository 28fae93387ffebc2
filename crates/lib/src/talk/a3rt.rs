//! A3RT Talk API client (https://a3rt.recruit.co.jp/product/talkAPI/).
//! Form-encoded `apikey` + `query` in, `{status, message, results}` out.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reply used when the provider has nothing to say ("empty reply").
pub const EMPTY_REPLY_FALLBACK: &str = "ちょっとわかりません";

const EMPTY_REPLY_MESSAGE: &str = "empty reply";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum TalkError {
    #[error("talk request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("talk api error: {0}")]
    Api(String),
}

impl TalkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TalkError::Request(e) if e.is_timeout())
    }
}

/// Text to send to the provider. Also the JSON body of `POST /talk`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub query: String,
}

impl Query {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// Provider response. `status` 0 means success; anything else carries `message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyResult {
    pub status: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<ReplyCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyCandidate {
    pub reply: String,
    #[serde(default)]
    pub perplexity: Option<f64>,
}

/// Map a provider result to reply text.
///
/// - status != 0 and message "empty reply": [`EMPTY_REPLY_FALLBACK`]
/// - status != 0 otherwise: the provider's message as-is
/// - status == 0: the first candidate's reply
pub fn interpret_reply(result: ReplyResult) -> Result<String, TalkError> {
    if result.status != 0 {
        let message = result.message.unwrap_or_default();
        if message == EMPTY_REPLY_MESSAGE {
            return Ok(EMPTY_REPLY_FALLBACK.to_string());
        }
        return Ok(message);
    }
    result
        .results
        .into_iter()
        .next()
        .map(|c| c.reply)
        .ok_or_else(|| TalkError::Api("status 0 with no results".to_string()))
}

/// Client for the Talk API. Holds the api key and endpoint; cheap to clone.
#[derive(Clone)]
pub struct TalkClient {
    api_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl TalkClient {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Override the per-request timeout (default 5 seconds).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// POST the query and interpret the result. Timeouts and transport errors are returned, not mapped.
    /// The provider reports its own failures (quota, bad key) in the JSON body, sometimes with a
    /// 4xx status, so the body is interpreted whatever the HTTP status; only an undecodable body
    /// is an error.
    pub async fn talk(&self, query: &Query) -> Result<String, TalkError> {
        let form = [("apikey", self.api_key.as_str()), ("query", query.query.as_str())];
        let res = self
            .client
            .post(&self.api_url)
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = res.status();
        let body = res.bytes().await?;
        match serde_json::from_slice::<ReplyResult>(&body) {
            Ok(data) => interpret_reply(data),
            Err(e) => Err(TalkError::Api(format!(
                "{} undecodable response ({}): {}",
                status,
                e,
                String::from_utf8_lossy(&body)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    fn result(json: &str) -> ReplyResult {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn success_takes_first_candidate() {
        let r = result(r#"{"status":0,"message":"ok","results":[{"perplexity":0.07,"reply":"hello"},{"reply":"second"}]}"#);
        assert_eq!(interpret_reply(r).unwrap(), "hello");
    }

    #[test]
    fn empty_reply_maps_to_fallback() {
        let r = result(r#"{"status":1,"message":"empty reply"}"#);
        assert_eq!(interpret_reply(r).unwrap(), EMPTY_REPLY_FALLBACK);
    }

    #[test]
    fn other_failure_passes_message_through() {
        let r = result(r#"{"status":1,"message":"quota exceeded"}"#);
        assert_eq!(interpret_reply(r).unwrap(), "quota exceeded");
    }

    #[test]
    fn success_without_results_is_error() {
        let r = result(r#"{"status":0,"message":"ok","results":[]}"#);
        assert!(matches!(interpret_reply(r), Err(TalkError::Api(_))));
    }

    #[tokio::test]
    async fn talk_posts_form_and_returns_reply() {
        let server = MockServer::start();
        let talk = server.mock(|when, then| {
            when.method(POST)
                .path("/talk/v1/smalltalk")
                .header("content-type", "application/x-www-form-urlencoded")
                .x_www_form_urlencoded_tuple("apikey", "secret-key")
                .x_www_form_urlencoded_tuple("query", "hi");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"status":0,"message":"ok","results":[{"perplexity":1.2,"reply":"hello"}]}"#);
        });

        let client = TalkClient::new("secret-key", server.url("/talk/v1/smalltalk"));
        let reply = client.talk(&Query::new("hi")).await.unwrap();
        assert_eq!(reply, "hello");
        // No hidden state: the same query gives the same answer.
        let again = client.talk(&Query::new("hi")).await.unwrap();
        assert_eq!(again, "hello");
        talk.assert_hits(2);
    }

    #[tokio::test]
    async fn talk_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/talk");
            then.status(200)
                .delay(Duration::from_millis(500))
                .header("content-type", "application/json")
                .body(r#"{"status":0,"results":[{"reply":"late"}]}"#);
        });

        let client =
            TalkClient::new("k", server.url("/talk")).with_timeout(Duration::from_millis(50));
        let err = client.talk(&Query::new("hi")).await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    }

    #[tokio::test]
    async fn talk_error_status_with_provider_body_is_interpreted() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/talk");
            then.status(400)
                .header("content-type", "application/json")
                .body(r#"{"status":1000,"message":"quota exceeded"}"#);
        });

        let client = TalkClient::new("k", server.url("/talk"));
        let reply = client.talk(&Query::new("hi")).await.unwrap();
        assert_eq!(reply, "quota exceeded");
    }

    #[tokio::test]
    async fn talk_error_status_with_empty_reply_body_uses_fallback() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/talk");
            then.status(400)
                .header("content-type", "application/json")
                .body(r#"{"status":1,"message":"empty reply"}"#);
        });

        let client = TalkClient::new("k", server.url("/talk"));
        let reply = client.talk(&Query::new("hi")).await.unwrap();
        assert_eq!(reply, EMPTY_REPLY_FALLBACK);
    }

    #[tokio::test]
    async fn talk_http_error_is_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/talk");
            then.status(503).body("unavailable");
        });

        let client = TalkClient::new("k", server.url("/talk"));
        let err = client.talk(&Query::new("hi")).await.unwrap_err();
        assert!(matches!(err, TalkError::Api(_)), "{:?}", err);
    }
}
