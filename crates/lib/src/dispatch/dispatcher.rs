//! Webhook dispatcher: verify, parse, route each event through the handler table, reply.

use crate::config::Config;
use crate::dispatch::queue::{JobHandler, WebhookJob};
use crate::line::{
    self, Event, EventKind, LineClient, MessageContent, SignatureError, WebhookBody,
};
use crate::talk::{Query, TalkClient};
use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::time::Duration;

/// What happened to one event of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Reply sent.
    Replied,
    /// No handler for the kind, non-text message, or no reply token.
    Skipped,
    /// Provider call failed (timeout, network, bad response); nothing sent.
    Dropped,
    /// Provider answered but the reply could not be delivered.
    ReplyFailed,
}

/// Per-batch tally, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub replied: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub reply_failed: usize,
}

impl DispatchReport {
    fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Replied => self.replied += 1,
            EventOutcome::Skipped => self.skipped += 1,
            EventOutcome::Dropped => self.dropped += 1,
            EventOutcome::ReplyFailed => self.reply_failed += 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid signature: {0}")]
    Signature(#[from] SignatureError),
    #[error("malformed webhook body: {0}")]
    Parse(#[from] serde_json::Error),
}

type EventHandler = for<'a> fn(&'a Dispatcher, &'a Event) -> BoxFuture<'a, EventOutcome>;

/// Turns webhook batches into replies. Built once at startup; shared by all workers.
pub struct Dispatcher {
    channel_secret: String,
    talk: TalkClient,
    line: LineClient,
    handlers: HashMap<EventKind, EventHandler>,
}

impl Dispatcher {
    pub fn new(channel_secret: impl Into<String>, talk: TalkClient, line: LineClient) -> Self {
        let mut handlers: HashMap<EventKind, EventHandler> = HashMap::new();
        handlers.insert(EventKind::Message, handle_message);
        Self {
            channel_secret: channel_secret.into(),
            talk,
            line,
            handlers,
        }
    }

    /// Build from config; fails when any credential is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let creds = config.require_credentials()?;
        let talk = TalkClient::new(creds.talk_api_key, creds.talk_api_url)
            .with_timeout(Duration::from_secs(config.talk.timeout_secs));
        let line = LineClient::new(creds.channel_access_token, Some(config.line.api_base.clone()));
        Ok(Self::new(creds.channel_secret, talk, line))
    }

    pub fn talk_client(&self) -> &TalkClient {
        &self.talk
    }

    /// Verify and process one webhook batch. Events are handled in order; a failure on one
    /// event never stops the rest. Signature or parse failure rejects the whole batch.
    pub async fn handle(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<DispatchReport, WebhookError> {
        line::verify(&self.channel_secret, body, signature)?;
        let batch = WebhookBody::parse(body)?;
        let mut report = DispatchReport::default();
        for event in &batch.events {
            let outcome = match self.handlers.get(&event.kind()) {
                Some(handler) => handler(self, event).await,
                None => {
                    log::debug!(
                        "dispatch: no handler for {} event {}",
                        event.kind().as_str(),
                        event.webhook_event_id().unwrap_or("-")
                    );
                    EventOutcome::Skipped
                }
            };
            report.record(outcome);
        }
        Ok(report)
    }
}

fn handle_message<'a>(dispatcher: &'a Dispatcher, event: &'a Event) -> BoxFuture<'a, EventOutcome> {
    Box::pin(async move {
        let Event::Message(msg) = event else {
            return EventOutcome::Skipped;
        };
        let MessageContent::Text { text, .. } = &msg.message else {
            log::debug!("dispatch: skipping non-text message");
            return EventOutcome::Skipped;
        };
        let Some(reply_token) = msg.reply_token.as_deref() else {
            log::debug!("dispatch: message without reply token, skipping");
            return EventOutcome::Skipped;
        };
        if msg.delivery_context.is_redelivery {
            log::debug!(
                "dispatch: redelivered event {}",
                event.webhook_event_id().unwrap_or("-")
            );
        }
        let reply = match dispatcher.talk.talk(&Query::new(text.as_str())).await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                log::warn!(
                    "dispatch: talk timed out, dropping event {}",
                    event.webhook_event_id().unwrap_or("-")
                );
                return EventOutcome::Dropped;
            }
            Err(e) => {
                log::warn!("dispatch: talk failed, dropping event: {}", e);
                return EventOutcome::Dropped;
            }
        };
        if let Err(e) = dispatcher.line.reply_text(reply_token, &reply).await {
            log::warn!("dispatch: reply failed: {}", e);
            return EventOutcome::ReplyFailed;
        }
        EventOutcome::Replied
    })
}

#[async_trait]
impl JobHandler for Dispatcher {
    async fn handle(&self, job: WebhookJob) {
        match Dispatcher::handle(self, &job.body, job.signature.as_deref()).await {
            Ok(report) => log::info!(
                "webhook batch done: replied={} skipped={} dropped={} reply_failed={}",
                report.replied,
                report.skipped,
                report.dropped,
                report.reply_failed
            ),
            Err(e) => log::warn!("webhook batch rejected: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    const SECRET: &str = "test-channel-secret";

    fn dispatcher(server: &MockServer, timeout: Duration) -> Dispatcher {
        let talk = TalkClient::new("k", server.url("/talk")).with_timeout(timeout);
        let line = LineClient::new("token", Some(server.base_url()));
        Dispatcher::new(SECRET, talk, line)
    }

    fn text_event(text: &str, reply_token: &str) -> serde_json::Value {
        json!({
            "type": "message",
            "replyToken": reply_token,
            "message": {"type": "text", "id": "1", "text": text},
            "source": {"type": "user", "userId": "U1"},
            "deliveryContext": {"isRedelivery": false}
        })
    }

    fn signed(events: Vec<serde_json::Value>) -> (Vec<u8>, String) {
        let body = serde_json::to_vec(&json!({"destination": "U0", "events": events})).unwrap();
        let sig = line::sign(SECRET, &body);
        (body, sig)
    }

    #[tokio::test]
    async fn text_message_gets_reply() {
        let server = MockServer::start();
        let talk = server.mock(|when, then| {
            when.method(POST).path("/talk").x_www_form_urlencoded_tuple("query", "hi");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"status":0,"results":[{"reply":"hello"}]}"#);
        });
        let reply = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/bot/message/reply")
                .json_body(json!({"replyToken": "rt-1", "messages": [{"type": "text", "text": "hello"}]}));
            then.status(200).body("{}");
        });

        let d = dispatcher(&server, Duration::from_secs(5));
        let (body, sig) = signed(vec![text_event("hi", "rt-1")]);
        let report = d.handle(&body, Some(&sig)).await.unwrap();
        assert_eq!(report.replied, 1);
        talk.assert_hits(1);
        reply.assert_hits(1);
    }

    #[tokio::test]
    async fn unsupported_events_make_no_calls() {
        let server = MockServer::start();
        let talk = server.mock(|when, then| {
            when.method(POST).path("/talk");
            then.status(200).body(r#"{"status":0,"results":[{"reply":"x"}]}"#);
        });
        let reply = server.mock(|when, then| {
            when.method(POST).path("/v2/bot/message/reply");
            then.status(200).body("{}");
        });

        let d = dispatcher(&server, Duration::from_secs(5));
        let (body, sig) = signed(vec![
            json!({"type": "follow", "replyToken": "r1"}),
            json!({"type": "message", "replyToken": "r2", "message": {"type": "sticker", "id": "2"}}),
            json!({"type": "message", "message": {"type": "text", "id": "3", "text": "standby"}}),
            json!({"type": "somethingNew", "replyToken": "r4"}),
        ]);
        let report = d.handle(&body, Some(&sig)).await.unwrap();
        assert_eq!(report.skipped, 4);
        assert_eq!(report.replied, 0);
        talk.assert_hits(0);
        reply.assert_hits(0);
    }

    #[tokio::test]
    async fn provider_timeout_drops_only_that_event() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/talk").x_www_form_urlencoded_tuple("query", "slow");
            then.status(200)
                .delay(Duration::from_millis(500))
                .body(r#"{"status":0,"results":[{"reply":"late"}]}"#);
        });
        server.mock(|when, then| {
            when.method(POST).path("/talk").x_www_form_urlencoded_tuple("query", "fast");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"status":1,"message":"empty reply"}"#);
        });
        let slow_reply = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/bot/message/reply")
                .json_body_partial(r#"{"replyToken": "rt-slow"}"#);
            then.status(200).body("{}");
        });
        let fast_reply = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/bot/message/reply")
                .json_body(json!({"replyToken": "rt-fast", "messages": [{"type": "text", "text": "ちょっとわかりません"}]}));
            then.status(200).body("{}");
        });

        let d = dispatcher(&server, Duration::from_millis(50));
        let (body, sig) = signed(vec![text_event("slow", "rt-slow"), text_event("fast", "rt-fast")]);
        let report = d.handle(&body, Some(&sig)).await.unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.replied, 1);
        slow_reply.assert_hits(0);
        fast_reply.assert_hits(1);
    }

    #[tokio::test]
    async fn reply_failure_does_not_stop_batch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/talk");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"status":1,"message":"quota exceeded"}"#);
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/v2/bot/message/reply")
                .json_body_partial(r#"{"replyToken": "expired"}"#);
            then.status(400).body(r#"{"message":"Invalid reply token"}"#);
        });
        let ok = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/bot/message/reply")
                .json_body(json!({"replyToken": "fresh", "messages": [{"type": "text", "text": "quota exceeded"}]}));
            then.status(200).body("{}");
        });

        let d = dispatcher(&server, Duration::from_secs(5));
        let (body, sig) = signed(vec![text_event("a", "expired"), text_event("b", "fresh")]);
        let report = d.handle(&body, Some(&sig)).await.unwrap();
        assert_eq!(report.reply_failed, 1);
        assert_eq!(report.replied, 1);
        ok.assert_hits(1);
    }

    #[tokio::test]
    async fn bad_signature_or_body_rejected() {
        let server = MockServer::start();
        let talk = server.mock(|when, then| {
            when.method(POST).path("/talk");
            then.status(200).body(r#"{"status":0,"results":[{"reply":"x"}]}"#);
        });
        let d = dispatcher(&server, Duration::from_secs(5));

        let (body, _) = signed(vec![text_event("hi", "rt")]);
        let forged = line::sign("other-secret", &body);
        assert!(matches!(
            d.handle(&body, Some(&forged)).await,
            Err(WebhookError::Signature(_))
        ));
        assert!(matches!(
            d.handle(&body, None).await,
            Err(WebhookError::Signature(SignatureError::Missing))
        ));

        let garbage = b"not json".to_vec();
        let sig = line::sign(SECRET, &garbage);
        assert!(matches!(
            d.handle(&garbage, Some(&sig)).await,
            Err(WebhookError::Parse(_))
        ));
        talk.assert_hits(0);
    }
}
