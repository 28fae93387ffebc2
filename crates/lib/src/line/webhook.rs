//! Webhook payload: `{ "destination", "events": [...] }` as POSTed by LINE to the callback URL.

use serde::Deserialize;

/// One webhook delivery. A single POST may batch several events.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    /// Bot user id that received the events.
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl WebhookBody {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// Webhook event, tagged by `type`. Kinds this service does not know deserialize as `Unsupported`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Message(MessageEvent),
    Follow(EventMeta),
    Unfollow(EventMeta),
    Join(EventMeta),
    Leave(EventMeta),
    Postback(EventMeta),
    #[serde(other)]
    Unsupported,
}

/// Event kind tag; key of the dispatcher's handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    Follow,
    Unfollow,
    Join,
    Leave,
    Postback,
    Unsupported,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Follow => "follow",
            EventKind::Unfollow => "unfollow",
            EventKind::Join => "join",
            EventKind::Leave => "leave",
            EventKind::Postback => "postback",
            EventKind::Unsupported => "unsupported",
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Message(_) => EventKind::Message,
            Event::Follow(_) => EventKind::Follow,
            Event::Unfollow(_) => EventKind::Unfollow,
            Event::Join(_) => EventKind::Join,
            Event::Leave(_) => EventKind::Leave,
            Event::Postback(_) => EventKind::Postback,
            Event::Unsupported => EventKind::Unsupported,
        }
    }

    /// Webhook event id, when the event kind carries one.
    pub fn webhook_event_id(&self) -> Option<&str> {
        match self {
            Event::Message(e) => e.webhook_event_id.as_deref(),
            Event::Follow(m)
            | Event::Unfollow(m)
            | Event::Join(m)
            | Event::Leave(m)
            | Event::Postback(m) => m.webhook_event_id.as_deref(),
            Event::Unsupported => None,
        }
    }
}

/// Fields shared by the event kinds this service does not answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub source: Option<EventSource>,
}

/// `type: "message"` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    /// Single-use token for replying to this event. Absent in standby mode.
    #[serde(default)]
    pub reply_token: Option<String>,
    pub message: MessageContent,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    #[serde(default)]
    pub delivery_context: DeliveryContext,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub source: Option<EventSource>,
}

/// Message content, tagged by `type`. Only text is modelled; stickers, images, etc. are `Other`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text { id: String, text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    /// True when LINE resends an event the bot did not acknowledge in time.
    #[serde(default)]
    pub is_redelivery: bool,
}

/// Who sent the event: a user, group, or room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}
