//! LINE Messaging API: webhook signature, webhook event payloads, and the reply client.
//!
//! Inbound webhook batches are verified with the channel secret and parsed into events;
//! replies go out through the reply endpoint keyed by the event's reply token.

mod client;
mod signature;
mod webhook;

pub use client::{LineClient, LineError, LINE_API_BASE, MAX_TEXT_LEN};
pub use signature::{sign, verify, SignatureError, SIGNATURE_HEADER};
pub use webhook::{
    DeliveryContext, Event, EventKind, EventMeta, EventSource, MessageContent, MessageEvent,
    WebhookBody,
};
