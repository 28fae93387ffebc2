//! Reply provider: A3RT Talk API client.
//!
//! Sends a user utterance and turns the provider's structured result into reply text.

mod a3rt;

pub use a3rt::{
    interpret_reply, Query, ReplyCandidate, ReplyResult, TalkClient, TalkError, EMPTY_REPLY_FALLBACK,
};
