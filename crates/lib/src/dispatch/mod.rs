//! Background processing of accepted webhooks.
//!
//! The gateway enqueues raw `(body, signature)` jobs; a worker pool hands each to the
//! dispatcher, which routes events through a handler table and sends replies.

mod dispatcher;
mod queue;

pub use dispatcher::{DispatchReport, Dispatcher, EventOutcome, WebhookError};
pub use queue::{JobHandler, QueueError, WebhookJob, WorkQueue, DEFAULT_SUBMIT_TIMEOUT};
