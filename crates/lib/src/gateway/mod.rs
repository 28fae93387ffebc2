//! Gateway: HTTP front door for the LINE webhook.
//!
//! `POST /callback` verifies the signature over the raw body, enqueues the batch for the
//! dispatcher and acknowledges at once. `GET /` is a static health probe and `POST /talk`
//! queries the reply provider directly.

mod error;
mod server;

pub use error::GatewayError;
pub use server::{router, run_gateway, GatewayState, SERVICE_NAME};
