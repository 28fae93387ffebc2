//! Gateway HTTP server.

use crate::config::Config;
use crate::dispatch::{Dispatcher, JobHandler, WebhookJob, WorkQueue};
use crate::gateway::error::GatewayError;
use crate::line::{self, SIGNATURE_HEADER};
use crate::talk::{Query, TalkClient};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Name reported by the health probe.
pub const SERVICE_NAME: &str = "LINEBOT-API-TALK-A3RT";

/// Shared state for the HTTP handlers. Everything in it is immutable or internally synchronized.
#[derive(Clone)]
pub struct GatewayState {
    /// Channel secret for verifying `x-line-signature`.
    pub channel_secret: Arc<str>,
    /// Accepted webhook batches go here; workers run the dispatcher.
    pub queue: Arc<WorkQueue>,
    /// Used by `POST /talk`.
    pub talk: TalkClient,
}

impl GatewayState {
    pub fn new(channel_secret: impl Into<Arc<str>>, queue: Arc<WorkQueue>, talk: TalkClient) -> Self {
        Self {
            channel_secret: channel_secret.into(),
            queue,
            talk,
        }
    }
}

/// Routes: `GET /`, `POST /callback`, `POST /talk`.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/callback", post(callback))
        .route("/talk", post(talk))
        .with_state(state)
}

/// Run the gateway; binds to config.server.bind:config.server.port.
/// Fails at startup when any credential is missing. Blocks until shutdown (e.g. Ctrl+C),
/// then drains queued webhook batches before returning.
pub async fn run_gateway(config: Config) -> Result<()> {
    let creds = config.require_credentials()?;
    let dispatcher = Arc::new(Dispatcher::from_config(&config)?);
    let talk = dispatcher.talk_client().clone();
    let handler: Arc<dyn JobHandler> = dispatcher;
    let queue = Arc::new(
        WorkQueue::start(
            handler,
            config.dispatch.workers,
            config.dispatch.queue_capacity,
        )
        .with_submit_timeout(Duration::from_millis(config.dispatch.submit_timeout_ms)),
    );
    let state = GatewayState::new(creds.channel_secret, queue.clone(), talk);
    let app = router(state);

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    queue.shutdown().await;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a static health JSON (for probes). Reads no config or state.
async fn health_http() -> Json<serde_json::Value> {
    Json(json!({ "message": format!("{} Healthy!", SERVICE_NAME) }))
}

/// POST /callback: verifies the signature over the raw body, enqueues the batch, answers "ok".
/// Does not wait for the batch to be processed; a queue still full after the submit timeout
/// answers 503 so LINE's response window is never spent waiting on the provider.
async fn callback(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<&'static str>, GatewayError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Err(e) = line::verify(&state.channel_secret, &body, signature.as_deref()) {
        log::debug!("callback rejected: {}", e);
        return Err(GatewayError::InvalidSignature);
    }
    state
        .queue
        .submit(WebhookJob { body, signature })
        .await?;
    Ok(Json("ok"))
}

/// POST /talk: `{"query": "..."}` in, reply text (JSON string) out. Provider errors become 500.
async fn talk(
    State(state): State<GatewayState>,
    Json(query): Json<Query>,
) -> Result<Json<String>, GatewayError> {
    let reply = state.talk.talk(&query).await?;
    Ok(Json(reply))
}
