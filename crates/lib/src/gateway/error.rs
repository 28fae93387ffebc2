//! HTTP error responses: `{"detail": ...}` with a matching status.

use crate::dispatch::QueueError;
use crate::talk::TalkError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Dispatcher unavailable")]
    Unavailable,
    #[error("Dispatcher busy")]
    Busy,
    #[error(transparent)]
    Talk(#[from] TalkError),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidSignature => StatusCode::BAD_REQUEST,
            GatewayError::Unavailable | GatewayError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Talk(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueueError> for GatewayError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Closed => GatewayError::Unavailable,
            QueueError::Full => GatewayError::Busy,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
