//! HTTP surface: Telegram webhook plus liveness probes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::api::Update;
use crate::application::DownloadCoordinator;
use crate::domain::ChatError;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid update payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Handler(#[from] ChatError),

    #[error("update handler aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Body returned for every webhook call; the HTTP status is always 200.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookAck {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(err: &WebhookError) -> Self {
        Self {
            ok: false,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct WebhookState {
    secret: Arc<str>,
    coordinator: Arc<DownloadCoordinator>,
}

impl WebhookState {
    pub fn new(secret: &str, coordinator: Arc<DownloadCoordinator>) -> Self {
        Self {
            secret: Arc::from(secret),
            coordinator,
        }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(handle_health))
        .route("/kaithhealthcheck", get(handle_health))
        .route("/webhook/{secret}", post(handle_webhook))
        .with_state(state)
}

/// GET / and /kaithhealthcheck
async fn handle_health() -> &'static str {
    "OK"
}

/// POST /webhook/{secret}
async fn handle_webhook(
    State(state): State<WebhookState>,
    Path(secret): Path<String>,
    body: Bytes,
) -> Response {
    if secret != *state.secret {
        return StatusCode::NOT_FOUND.into_response();
    }

    let ack = match dispatch(&state, &body).await {
        Ok(()) => WebhookAck::ok(),
        Err(err) => {
            error!("Error processing webhook: {err}");
            WebhookAck::failed(&err)
        }
    };
    (StatusCode::OK, Json(ack)).into_response()
}

async fn dispatch(state: &WebhookState, body: &[u8]) -> Result<(), WebhookError> {
    let update: Update = serde_json::from_slice(body)?;
    let coordinator = state.coordinator.clone();
    // Spawned so a dropped connection cannot cancel a relay halfway through.
    tokio::spawn(async move { coordinator.handle_update(update).await }).await??;
    Ok(())
}
