use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse as _, Response},
    routing::{get, post},
};
use plugin_core::Message;
use tokio::net::TcpListener;
use tracing::info;

use super::{Transport, shutdown_signal};
use crate::dispatch::{Dispatch, Dispatcher};

/// Webhook transport: the host POSTs each command to `/message` and reads the
/// reply from the response body.
#[derive(Debug)]
pub struct HttpTransport {
    listen: String,
}

impl HttpTransport {
    pub fn new(listen: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn serve(self: Box<Self>, dispatcher: Arc<Dispatcher>) -> Result<()> {
        let listener = TcpListener::bind(&self.listen)
            .await
            .with_context(|| format!("binding http listener on {}", self.listen))?;
        info!(addr = %self.listen, "Listening for gowon messages");

        axum::serve(listener, router(dispatcher))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("http server terminated")
    }
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/message", post(message_handler))
        .route("/help", get(help_handler))
        .with_state(dispatcher)
}

async fn message_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(message): Json<Message>,
) -> Response {
    match dispatcher.dispatch(message).await {
        Dispatch::Replied(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Dispatch::Failed(reply) => (StatusCode::INTERNAL_SERVER_ERROR, Json(reply)).into_response(),
        Dispatch::Ignored => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn help_handler(State(dispatcher): State<Arc<Dispatcher>>) -> Response {
    match dispatcher.help().await {
        Some(help) => Json(help).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
