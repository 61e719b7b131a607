mod http;
mod mqtt;

pub use http::HttpTransport;
pub use mqtt::MqttTransport;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;

/// How messages reach the module and how replies leave it.
#[async_trait]
pub trait Transport: Send {
    fn name(&self) -> &'static str;

    /// Run until shutdown is requested or the transport fails for good.
    async fn serve(self: Box<Self>, dispatcher: Arc<Dispatcher>) -> Result<()>;
}

/// Resolves on Ctrl+C. If the handler cannot be installed it never resolves.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        core::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
