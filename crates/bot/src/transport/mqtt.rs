use core::time::Duration;
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow};
use async_trait::async_trait;
use plugin_core::Message;
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, Packet, QoS};
use tracing::{debug, info, warn};

use super::{Transport, shutdown_signal};
use crate::dispatch::{Dispatch, Dispatcher};

pub const INPUT_TOPIC: &str = "/gowon/input";
pub const OUTPUT_TOPIC: &str = "/gowon/output";

const DEFAULT_PORT: u16 = 1883;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Bus transport: every message the host publishes on [`INPUT_TOPIC`] is
/// offered to the dispatcher, replies go to [`OUTPUT_TOPIC`].
#[derive(Debug)]
pub struct MqttTransport {
    host: String,
    port: u16,
    client_id: String,
}

impl MqttTransport {
    /// `broker` is `host[:port]`, optionally with a `tcp://` or `mqtt://` scheme.
    pub fn new(broker: &str, client_id: impl Into<String>) -> Result<Self> {
        let (host, port) = parse_broker(broker)?;
        Ok(Self {
            host,
            port,
            client_id: client_id.into(),
        })
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn serve(self: Box<Self>, dispatcher: Arc<Dispatcher>) -> Result<()> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(KEEP_ALIVE);
        let (client, mut eventloop) = AsyncClient::new(options, 16);
        info!(host = %self.host, port = self.port, client_id = %self.client_id, "Connecting to MQTT broker");

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(topic = INPUT_TOPIC, "Connected; subscribing");
                        // sessions are clean, so every reconnect needs a fresh subscription
                        if let Err(e) = client.try_subscribe(INPUT_TOPIC, QoS::AtMostOnce) {
                            warn!(error = %e, "Failed to queue subscription");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let client = client.clone();
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move {
                            if let Some(reply) = reply_for(&dispatcher, &publish.payload).await
                                && let Err(e) = client
                                    .publish(OUTPUT_TOPIC, QoS::AtMostOnce, false, reply)
                                    .await
                            {
                                warn!(error = %e, "Failed to publish reply");
                            }
                        });
                    }
                    Ok(Event::Incoming(_) | Event::Outgoing(_)) => {}
                    Err(e) => {
                        warn!(error = %e, retry_in = ?RETRY_DELAY, "MQTT connection error");
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                },
            }
        }

        if client.try_disconnect().is_ok() {
            // drive the event loop until the disconnect has gone out
            let flushed = tokio::time::timeout(Duration::from_secs(1), async {
                while let Ok(event) = eventloop.poll().await {
                    if matches!(event, Event::Outgoing(Outgoing::Disconnect)) {
                        break;
                    }
                }
            })
            .await;
            debug!(flushed = flushed.is_ok(), "MQTT disconnect");
        }
        Ok(())
    }
}

/// Serialized reply for one bus payload, if any plugin answers it.
async fn reply_for(dispatcher: &Dispatcher, payload: &[u8]) -> Option<Vec<u8>> {
    let message: Message = match serde_json::from_slice(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Ignoring message that is not a gowon envelope");
            return None;
        }
    };

    let reply = match dispatcher.dispatch(message).await {
        Dispatch::Replied(reply) | Dispatch::Failed(reply) => reply,
        Dispatch::Ignored => return None,
    };
    match serde_json::to_vec(&reply) {
        Ok(body) => Some(body),
        Err(e) => {
            warn!(error = %e, "Failed to encode reply");
            None
        }
    }
}

fn parse_broker(broker: &str) -> Result<(String, u16)> {
    let trimmed = broker.trim();
    let address = trimmed
        .strip_prefix("tcp://")
        .or_else(|| trimmed.strip_prefix("mqtt://"))
        .unwrap_or(trimmed);

    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (
            host,
            port.parse::<u16>()
                .with_context(|| format!("invalid port in broker address {broker:?}"))?,
        ),
        None => (address, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(anyhow!("missing host in broker address {broker:?}"));
    }
    Ok((host.to_owned(), port))
}
