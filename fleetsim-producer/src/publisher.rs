// Fleetsim Producer - Telemetry publisher for simulated sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Publishers hand encoded payloads to a messaging topic.
//!
//! [`MqttPublisher`] queues payloads on an MQTT client whose event loop
//! runs in a background task. Publishing never waits on the queue: a full
//! queue, which is what an unreachable broker leads to, is an error. [`LogPublisher`] is the dry-run sink.
//! [`MemoryPublisher`] keeps payloads in memory for tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS, Transport};
#[cfg(test)]
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PublishError;

/// Delay before polling the MQTT event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Capacity of the MQTT client request queue.
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Sink for encoded payloads.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one payload to `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub keep_alive: Duration,
}

impl MqttSettings {
    /// Build client options from the settings.
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        if self.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

/// Publishes payloads to an MQTT broker with at-least-once delivery.
pub struct MqttPublisher {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
    closed: AtomicBool,
}

impl MqttPublisher {
    /// Create the client and spawn its event loop.
    ///
    /// Connection failures are logged by the event loop task and retried;
    /// publishes queue up until the client request queue is full, then fail.
    pub fn connect(settings: &MqttSettings) -> Self {
        let (client, mut event_loop) = AsyncClient::new(settings.options(), REQUEST_QUEUE_CAPACITY);
        info!(
            host = %settings.host,
            port = settings.port,
            client_id = %settings.client_id,
            tls = settings.tls,
            "Connecting to MQTT broker"
        );

        let event_loop = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(event) => debug!(?event, "MQTT event"),
                    Err(e) => {
                        warn!(error = %e, "MQTT connection error, retrying");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Self {
            client,
            event_loop,
            closed: AtomicBool::new(false),
        }
    }

    /// Disconnect from the broker and stop the event loop.
    ///
    /// Later publishes fail with [`PublishError::Closed`].
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Err(e) = self.client.try_disconnect() {
            warn!(error = %e, "MQTT disconnect failed");
        }
        self.event_loop.abort();
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

/// Dry-run publisher that only logs payloads.
#[derive(Debug, Default)]
pub struct LogPublisher {
    published: AtomicU64,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads logged so far.
    #[cfg(test)]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let count = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        info!(topic, bytes = payload.len(), count, "Dry run: payload not sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps published payloads in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
    closed: AtomicBool,
}

#[cfg(test)]
impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every `(topic, payload)` published so far.
    pub async fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.lock().await.clone()
    }

    /// Reject every further publish.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }
        self.messages.lock().await.push((topic.to_string(), payload));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
