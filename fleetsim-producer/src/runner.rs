// Fleetsim Producer - Telemetry publisher for simulated sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Tick loop that drives the simulation and publishes records.
//!
//! Each tick selects a sensor, updates its four measurements, encodes the
//! record and hands it to the publisher. Encoding and publishing failures
//! are logged and counted; the loop keeps going.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fleetsim::{Tick, TickDriver, TimestampMs};
use rand::rngs::StdRng;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::codec::RecordCodec;
use crate::error::Result;
use crate::metrics::{self, DeliveryKind, DeliveryStage};
use crate::publisher::Publisher;

/// Producer progress shared with the status endpoint.
#[derive(Debug)]
pub struct ProducerState {
    /// Whether the tick loop is running.
    pub running: AtomicBool,
    /// Ticks processed.
    pub ticks: AtomicU64,
    /// Payloads accepted by the publisher, duplicates included.
    pub published: AtomicU64,
    /// Ticks flagged for duplicate delivery.
    pub duplicates: AtomicU64,
    /// Encode or publish failures.
    pub errors: AtomicU64,
    /// Persistent anomalies active after the last tick.
    pub active_anomalies: AtomicUsize,
    /// Sensors initialized so far.
    pub sensors_seen: AtomicUsize,
}

impl Default for ProducerState {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            published: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            active_anomalies: AtomicUsize::new(0),
            sensors_seen: AtomicUsize::new(0),
        }
    }
}

impl ProducerState {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }
}

/// Result of one producer tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// The driver tick.
    pub tick: Tick,
    /// Payloads the publisher accepted (0, 1 or 2).
    pub published: u32,
}

/// Drives a [`TickDriver`] and publishes every record it produces.
pub struct Producer {
    driver: TickDriver,
    codec: RecordCodec,
    publisher: Arc<dyn Publisher>,
    topic: String,
    rng: StdRng,
    state: Arc<ProducerState>,
    interval: Duration,
    max_ticks: Option<u64>,
}

impl Producer {
    /// Create a producer publishing to `topic` once per second.
    pub fn new(
        driver: TickDriver,
        codec: RecordCodec,
        publisher: Arc<dyn Publisher>,
        topic: impl Into<String>,
        rng: StdRng,
    ) -> Self {
        Self {
            driver,
            codec,
            publisher,
            topic: topic.into(),
            rng,
            state: Arc::new(ProducerState::default()),
            interval: Duration::from_secs(1),
            max_ticks: None,
        }
    }

    /// Set the time between ticks.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop after `max_ticks` ticks.
    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Shared progress counters.
    pub fn state(&self) -> Arc<ProducerState> {
        Arc::clone(&self.state)
    }

    /// Run one tick at `now`.
    ///
    /// Only driver errors are returned; delivery failures are counted.
    pub async fn run_tick(&mut self, now: TimestampMs) -> Result<TickReport> {
        let tick = self.driver.tick(now, &mut self.rng)?;

        let simulation = self.driver.simulation();
        let active = simulation.active_anomalies();
        metrics::record_tick(&tick, active);
        self.state.ticks.fetch_add(1, Ordering::SeqCst);
        self.state.active_anomalies.store(active, Ordering::SeqCst);
        self.state
            .sensors_seen
            .store(simulation.initialized_sensors(), Ordering::SeqCst);

        debug!(
            sensor_id = %tick.sensor_id,
            record_id = %tick.record.sensor_id,
            timestamp = tick.record.timestamp,
            jitter_ms = tick.jitter_ms,
            duplicate = tick.duplicate,
            anomalous = tick.reading.is_anomalous(),
            "Tick"
        );

        let payload = match self.codec.encode(&tick.record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(sensor_id = %tick.sensor_id, error = %e, "Failed to encode record");
                metrics::record_delivery_error(DeliveryStage::Encode);
                self.state.errors.fetch_add(1, Ordering::SeqCst);
                return Ok(TickReport { tick, published: 0 });
            }
        };

        let mut published = 0;
        if tick.duplicate {
            self.state.duplicates.fetch_add(1, Ordering::SeqCst);
            if self.deliver(payload.clone(), DeliveryKind::Original).await {
                published += 1;
            }
            if self.deliver(payload, DeliveryKind::Duplicate).await {
                published += 1;
            }
        } else if self.deliver(payload, DeliveryKind::Original).await {
            published += 1;
        }

        Ok(TickReport { tick, published })
    }

    async fn deliver(&self, payload: Vec<u8>, kind: DeliveryKind) -> bool {
        match self.publisher.publish(&self.topic, payload).await {
            Ok(()) => {
                metrics::record_published(kind);
                self.state.published.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(e) => {
                warn!(
                    publisher = self.publisher.name(),
                    topic = %self.topic,
                    kind = kind.as_str(),
                    error = %e,
                    "Failed to publish record"
                );
                metrics::record_delivery_error(DeliveryStage::Publish);
                self.state.errors.fetch_add(1, Ordering::SeqCst);
                false
            }
        }
    }

    /// Tick on the configured interval until `shutdown` resolves or the
    /// tick limit is reached.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.state.running.store(true, Ordering::SeqCst);
        info!(
            topic = %self.topic,
            format = self.codec.name(),
            publisher = self.publisher.name(),
            interval_ms = self.interval.as_millis() as u64,
            sensors = self.driver.simulation().fleet().len(),
            "Starting producer"
        );

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                _ = ticker.tick() => {}
            }

            let now = Utc::now().timestamp_millis();
            let report = tokio::select! {
                report = self.run_tick(now) => report,
                _ = &mut shutdown => {
                    info!("Shutdown requested during a tick");
                    break Ok(());
                }
            };
            match report {
                Ok(report) if report.published == 0 => {
                    debug!(sensor_id = %report.tick.sensor_id, "No payload delivered this tick");
                }
                Ok(_) => {}
                Err(e) => break Err(e),
            }

            if let Some(max) = self.max_ticks {
                if self.state.ticks() >= max {
                    info!(ticks = max, "Tick limit reached");
                    break Ok(());
                }
            }
        };

        self.state.running.store(false, Ordering::SeqCst);
        info!(
            ticks = self.state.ticks(),
            published = self.state.published(),
            duplicates = self.state.duplicates(),
            errors = self.state.errors(),
            sensors_seen = self.driver.simulation().initialized_sensors(),
            "Producer stopped"
        );
        result
    }
}
