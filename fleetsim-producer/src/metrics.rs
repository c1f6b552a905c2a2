// Fleetsim Producer - Telemetry publisher for simulated sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the producer.
//!
//! This module defines all Prometheus metrics exposed on `/metrics` and
//! provides functions to update them from driver ticks.

use fleetsim::Tick;
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};
use tracing::warn;

lazy_static! {
    // ============================================================
    // Simulation Metrics
    // ============================================================

    /// Driver ticks processed.
    pub static ref TICKS_TOTAL: IntCounter = register_int_counter!(
        "fleetsim_ticks_total",
        "Total simulation ticks processed"
    ).unwrap();

    /// Emitted measurement values by measurement and engine phase.
    pub static ref READINGS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "fleetsim_readings_total",
        "Measurement values emitted, by measurement and phase",
        &["measurement", "phase"]
    ).unwrap();

    /// Persistent anomalies locked in.
    pub static ref ANOMALIES_STARTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "fleetsim_persistent_anomalies_started_total",
        "Persistent anomalies started, by measurement",
        &["measurement"]
    ).unwrap();

    /// Persistent anomalies cleared on expiry.
    pub static ref ANOMALIES_EXPIRED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "fleetsim_persistent_anomalies_expired_total",
        "Persistent anomalies expired, by measurement",
        &["measurement"]
    ).unwrap();

    /// Persistent anomalies active across the fleet.
    pub static ref ACTIVE_ANOMALIES: IntGauge = register_int_gauge!(
        "fleetsim_active_persistent_anomalies",
        "Persistent anomalies currently active across the fleet"
    ).unwrap();

    /// Records deliberately corrupted by the driver.
    pub static ref MALFORMED_RECORDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "fleetsim_malformed_records_total",
        "Records with a blank sensor id or shifted timestamp",
        &["kind"]
    ).unwrap();

    // ============================================================
    // Delivery Metrics
    // ============================================================

    /// Payloads accepted by the publisher.
    pub static ref RECORDS_PUBLISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "fleetsim_records_published_total",
        "Payloads accepted by the publisher (original or duplicate)",
        &["kind"]
    ).unwrap();

    /// Delivery failures by stage.
    pub static ref DELIVERY_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "fleetsim_delivery_errors_total",
        "Records that failed to encode or publish",
        &["stage"]
    ).unwrap();
}

/// Delivery attempt kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Original,
    Duplicate,
}

impl DeliveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryKind::Original => "original",
            DeliveryKind::Duplicate => "duplicate",
        }
    }
}

/// Stage at which a delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStage {
    Encode,
    Publish,
}

impl DeliveryStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStage::Encode => "encode",
            DeliveryStage::Publish => "publish",
        }
    }
}

/// Update simulation metrics from one driver tick.
pub fn record_tick(tick: &Tick, active_anomalies: usize) {
    TICKS_TOTAL.inc();

    for (measurement, step) in tick.reading.steps() {
        READINGS_TOTAL
            .with_label_values(&[measurement.as_str(), step.phase.as_str()])
            .inc();
        if step.anomaly_started {
            ANOMALIES_STARTED_TOTAL
                .with_label_values(&[measurement.as_str()])
                .inc();
        }
        if step.anomaly_expired {
            ANOMALIES_EXPIRED_TOTAL
                .with_label_values(&[measurement.as_str()])
                .inc();
        }
    }

    if !tick.record.has_sensor_id() {
        MALFORMED_RECORDS_TOTAL
            .with_label_values(&["blank_id"])
            .inc();
    }
    if tick.jitter_ms != 0 {
        MALFORMED_RECORDS_TOTAL.with_label_values(&["jitter"]).inc();
    }

    ACTIVE_ANOMALIES.set(active_anomalies as i64);
}

/// Count a payload accepted by the publisher.
pub fn record_published(kind: DeliveryKind) {
    RECORDS_PUBLISHED_TOTAL
        .with_label_values(&[kind.as_str()])
        .inc();
}

/// Count a failed delivery.
pub fn record_delivery_error(stage: DeliveryStage) {
    DELIVERY_ERRORS_TOTAL
        .with_label_values(&[stage.as_str()])
        .inc();
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
