// Fleetsim Producer - Telemetry publisher for simulated sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the producer

use thiserror::Error;

/// Errors while encoding a record
#[derive(Error, Debug)]
pub enum CodecError {
    /// Schema could not be parsed
    #[error("Invalid Avro schema: {0}")]
    Schema(apache_avro::Error),

    /// Record does not fit the schema
    #[error("Avro encoding failed: {0}")]
    Avro(apache_avro::Error),

    /// JSON serialization failed
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors while handing a payload to the broker
#[derive(Error, Debug)]
pub enum PublishError {
    /// Client request queue rejected the publish
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Publisher has been shut down
    #[error("Publisher closed")]
    Closed,
}

/// Errors while registering the record schema
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Request could not be sent or the body could not be read
    #[error("Schema registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Registry answered with a non-success status
    #[error("Schema registry error ({status}): {body}")]
    Status { status: u16, body: String },

    /// Registry answered without a schema id
    #[error("Invalid schema registry response: {0}")]
    InvalidResponse(serde_json::Error),
}

/// Top-level error type for the producer process
#[derive(Error, Debug)]
pub enum ProducerError {
    /// Simulation or fleet configuration error
    #[error("Simulation error: {0}")]
    Sim(#[from] fleetsim::SimError),

    /// Encoding error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Schema registration error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Publishing error
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid command line or environment configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for producer operations
pub type Result<T> = std::result::Result<T, ProducerError>;
