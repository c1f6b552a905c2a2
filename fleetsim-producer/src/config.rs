// Fleetsim Producer - Telemetry publisher for simulated sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fleetsim::FleetConfig;

use crate::codec::PayloadFormat;
use crate::error::{ProducerError, Result};
use crate::publisher::MqttSettings;
use crate::registry::RegistryCredentials;

/// Keep-alive interval for the MQTT session.
const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Fleetsim telemetry producer
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// MQTT broker host
    #[arg(long, env = "FLEETSIM_BROKER_HOST", default_value = "localhost")]
    pub broker_host: String,

    /// MQTT broker port
    #[arg(long, env = "FLEETSIM_BROKER_PORT", default_value = "1883")]
    pub broker_port: u16,

    /// MQTT client id
    #[arg(long, env = "FLEETSIM_CLIENT_ID", default_value = "fleetsim-producer")]
    pub client_id: String,

    /// Broker username
    #[arg(long, env = "FLEETSIM_USERNAME")]
    pub username: Option<String>,

    /// Broker password
    #[arg(long, env = "FLEETSIM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Connect to the broker over TLS
    #[arg(long, env = "FLEETSIM_TLS")]
    pub tls: bool,

    /// Topic records are published to
    #[arg(short, long, env = "FLEETSIM_TOPIC", default_value = "sensor-data")]
    pub topic: String,

    /// Payload format
    #[arg(long, value_enum, env = "FLEETSIM_FORMAT", default_value_t = PayloadFormat::Avro)]
    pub format: PayloadFormat,

    /// Schema id written into Avro frames, skipping registration
    #[arg(long, env = "FLEETSIM_SCHEMA_ID")]
    pub schema_id: Option<u32>,

    /// Schema registry the Avro schema is registered with
    #[arg(long, env = "SCHEMA_REGISTRY_URL")]
    pub schema_registry_url: Option<String>,

    /// Schema registry API key (basic auth user)
    #[arg(long, env = "SCHEMA_REGISTRY_API_KEY")]
    pub schema_registry_api_key: Option<String>,

    /// Schema registry API secret (basic auth password)
    #[arg(long, env = "SCHEMA_REGISTRY_API_SECRET", hide_env_values = true)]
    pub schema_registry_api_secret: Option<String>,

    /// Registry subject (defaults to `<topic>-value`)
    #[arg(long, env = "FLEETSIM_SCHEMA_SUBJECT")]
    pub schema_subject: Option<String>,

    /// JSON file with per-sensor ranges (built-in fleet when omitted)
    #[arg(short, long, env = "FLEETSIM_SENSORS")]
    pub sensors: Option<PathBuf>,

    /// Milliseconds between ticks
    #[arg(short, long, env = "FLEETSIM_INTERVAL_MS", default_value = "1000")]
    pub interval_ms: u64,

    /// Seed for reproducible runs
    #[arg(long, env = "FLEETSIM_SEED")]
    pub seed: Option<u64>,

    /// Stop after this many ticks
    #[arg(long, env = "FLEETSIM_MAX_TICKS")]
    pub max_ticks: Option<u64>,

    /// Log payloads instead of publishing them
    #[arg(long, env = "FLEETSIM_DRY_RUN")]
    pub dry_run: bool,

    /// Port for /metrics, /health and /status (disabled when omitted)
    #[arg(long, env = "FLEETSIM_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FLEETSIM_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Reject settings the producer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(ProducerError::InvalidConfig(
                "interval must be at least 1 ms".to_string(),
            ));
        }
        if self.topic.trim().is_empty() {
            return Err(ProducerError::InvalidConfig(
                "topic must not be empty".to_string(),
            ));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ProducerError::InvalidConfig(
                "password given without a username".to_string(),
            ));
        }
        if self.format == PayloadFormat::Avro
            && self.schema_id.is_none()
            && self.schema_registry_url.is_none()
        {
            return Err(ProducerError::InvalidConfig(
                "avro payloads need a schema registry url or a schema id".to_string(),
            ));
        }
        if self.schema_registry_api_secret.is_some() && self.schema_registry_api_key.is_none() {
            return Err(ProducerError::InvalidConfig(
                "schema registry secret given without an api key".to_string(),
            ));
        }
        if self.max_ticks == Some(0) {
            return Err(ProducerError::InvalidConfig(
                "max ticks must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Tick interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Broker connection settings.
    pub fn mqtt_settings(&self) -> MqttSettings {
        MqttSettings {
            host: self.broker_host.clone(),
            port: self.broker_port,
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            tls: self.tls,
            keep_alive: MQTT_KEEP_ALIVE,
        }
    }

    /// Registry subject for the record schema.
    pub fn schema_subject(&self) -> String {
        self.schema_subject
            .clone()
            .unwrap_or_else(|| format!("{}-value", self.topic))
    }

    /// Registry basic auth credentials, if an API key is set.
    pub fn registry_credentials(&self) -> Option<RegistryCredentials> {
        self.schema_registry_api_key
            .as_ref()
            .map(|api_key| RegistryCredentials {
                api_key: api_key.clone(),
                api_secret: self.schema_registry_api_secret.clone(),
            })
    }

    /// Load the sensor fleet from `--sensors`, or the built-in fleet.
    pub fn load_fleet(&self) -> Result<FleetConfig> {
        match &self.sensors {
            Some(path) => Ok(FleetConfig::from_json_file(path)?),
            None => Ok(FleetConfig::default_fleet()),
        }
    }
}
