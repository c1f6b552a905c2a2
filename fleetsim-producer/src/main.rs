// Fleetsim Producer - Telemetry publisher for simulated sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Fleetsim Producer
//!
//! Publishes simulated IoT sensor telemetry to an MQTT topic.
//!
//! ## Usage
//!
//! ```bash
//! # Register the schema and publish Avro records every second
//! fleetsim-producer --broker-host localhost --schema-registry-url http://localhost:8081
//!
//! # Reproducible dry run with JSON payloads and a metrics endpoint
//! fleetsim-producer --dry-run --format json --seed 42 --metrics-port 9100
//! ```

mod codec;
mod config;
mod error;
mod metrics;
mod publisher;
mod registry;
mod runner;
mod server;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use fleetsim::TickDriver;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use codec::{AvroCodec, PayloadFormat, RecordCodec};
use config::Args;
use error::Result;
use publisher::{LogPublisher, MqttPublisher, Publisher};
use registry::SchemaRegistry;
use runner::Producer;
use server::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Fleetsim Producer v{}", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Producer failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    args.validate()?;

    let fleet = args.load_fleet()?;
    info!(
        sensors = fleet.len(),
        source = %args
            .sensors
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string()),
        "Fleet loaded"
    );

    let codec = match args.format {
        PayloadFormat::Avro => RecordCodec::Avro(AvroCodec::new(resolve_schema_id(&args).await?)?),
        PayloadFormat::Json => RecordCodec::Json,
    };

    let mqtt = if args.dry_run {
        None
    } else {
        Some(Arc::new(MqttPublisher::connect(&args.mqtt_settings())))
    };
    let publisher: Arc<dyn Publisher> = match &mqtt {
        Some(client) => Arc::clone(client) as Arc<dyn Publisher>,
        None => {
            info!("Dry run, payloads will be logged only");
            Arc::new(LogPublisher::new())
        }
    };

    let rng = match args.seed {
        Some(seed) => {
            info!(seed, "Using fixed seed");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let sensor_count = fleet.len();
    let format = codec.name();
    let schema_id = codec.schema_id();
    let mut producer = Producer::new(
        TickDriver::new(fleet),
        codec,
        publisher,
        args.topic.clone(),
        rng,
    )
    .with_interval(args.interval())
    .with_max_ticks(args.max_ticks);

    let server = args.metrics_port.map(|port| {
        let state = Arc::new(AppState::new(
            producer.state(),
            args.topic.clone(),
            format,
            schema_id,
            sensor_count,
        ));
        tokio::spawn(async move {
            if let Err(e) = server::serve(port, state).await {
                warn!(port, error = %e, "Metrics server stopped");
            }
        })
    });

    let result = producer.run(shutdown_signal()).await;

    if let Some(client) = mqtt {
        client.shutdown();
    }
    if let Some(server) = server {
        server.abort();
    }
    result
}

/// Schema id from `--schema-id`, or from registering with the registry.
async fn resolve_schema_id(args: &Args) -> Result<u32> {
    if let Some(schema_id) = args.schema_id {
        info!(schema_id, "Using configured schema id");
        return Ok(schema_id);
    }
    let url = args.schema_registry_url.as_deref().ok_or_else(|| {
        error::ProducerError::InvalidConfig("no schema registry url".to_string())
    })?;
    let registry = SchemaRegistry::new(url, args.registry_credentials());
    Ok(registry
        .register(&args.schema_subject(), fleetsim::SENSOR_DATA_SCHEMA)
        .await?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
