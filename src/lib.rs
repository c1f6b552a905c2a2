//! # fleetsim - IoT sensor fleet simulator
//!
//! Synthesizes realistic telemetry for a fleet of simulated sensors, for
//! load-testing analytics and anomaly-detection pipelines.
//!
//! ## Key Features
//!
//! - **Normal drift**: bounded random walk clamped to each measurement's range
//! - **Transient anomalies**: one-off excursions that leave state untouched
//! - **Persistent anomalies**: hour-long excursions locked outside the range
//! - **Injectable randomness**: scripted draws for deterministic tests
//!
//! ## Quick Start
//!
//! ```rust
//! use fleetsim::{FleetConfig, TickDriver};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut driver = TickDriver::new(FleetConfig::default_fleet());
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! let tick = driver.tick(1_706_745_600_000, &mut rng).unwrap();
//! println!("{:?}", tick.record);
//! if tick.duplicate {
//!     // publish the record a second time
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Per-sensor measurement ranges
//! - [`state`]: Mutable measurement and sensor state
//! - [`engine`]: The measurement decision procedure
//! - [`simulation`]: Per-sensor state registry
//! - [`driver`]: Sensor selection and record corruption
//! - [`record`]: Assembled records and their Avro schema
//! - [`random`]: Uniform random sources

// Modules
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod random;
pub mod record;
pub mod simulation;
pub mod state;

// Re-exports for convenient access
pub use config::{FleetConfig, Measurement, RangeConfig, SensorProfile};
pub use driver::{DriverConfig, Tick, TickDriver};
pub use engine::{Engine, EngineConfig, Phase, Step};
pub use error::{Result, SimError};
pub use random::{ScriptedSource, UniformSource};
pub use record::{SensorRecord, SENSOR_DATA_SCHEMA};
pub use simulation::{SensorReading, Simulation, SimulationStats};
pub use state::{AnomalyRecord, MeasurementState, SensorState, TimestampMs};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
