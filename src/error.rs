//! Error types for fleetsim
//!
//! The simulation engine itself is total and never fails. Errors only
//! arise while building or loading configuration and while addressing
//! sensors that the fleet does not know about.

use thiserror::Error;

/// Result type alias for fleetsim operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Main error type for fleetsim operations
#[derive(Error, Debug)]
pub enum SimError {
    /// Range bounds are not ordered or not finite
    #[error("Invalid range for {sensor}/{measurement}: min {min} must be below max {max}")]
    InvalidRange {
        sensor: String,
        measurement: String,
        min: f64,
        max: f64,
    },

    /// Margin is not strictly positive
    #[error("Invalid margin for {sensor}/{measurement}: {margin} (must be > 0)")]
    InvalidMargin {
        sensor: String,
        measurement: String,
        margin: f64,
    },

    /// Probability outside [0, 1]
    #[error("Invalid probability for {name}: {value} (must be within [0, 1])")]
    InvalidProbability { name: &'static str, value: f64 },

    /// Other engine or driver parameter out of bounds
    #[error("Invalid engine configuration: {0}")]
    InvalidEngineConfig(String),

    /// Fleet without sensors
    #[error("Fleet configuration contains no sensors")]
    EmptyFleet,

    /// Sensor id not present in the fleet
    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    /// I/O error while reading a configuration file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration document
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Check that a probability lies within [0, 1].
pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::InvalidProbability { name, value })
    }
}
