//! Measurement simulation engine.
//!
//! The engine decides the next emitted value of a measurement from its
//! [`MeasurementState`] and [`RangeConfig`]. Each call to [`Engine::step`]
//! is one transition of a small state machine:
//!
//! ```text
//!                 ┌──────────── expired ────────────┐
//!                 v                                 │
//!   ┌────────┐  p < anomaly  ┌───────────────────┐  │
//!   │ Normal │ ────────────> │ TransientExcursion │  │
//!   └────────┘               └───────────────────┘  │
//!        │      q < persistent                      │
//!        └───────────────────> PersistentAnomaly ───┘
//! ```
//!
//! An active persistent anomaly is random-walked outside the range until
//! its end time. On the first tick at or after the end time the anomaly
//! is cleared and the same call re-rolls the normal/anomaly decision, so
//! an expiry tick may emit a fresh anomaly.
//!
//! All operations are total: they never fail and never block.

use crate::config::RangeConfig;
use crate::error::{check_probability, Result, SimError};
use crate::random::UniformSource;
use crate::state::{AnomalyRecord, MeasurementState, TimestampMs};

/// Probability that a tick produces an anomaly instead of a normal value.
pub const DEFAULT_ANOMALY_PROBABILITY: f64 = 0.10;

/// Probability, given an anomaly, that it becomes persistent.
pub const DEFAULT_PERSISTENT_PROBABILITY: f64 = 0.03;

/// Lifetime of a persistent anomaly: one hour.
pub const DEFAULT_PERSISTENT_DURATION_MS: i64 = 3_600_000;

/// Normal random walk step, as a fraction of `max - min`.
pub const DEFAULT_NORMAL_STEP_FRACTION: f64 = 0.05;

/// Persistent anomaly random walk step, as a fraction of the margin.
pub const DEFAULT_ANOMALY_STEP_FRACTION: f64 = 0.05;

/// Distance outside the range a persistent anomaly is pushed back to.
pub const DEFAULT_EDGE_OFFSET: f64 = 0.1;

/// Engine tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Probability of the anomaly branch per tick.
    pub anomaly_probability: f64,
    /// Conditional probability that an anomaly becomes persistent.
    pub persistent_probability: f64,
    /// How long a persistent anomaly lasts.
    pub persistent_duration_ms: i64,
    /// Normal walk magnitude relative to the range span.
    pub normal_step_fraction: f64,
    /// Persistent anomaly walk magnitude relative to the margin.
    pub anomaly_step_fraction: f64,
    /// Offset used when a persistent anomaly drifts back into range.
    pub edge_offset: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anomaly_probability: DEFAULT_ANOMALY_PROBABILITY,
            persistent_probability: DEFAULT_PERSISTENT_PROBABILITY,
            persistent_duration_ms: DEFAULT_PERSISTENT_DURATION_MS,
            normal_step_fraction: DEFAULT_NORMAL_STEP_FRACTION,
            anomaly_step_fraction: DEFAULT_ANOMALY_STEP_FRACTION,
            edge_offset: DEFAULT_EDGE_OFFSET,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the anomaly probability.
    pub fn with_anomaly_probability(mut self, probability: f64) -> Self {
        self.anomaly_probability = probability;
        self
    }

    /// Set the persistent probability.
    pub fn with_persistent_probability(mut self, probability: f64) -> Self {
        self.persistent_probability = probability;
        self
    }

    /// Set the persistent anomaly duration.
    pub fn with_persistent_duration_ms(mut self, duration_ms: i64) -> Self {
        self.persistent_duration_ms = duration_ms;
        self
    }

    /// Set the normal walk fraction.
    pub fn with_normal_step_fraction(mut self, fraction: f64) -> Self {
        self.normal_step_fraction = fraction;
        self
    }

    /// Set the persistent anomaly walk fraction.
    pub fn with_anomaly_step_fraction(mut self, fraction: f64) -> Self {
        self.anomaly_step_fraction = fraction;
        self
    }

    /// Set the offset a persistent anomaly is re-anchored at.
    pub fn with_edge_offset(mut self, offset: f64) -> Self {
        self.edge_offset = offset;
        self
    }

    /// Check probabilities and magnitudes.
    pub fn validate(&self) -> Result<()> {
        check_probability("anomaly_probability", self.anomaly_probability)?;
        check_probability("persistent_probability", self.persistent_probability)?;
        if self.persistent_duration_ms <= 0 {
            return Err(SimError::InvalidEngineConfig(format!(
                "persistent_duration_ms must be positive, got {}",
                self.persistent_duration_ms
            )));
        }
        for (name, value) in [
            ("normal_step_fraction", self.normal_step_fraction),
            ("anomaly_step_fraction", self.anomaly_step_fraction),
            ("edge_offset", self.edge_offset),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidEngineConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Which branch produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Normal random walk; the stored normal value was updated.
    Normal,
    /// One-off excursion; stored state unchanged.
    TransientExcursion,
    /// Value of a persistent anomaly, either just started or ongoing.
    PersistentAnomaly,
}

impl Phase {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Normal => "normal",
            Phase::TransientExcursion => "transient",
            Phase::PersistentAnomaly => "persistent",
        }
    }
}

/// Outcome of one engine transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// Emitted value.
    pub value: f64,
    /// Branch that produced the value.
    pub phase: Phase,
    /// A persistent anomaly was locked in on this step.
    pub anomaly_started: bool,
    /// A persistent anomaly expired and was cleared on this step.
    pub anomaly_expired: bool,
}

/// The measurement simulation engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Engine with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with custom parameters.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Engine parameters.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Random-walk a persistent anomaly, keeping it outside the range.
    ///
    /// Mutates `record.value` and returns the new value.
    pub fn advance_persistent_anomaly<R: UniformSource + ?Sized>(
        &self,
        record: &mut AnomalyRecord,
        range: &RangeConfig,
        rng: &mut R,
    ) -> f64 {
        let step = rng.walk_step(range.margin * self.config.anomaly_step_fraction);
        let mut value = record.value + step;
        if record.is_below {
            if value >= range.min {
                value = range.min - self.config.edge_offset;
            }
        } else if value <= range.max {
            value = range.max + self.config.edge_offset;
        }
        record.value = value;
        value
    }

    /// Random-walk a normal value and clamp it to `[min, max]`.
    pub fn next_normal<R: UniformSource + ?Sized>(
        &self,
        old_value: f64,
        range: &RangeConfig,
        rng: &mut R,
    ) -> f64 {
        let step = rng.walk_step(range.span() * self.config.normal_step_fraction);
        (old_value + step).clamp(range.min, range.max)
    }

    /// One-off anomaly at least one margin away from `normal_value`.
    ///
    /// The side is drawn first (below on a draw under 0.5), then the
    /// excursion factor.
    pub fn transient_anomaly<R: UniformSource + ?Sized>(
        &self,
        normal_value: f64,
        range: &RangeConfig,
        rng: &mut R,
    ) -> f64 {
        let below = rng.chance(0.5);
        let excursion = range.margin * (1.0 + rng.next_uniform());
        if below {
            normal_value - excursion
        } else {
            normal_value + excursion
        }
    }

    /// Advance a measurement by one tick and return the emitted value.
    pub fn update<R: UniformSource + ?Sized>(
        &self,
        state: &mut MeasurementState,
        range: &RangeConfig,
        now: TimestampMs,
        rng: &mut R,
    ) -> f64 {
        self.step(state, range, now, rng).value
    }

    /// Advance a measurement by one tick, reporting which branch ran.
    pub fn step<R: UniformSource + ?Sized>(
        &self,
        state: &mut MeasurementState,
        range: &RangeConfig,
        now: TimestampMs,
        rng: &mut R,
    ) -> Step {
        if let Some(record) = state.anomaly.as_mut() {
            if !record.is_expired(now) {
                let value = self.advance_persistent_anomaly(record, range, rng);
                return Step {
                    value,
                    phase: Phase::PersistentAnomaly,
                    anomaly_started: false,
                    anomaly_expired: false,
                };
            }
        }

        // Anything still recorded here has expired: clear it and re-roll.
        let anomaly_expired = state.anomaly.take().is_some();
        let mut step = self.roll(state, range, now, rng);
        step.anomaly_expired = anomaly_expired;
        step
    }

    /// Fresh normal/anomaly decision for a measurement with no active anomaly.
    fn roll<R: UniformSource + ?Sized>(
        &self,
        state: &mut MeasurementState,
        range: &RangeConfig,
        now: TimestampMs,
        rng: &mut R,
    ) -> Step {
        if !rng.chance(self.config.anomaly_probability) {
            state.normal = self.next_normal(state.normal, range, rng);
            return Step {
                value: state.normal,
                phase: Phase::Normal,
                anomaly_started: false,
                anomaly_expired: false,
            };
        }

        let value = self.transient_anomaly(state.normal, range, rng);
        if rng.chance(self.config.persistent_probability) {
            state.anomaly = Some(AnomalyRecord {
                value,
                end_time: now + self.config.persistent_duration_ms,
                is_below: value < state.normal,
            });
            return Step {
                value,
                phase: Phase::PersistentAnomaly,
                anomaly_started: true,
                anomaly_expired: false,
            };
        }

        Step {
            value,
            phase: Phase::TransientExcursion,
            anomaly_started: false,
            anomaly_expired: false,
        }
    }
}
