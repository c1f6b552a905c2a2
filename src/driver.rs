//! Tick driver: one sensor per tick, assembled into a record.
//!
//! The driver is the only place that deliberately corrupts output. With
//! small probabilities it blanks the sensor id, shifts the record
//! timestamp and marks the record for duplicate delivery. The engine
//! always sees the true `now`.

use crate::config::FleetConfig;
use crate::engine::Engine;
use crate::error::{check_probability, Result, SimError};
use crate::random::UniformSource;
use crate::record::SensorRecord;
use crate::simulation::{SensorReading, Simulation};
use crate::state::TimestampMs;

/// Driver corruption parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfig {
    /// Probability of sending an empty sensor id.
    pub empty_id_probability: f64,
    /// Probability of shifting the record timestamp.
    pub jitter_probability: f64,
    /// Largest timestamp shift in either direction.
    pub max_jitter_ms: i64,
    /// Probability of publishing the record twice.
    pub duplicate_probability: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            empty_id_probability: 0.1,
            jitter_probability: 0.1,
            max_jitter_ms: 5 * 60 * 1000,
            duplicate_probability: 0.05,
        }
    }
}

impl DriverConfig {
    /// A driver that never corrupts records.
    pub fn clean() -> Self {
        Self {
            empty_id_probability: 0.0,
            jitter_probability: 0.0,
            max_jitter_ms: 0,
            duplicate_probability: 0.0,
        }
    }

    /// Check probabilities and jitter bound.
    pub fn validate(&self) -> Result<()> {
        check_probability("empty_id_probability", self.empty_id_probability)?;
        check_probability("jitter_probability", self.jitter_probability)?;
        check_probability("duplicate_probability", self.duplicate_probability)?;
        if self.max_jitter_ms < 0 {
            return Err(SimError::InvalidEngineConfig(format!(
                "max_jitter_ms must not be negative, got {}",
                self.max_jitter_ms
            )));
        }
        Ok(())
    }
}

/// Result of one driver tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Sensor that was simulated, regardless of what the record says.
    pub sensor_id: String,
    /// Record to publish.
    pub record: SensorRecord,
    /// Per-measurement engine outcomes.
    pub reading: SensorReading,
    /// Shift applied to the record timestamp.
    pub jitter_ms: i64,
    /// Whether the record should be published a second time.
    pub duplicate: bool,
}

/// Drives a [`Simulation`] one sensor at a time.
#[derive(Debug, Clone)]
pub struct TickDriver {
    simulation: Simulation,
    config: DriverConfig,
}

impl TickDriver {
    /// Create a driver over `fleet` with default engine and driver settings.
    pub fn new(fleet: FleetConfig) -> Self {
        Self::with_config(Simulation::new(fleet), DriverConfig::default())
    }

    /// Create a driver around an existing simulation.
    pub fn with_config(simulation: Simulation, config: DriverConfig) -> Self {
        Self { simulation, config }
    }

    /// Create a driver with a custom engine.
    pub fn with_engine(fleet: FleetConfig, engine: Engine, config: DriverConfig) -> Self {
        Self::with_config(Simulation::with_engine(fleet, engine), config)
    }

    /// Driver parameters.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Underlying simulation.
    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Pick a sensor uniformly from the fleet.
    pub fn select_sensor<R: UniformSource + ?Sized>(&self, rng: &mut R) -> Result<String> {
        let fleet = self.simulation.fleet();
        let count = fleet.len();
        if count == 0 {
            return Err(SimError::EmptyFleet);
        }
        let index = ((rng.next_uniform() * count as f64) as usize).min(count - 1);
        fleet
            .sensor_at(index)
            .map(str::to_string)
            .ok_or(SimError::EmptyFleet)
    }

    /// Run one tick at `now`.
    pub fn tick<R: UniformSource + ?Sized>(
        &mut self,
        now: TimestampMs,
        rng: &mut R,
    ) -> Result<Tick> {
        let sensor_id = self.select_sensor(rng)?;
        let keep_id = rng.next_uniform() > self.config.empty_id_probability;
        let jitter_ms = self.jitter(rng);

        let reading = self.simulation.tick_sensor(&sensor_id, now, rng)?;
        let duplicate = rng.chance(self.config.duplicate_probability);

        let record_id = if keep_id { sensor_id.clone() } else { String::new() };
        let record = SensorRecord::from_reading(record_id, now + jitter_ms, &reading);

        Ok(Tick {
            sensor_id,
            record,
            reading,
            jitter_ms,
            duplicate,
        })
    }

    fn jitter<R: UniformSource + ?Sized>(&self, rng: &mut R) -> i64 {
        if !rng.chance(self.config.jitter_probability) {
            return 0;
        }
        let sign = if rng.chance(0.5) { -1 } else { 1 };
        let magnitude = (rng.next_uniform() * self.config.max_jitter_ms as f64).floor() as i64;
        sign * magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedSource;

    const NOW: TimestampMs = 1_706_745_600_000;

    fn flat_measurements() -> [f64; 8] {
        [0.5; 8]
    }

    #[test]
    fn test_driver_config_default() {
        let config = DriverConfig::default();
        assert_eq!(config.empty_id_probability, 0.1);
        assert_eq!(config.jitter_probability, 0.1);
        assert_eq!(config.max_jitter_ms, 300_000);
        assert_eq!(config.duplicate_probability, 0.05);
        assert!(config.validate().is_ok());
        assert!(DriverConfig::clean().validate().is_ok());
    }

    #[test]
    fn test_driver_config_validation() {
        let config = DriverConfig {
            duplicate_probability: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidProbability { .. })
        ));

        let config = DriverConfig {
            max_jitter_ms: -1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_select_sensor_covers_fleet() {
        let driver = TickDriver::new(FleetConfig::default_fleet());
        let mut rng = ScriptedSource::new([0.0, 0.21, 0.5, 0.99, 1.0]);

        assert_eq!(driver.select_sensor(&mut rng).unwrap(), "sensor-1");
        assert_eq!(driver.select_sensor(&mut rng).unwrap(), "sensor-2");
        assert_eq!(driver.select_sensor(&mut rng).unwrap(), "sensor-3");
        assert_eq!(driver.select_sensor(&mut rng).unwrap(), "sensor-5");
        assert_eq!(driver.select_sensor(&mut rng).unwrap(), "sensor-5");
    }

    #[test]
    fn test_clean_tick() {
        let mut driver = TickDriver::new(FleetConfig::default_fleet());
        // sensor-1, keep id, no jitter, flat measurements, no duplicate
        let mut rng = ScriptedSource::new([0.0, 0.5, 0.5]);
        rng.extend(flat_measurements());
        rng.extend([0.5]);

        let tick = driver.tick(NOW, &mut rng).unwrap();
        assert_eq!(tick.sensor_id, "sensor-1");
        assert_eq!(tick.record.sensor_id, "sensor-1");
        assert_eq!(tick.record.timestamp, NOW);
        assert_eq!(tick.record.temperature, 21.5);
        assert_eq!(tick.jitter_ms, 0);
        assert!(!tick.duplicate);
        assert_eq!(rng.remaining(), 0);
    }

    #[test]
    fn test_blank_id_and_duplicate() {
        let mut driver = TickDriver::new(FleetConfig::default_fleet());
        let mut rng = ScriptedSource::new([0.45, 0.1, 0.5]);
        rng.extend(flat_measurements());
        rng.extend([0.01]);

        let tick = driver.tick(NOW, &mut rng).unwrap();
        assert_eq!(tick.sensor_id, "sensor-3");
        assert!(!tick.record.has_sensor_id());
        assert!(tick.duplicate);
        assert!(driver.simulation().sensor_state("sensor-3").is_some());
    }

    #[test]
    fn test_jitter_both_directions() {
        let mut driver = TickDriver::new(FleetConfig::default_fleet());

        let mut rng = ScriptedSource::new([0.0, 0.5, 0.05, 0.2, 0.5]);
        rng.extend(flat_measurements());
        rng.extend([0.5]);
        let tick = driver.tick(NOW, &mut rng).unwrap();
        assert_eq!(tick.jitter_ms, -150_000);
        assert_eq!(tick.record.timestamp, NOW - 150_000);

        let mut rng = ScriptedSource::new([0.0, 0.5, 0.05, 0.7, 0.1]);
        rng.extend(flat_measurements());
        rng.extend([0.5]);
        let tick = driver.tick(NOW, &mut rng).unwrap();
        assert_eq!(tick.jitter_ms, 30_000);
    }

    #[test]
    fn test_jitter_does_not_reach_engine() {
        let mut driver = TickDriver::new(FleetConfig::default_fleet());
        // Lock a persistent anomaly on sensor-1 temperature with a jittered record.
        let mut rng = ScriptedSource::new([0.0, 0.5, 0.05, 0.9, 0.99]);
        rng.extend([0.0, 0.0, 0.3, 0.0]);
        rng.extend([0.5; 6]);
        rng.extend([0.5]);
        let tick = driver.tick(NOW, &mut rng).unwrap();

        assert!(tick.jitter_ms > 0);
        let record = driver
            .simulation()
            .sensor_state("sensor-1")
            .unwrap()
            .temperature
            .anomaly
            .unwrap();
        assert_eq!(record.end_time, NOW + 3_600_000);
    }

    #[test]
    fn test_empty_fleet() {
        let mut driver = TickDriver::new(FleetConfig::empty());
        let mut rng = ScriptedSource::new([0.5]);
        assert!(matches!(
            driver.tick(NOW, &mut rng),
            Err(SimError::EmptyFleet)
        ));
    }
}
