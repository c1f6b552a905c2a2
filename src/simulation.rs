//! Simulation context owning the per-sensor state registry.
//!
//! A [`Simulation`] holds the fleet configuration, the engine and one
//! [`SensorState`] per sensor that has been ticked at least once. Sensor
//! state is created lazily on first use and lives as long as the
//! simulation. Independent simulations share nothing.

use std::collections::HashMap;

use crate::config::{FleetConfig, Measurement};
use crate::engine::{Engine, Phase, Step};
use crate::error::{Result, SimError};
use crate::random::UniformSource;
use crate::state::{SensorState, TimestampMs};

/// Values produced for one sensor on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: Step,
    pub humidity: Step,
    pub battery: Step,
    pub air_quality: Step,
}

impl SensorReading {
    /// Step of a given measurement.
    pub fn get(&self, measurement: Measurement) -> &Step {
        match measurement {
            Measurement::Temperature => &self.temperature,
            Measurement::Humidity => &self.humidity,
            Measurement::Battery => &self.battery,
            Measurement::AirQuality => &self.air_quality,
        }
    }

    /// Iterate `(measurement, step)` pairs in record order.
    pub fn steps(&self) -> impl Iterator<Item = (Measurement, &Step)> + '_ {
        Measurement::ALL.iter().map(move |m| (*m, self.get(*m)))
    }

    /// Whether any measurement emitted an anomalous value.
    pub fn is_anomalous(&self) -> bool {
        self.steps().any(|(_, s)| s.phase != Phase::Normal)
    }
}

/// Running counters of a simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationStats {
    /// Sensor ticks processed.
    pub ticks: u64,
    /// Measurements that took the normal branch.
    pub normal_readings: u64,
    /// One-off anomalous measurements.
    pub transient_readings: u64,
    /// Measurements emitted from a persistent anomaly.
    pub persistent_readings: u64,
    /// Persistent anomalies locked in.
    pub anomalies_started: u64,
    /// Persistent anomalies cleared on expiry.
    pub anomalies_expired: u64,
}

impl SimulationStats {
    fn record(&mut self, step: &Step) {
        match step.phase {
            Phase::Normal => self.normal_readings += 1,
            Phase::TransientExcursion => self.transient_readings += 1,
            Phase::PersistentAnomaly => self.persistent_readings += 1,
        }
        if step.anomaly_started {
            self.anomalies_started += 1;
        }
        if step.anomaly_expired {
            self.anomalies_expired += 1;
        }
    }
}

/// A fleet simulation: configuration, engine and per-sensor state.
#[derive(Debug, Clone)]
pub struct Simulation {
    fleet: FleetConfig,
    engine: Engine,
    sensors: HashMap<String, SensorState>,
    stats: SimulationStats,
}

impl Simulation {
    /// Create a simulation over `fleet` with the default engine.
    pub fn new(fleet: FleetConfig) -> Self {
        Self::with_engine(fleet, Engine::default())
    }

    /// Create a simulation with a custom engine.
    pub fn with_engine(fleet: FleetConfig, engine: Engine) -> Self {
        Self {
            fleet,
            engine,
            sensors: HashMap::new(),
            stats: SimulationStats::default(),
        }
    }

    /// Fleet configuration.
    pub fn fleet(&self) -> &FleetConfig {
        &self.fleet
    }

    /// Engine in use.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// State of a sensor, if it has been initialized.
    pub fn sensor_state(&self, id: &str) -> Option<&SensorState> {
        self.sensors.get(id)
    }

    /// Number of initialized sensors.
    pub fn initialized_sensors(&self) -> usize {
        self.sensors.len()
    }

    /// Persistent anomalies currently recorded across the fleet.
    pub fn active_anomalies(&self) -> usize {
        self.sensors.values().map(SensorState::active_anomalies).sum()
    }

    /// State of a sensor, initializing it at range midpoints on first use.
    ///
    /// Never re-initializes a sensor that already has state.
    pub fn ensure_sensor(&mut self, id: &str) -> Result<&mut SensorState> {
        let profile = self
            .fleet
            .get(id)
            .ok_or_else(|| SimError::UnknownSensor(id.to_string()))?;

        if !self.sensors.contains_key(id) {
            #[cfg(feature = "logging")]
            log::debug!("initializing state for sensor {}", id);
            self.sensors.insert(id.to_string(), SensorState::init(profile));
        }

        self.sensors
            .get_mut(id)
            .ok_or_else(|| SimError::UnknownSensor(id.to_string()))
    }

    /// Advance every measurement of a sensor by one tick.
    pub fn tick_sensor<R: UniformSource + ?Sized>(
        &mut self,
        id: &str,
        now: TimestampMs,
        rng: &mut R,
    ) -> Result<SensorReading> {
        let engine = self.engine;
        let profile = *self
            .fleet
            .get(id)
            .ok_or_else(|| SimError::UnknownSensor(id.to_string()))?;
        let state = self.ensure_sensor(id)?;

        let mut advance = |measurement: Measurement| {
            engine.step(
                state.get_mut(measurement),
                profile.range(measurement),
                now,
                &mut *rng,
            )
        };
        let reading = SensorReading {
            temperature: advance(Measurement::Temperature),
            humidity: advance(Measurement::Humidity),
            battery: advance(Measurement::Battery),
            air_quality: advance(Measurement::AirQuality),
        };

        self.stats.ticks += 1;
        for (_measurement, step) in reading.steps() {
            self.stats.record(step);

            #[cfg(feature = "logging")]
            {
                if step.anomaly_expired {
                    log::info!("persistent anomaly expired on {}/{}", id, _measurement);
                }
                if step.anomaly_started {
                    log::info!(
                        "persistent anomaly started on {}/{} at {:.3}",
                        id,
                        _measurement,
                        step.value
                    );
                }
            }
        }

        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const NOW: TimestampMs = 1_706_745_600_000;

    /// Four normal-branch measurements with a zero walk.
    fn flat_tick() -> [f64; 8] {
        [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]
    }

    #[test]
    fn test_lazy_initialization() {
        let mut sim = Simulation::new(FleetConfig::default_fleet());
        assert_eq!(sim.initialized_sensors(), 0);
        assert!(sim.sensor_state("sensor-1").is_none());

        let mut rng = ScriptedSource::new(flat_tick());
        let reading = sim.tick_sensor("sensor-1", NOW, &mut rng).unwrap();

        assert_eq!(sim.initialized_sensors(), 1);
        assert_eq!(reading.temperature.value, 21.5);
        assert_eq!(reading.humidity.value, 50.0);
        assert_eq!(reading.battery.value, 75.0);
        assert_eq!(reading.air_quality.value, 25.0);
        assert!(!reading.is_anomalous());
    }

    #[test]
    fn test_no_reinitialization() {
        let mut sim = Simulation::new(FleetConfig::default_fleet());
        // Temperature walks up by 0.175, the rest stay flat.
        let mut rng = ScriptedSource::new([0.5, 0.75, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]);
        sim.tick_sensor("sensor-1", NOW, &mut rng).unwrap();

        let state = sim.ensure_sensor("sensor-1").unwrap();
        assert!((state.temperature.normal - 21.675).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_sensor() {
        let mut sim = Simulation::new(FleetConfig::default_fleet());
        let mut rng = ScriptedSource::default();
        let result = sim.tick_sensor("sensor-99", NOW, &mut rng);
        assert!(matches!(result, Err(SimError::UnknownSensor(id)) if id == "sensor-99"));
        assert_eq!(sim.initialized_sensors(), 0);
    }

    #[test]
    fn test_sensors_are_independent() {
        let mut sim = Simulation::new(FleetConfig::default_fleet());
        // Persistent anomaly on sensor-1 temperature, flat elsewhere.
        let mut rng = ScriptedSource::new([0.0, 0.0, 0.3, 0.0]);
        rng.extend([0.5; 6]);
        sim.tick_sensor("sensor-1", NOW, &mut rng).unwrap();

        rng.extend(flat_tick());
        sim.tick_sensor("sensor-2", NOW, &mut rng).unwrap();

        assert_eq!(sim.active_anomalies(), 1);
        assert!(sim.sensor_state("sensor-1").unwrap().temperature.has_anomaly());
        assert!(!sim.sensor_state("sensor-2").unwrap().temperature.has_anomaly());
    }

    #[test]
    fn test_stats_track_phases() {
        let mut sim = Simulation::new(FleetConfig::default_fleet());
        // temperature: persistent, humidity: transient, rest normal
        let mut rng = ScriptedSource::new([0.0, 0.0, 0.3, 0.0]);
        rng.extend([0.0, 0.9, 0.3, 0.9]);
        rng.extend([0.5; 4]);
        let reading = sim.tick_sensor("sensor-1", NOW, &mut rng).unwrap();

        assert!(reading.is_anomalous());
        assert_eq!(reading.temperature.phase, Phase::PersistentAnomaly);
        assert_eq!(reading.humidity.phase, Phase::TransientExcursion);

        let stats = sim.stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.persistent_readings, 1);
        assert_eq!(stats.transient_readings, 1);
        assert_eq!(stats.normal_readings, 2);
        assert_eq!(stats.anomalies_started, 1);
        assert_eq!(stats.anomalies_expired, 0);
    }

    #[test]
    fn test_independent_simulations() {
        let mut a = Simulation::new(FleetConfig::default_fleet());
        let b = Simulation::new(FleetConfig::default_fleet());
        let mut rng = StdRng::seed_from_u64(1);

        for i in 0..100 {
            a.tick_sensor("sensor-3", NOW + i * 1000, &mut rng).unwrap();
        }
        assert_eq!(a.stats().ticks, 100);
        assert_eq!(b.stats().ticks, 0);
        assert_eq!(b.initialized_sensors(), 0);
    }
}
