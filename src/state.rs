//! Mutable per-sensor simulation state.

use crate::config::{Measurement, RangeConfig, SensorProfile};

/// Timestamp in milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// An active persistent anomaly.
///
/// While present, `value` stays below `min` when `is_below` is set and
/// above `max` otherwise, once it has been advanced at least once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyRecord {
    /// Current anomalous value.
    pub value: f64,
    /// First timestamp at which the anomaly is considered expired.
    pub end_time: TimestampMs,
    /// Whether the anomaly sits below the normal range.
    pub is_below: bool,
}

impl AnomalyRecord {
    /// Whether the anomaly has run its course at `now`.
    pub fn is_expired(&self, now: TimestampMs) -> bool {
        now >= self.end_time
    }
}

/// State of one measurement of one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementState {
    /// Last known good value.
    pub normal: f64,
    /// Persistent anomaly, present iff one is active.
    pub anomaly: Option<AnomalyRecord>,
}

impl MeasurementState {
    /// State starting at the midpoint of `range` with no anomaly.
    pub fn at_midpoint(range: &RangeConfig) -> Self {
        Self {
            normal: range.midpoint(),
            anomaly: None,
        }
    }

    /// Whether a persistent anomaly is currently recorded.
    pub fn has_anomaly(&self) -> bool {
        self.anomaly.is_some()
    }
}

/// State of every measurement of one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorState {
    pub temperature: MeasurementState,
    pub humidity: MeasurementState,
    pub battery: MeasurementState,
    pub air_quality: MeasurementState,
}

impl SensorState {
    /// Initialize each measurement at the midpoint of its range.
    pub fn init(profile: &SensorProfile) -> Self {
        Self {
            temperature: MeasurementState::at_midpoint(&profile.temperature),
            humidity: MeasurementState::at_midpoint(&profile.humidity),
            battery: MeasurementState::at_midpoint(&profile.battery),
            air_quality: MeasurementState::at_midpoint(&profile.air_quality),
        }
    }

    /// State of a given measurement.
    pub fn get(&self, measurement: Measurement) -> &MeasurementState {
        match measurement {
            Measurement::Temperature => &self.temperature,
            Measurement::Humidity => &self.humidity,
            Measurement::Battery => &self.battery,
            Measurement::AirQuality => &self.air_quality,
        }
    }

    /// Mutable state of a given measurement.
    pub fn get_mut(&mut self, measurement: Measurement) -> &mut MeasurementState {
        match measurement {
            Measurement::Temperature => &mut self.temperature,
            Measurement::Humidity => &mut self.humidity,
            Measurement::Battery => &mut self.battery,
            Measurement::AirQuality => &mut self.air_quality,
        }
    }

    /// Number of measurements currently in a persistent anomaly.
    pub fn active_anomalies(&self) -> usize {
        Measurement::ALL
            .iter()
            .filter(|m| self.get(**m).has_anomaly())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;

    #[test]
    fn test_init_uses_midpoints() {
        let fleet = FleetConfig::default_fleet();
        let profile = fleet.get("sensor-1").unwrap();
        let state = SensorState::init(profile);

        assert_eq!(state.temperature.normal, 21.5);
        assert_eq!(state.humidity.normal, 50.0);
        assert_eq!(state.battery.normal, 75.0);
        assert_eq!(state.air_quality.normal, 25.0);
        assert_eq!(state.active_anomalies(), 0);
    }

    #[test]
    fn test_get_mut_targets_measurement() {
        let fleet = FleetConfig::default_fleet();
        let mut state = SensorState::init(fleet.get("sensor-2").unwrap());

        state.get_mut(Measurement::Battery).anomaly = Some(AnomalyRecord {
            value: 55.0,
            end_time: 1_000,
            is_below: true,
        });

        assert!(state.battery.has_anomaly());
        assert!(!state.get(Measurement::Humidity).has_anomaly());
        assert_eq!(state.active_anomalies(), 1);
    }

    #[test]
    fn test_anomaly_expiry_boundary() {
        let record = AnomalyRecord {
            value: 10.0,
            end_time: 5_000,
            is_below: true,
        };
        assert!(!record.is_expired(4_999));
        assert!(record.is_expired(5_000));
        assert!(record.is_expired(5_001));
    }
}
