//! Static range configuration for the simulated fleet.
//!
//! A [`FleetConfig`] maps sensor ids to a [`SensorProfile`], which holds
//! one [`RangeConfig`] per [`Measurement`]. Configuration is read-only
//! once loaded; the engine never mutates it.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Static bounds for one measurement of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    /// Lower bound of the normal range.
    pub min: f64,
    /// Upper bound of the normal range.
    pub max: f64,
    /// Distance used to push anomalies away from the normal value.
    pub margin: f64,
}

impl RangeConfig {
    /// Create a range configuration.
    pub const fn new(min: f64, max: f64, margin: f64) -> Self {
        Self { min, max, margin }
    }

    /// Midpoint of `[min, max]`.
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Width of the normal range.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Whether `value` lies within `[min, max]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check `min < max` and `margin > 0`, all finite.
    pub fn validate(&self, sensor: &str, measurement: Measurement) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(SimError::InvalidRange {
                sensor: sensor.to_string(),
                measurement: measurement.to_string(),
                min: self.min,
                max: self.max,
            });
        }
        if !(self.margin.is_finite() && self.margin > 0.0) {
            return Err(SimError::InvalidMargin {
                sensor: sensor.to_string(),
                measurement: measurement.to_string(),
                margin: self.margin,
            });
        }
        Ok(())
    }
}

/// A tracked measurement of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Measurement {
    Temperature,
    Humidity,
    Battery,
    AirQuality,
}

impl Measurement {
    /// All measurements, in record order.
    pub const ALL: [Measurement; 4] = [
        Measurement::Temperature,
        Measurement::Humidity,
        Measurement::Battery,
        Measurement::AirQuality,
    ];

    /// Field name used in records and configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Measurement::Temperature => "temperature",
            Measurement::Humidity => "humidity",
            Measurement::Battery => "battery",
            Measurement::AirQuality => "airQuality",
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranges for every measurement of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorProfile {
    pub temperature: RangeConfig,
    pub humidity: RangeConfig,
    pub battery: RangeConfig,
    pub air_quality: RangeConfig,
}

impl SensorProfile {
    /// Range of a given measurement.
    pub fn range(&self, measurement: Measurement) -> &RangeConfig {
        match measurement {
            Measurement::Temperature => &self.temperature,
            Measurement::Humidity => &self.humidity,
            Measurement::Battery => &self.battery,
            Measurement::AirQuality => &self.air_quality,
        }
    }

    /// Iterate `(measurement, range)` pairs in record order.
    pub fn ranges(&self) -> impl Iterator<Item = (Measurement, &RangeConfig)> + '_ {
        Measurement::ALL.iter().map(move |m| (*m, self.range(*m)))
    }

    /// Validate every range of this profile.
    pub fn validate(&self, sensor: &str) -> Result<()> {
        for (measurement, range) in self.ranges() {
            range.validate(sensor, measurement)?;
        }
        Ok(())
    }
}

/// Range configuration for the whole fleet, keyed by sensor id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FleetConfig {
    sensors: BTreeMap<String, SensorProfile>,
}

impl FleetConfig {
    /// Create a fleet with no sensors, to be filled with [`with_sensor`](Self::with_sensor).
    pub fn empty() -> Self {
        Self {
            sensors: BTreeMap::new(),
        }
    }

    /// The built-in five-sensor fleet.
    pub fn default_fleet() -> Self {
        Self::empty()
            .with_sensor(
                "sensor-1",
                SensorProfile {
                    temperature: RangeConfig::new(18.0, 25.0, 5.0),
                    humidity: RangeConfig::new(40.0, 60.0, 10.0),
                    battery: RangeConfig::new(50.0, 100.0, 20.0),
                    air_quality: RangeConfig::new(0.0, 50.0, 20.0),
                },
            )
            .with_sensor(
                "sensor-2",
                SensorProfile {
                    temperature: RangeConfig::new(10.0, 20.0, 5.0),
                    humidity: RangeConfig::new(30.0, 50.0, 10.0),
                    battery: RangeConfig::new(60.0, 100.0, 20.0),
                    air_quality: RangeConfig::new(5.0, 60.0, 20.0),
                },
            )
            .with_sensor(
                "sensor-3",
                SensorProfile {
                    temperature: RangeConfig::new(20.0, 30.0, 5.0),
                    humidity: RangeConfig::new(35.0, 65.0, 10.0),
                    battery: RangeConfig::new(40.0, 90.0, 20.0),
                    air_quality: RangeConfig::new(10.0, 70.0, 20.0),
                },
            )
            .with_sensor(
                "sensor-4",
                SensorProfile {
                    temperature: RangeConfig::new(15.0, 22.0, 5.0),
                    humidity: RangeConfig::new(45.0, 70.0, 10.0),
                    battery: RangeConfig::new(30.0, 100.0, 20.0),
                    air_quality: RangeConfig::new(0.0, 40.0, 20.0),
                },
            )
            .with_sensor(
                "sensor-5",
                SensorProfile {
                    temperature: RangeConfig::new(16.0, 28.0, 5.0),
                    humidity: RangeConfig::new(40.0, 65.0, 10.0),
                    battery: RangeConfig::new(50.0, 100.0, 20.0),
                    air_quality: RangeConfig::new(15.0, 75.0, 20.0),
                },
            )
    }

    /// Add (or replace) a sensor profile.
    pub fn with_sensor(mut self, id: impl Into<String>, profile: SensorProfile) -> Self {
        self.sensors.insert(id.into(), profile);
        self
    }

    /// Parse and validate a fleet from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FleetConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a fleet from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize the fleet to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate every sensor and reject an empty fleet.
    pub fn validate(&self) -> Result<()> {
        if self.sensors.is_empty() {
            return Err(SimError::EmptyFleet);
        }
        for (id, profile) in &self.sensors {
            profile.validate(id)?;
        }
        Ok(())
    }

    /// Profile of a sensor, if known.
    pub fn get(&self, id: &str) -> Option<&SensorProfile> {
        self.sensors.get(id)
    }

    /// Sensor ids in sorted order.
    pub fn sensor_ids(&self) -> impl Iterator<Item = &str> {
        self.sensors.keys().map(String::as_str)
    }

    /// Sensor id at position `index` in sorted order.
    pub fn sensor_at(&self, index: usize) -> Option<&str> {
        self.sensors.keys().nth(index).map(String::as_str)
    }

    /// Number of sensors.
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// Whether the fleet has no sensors.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self::default_fleet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_helpers() {
        let range = RangeConfig::new(18.0, 25.0, 5.0);
        assert_eq!(range.midpoint(), 21.5);
        assert_eq!(range.span(), 7.0);
        assert!(range.contains(18.0));
        assert!(range.contains(25.0));
        assert!(!range.contains(25.01));
    }

    #[test]
    fn test_range_validation() {
        let ok = RangeConfig::new(0.0, 1.0, 0.5);
        assert!(ok.validate("s", Measurement::Humidity).is_ok());

        let inverted = RangeConfig::new(5.0, 1.0, 0.5);
        assert!(matches!(
            inverted.validate("s", Measurement::Humidity),
            Err(SimError::InvalidRange { .. })
        ));

        let equal = RangeConfig::new(1.0, 1.0, 0.5);
        assert!(equal.validate("s", Measurement::Humidity).is_err());

        let zero_margin = RangeConfig::new(0.0, 1.0, 0.0);
        assert!(matches!(
            zero_margin.validate("s", Measurement::Battery),
            Err(SimError::InvalidMargin { .. })
        ));

        let nan = RangeConfig::new(f64::NAN, 1.0, 0.5);
        assert!(nan.validate("s", Measurement::Battery).is_err());
    }

    #[test]
    fn test_measurement_names() {
        let names: Vec<&str> = Measurement::ALL.iter().map(|m| m.as_str()).collect();
        assert_eq!(names, vec!["temperature", "humidity", "battery", "airQuality"]);
        assert_eq!(Measurement::AirQuality.to_string(), "airQuality");
    }

    #[test]
    fn test_default_fleet() {
        let fleet = FleetConfig::default_fleet();
        assert_eq!(fleet.len(), 5);
        assert!(fleet.validate().is_ok());

        let s1 = fleet.get("sensor-1").unwrap();
        assert_eq!(s1.temperature, RangeConfig::new(18.0, 25.0, 5.0));
        assert_eq!(s1.range(Measurement::AirQuality).max, 50.0);

        let ids: Vec<&str> = fleet.sensor_ids().collect();
        assert_eq!(
            ids,
            vec!["sensor-1", "sensor-2", "sensor-3", "sensor-4", "sensor-5"]
        );
        assert_eq!(fleet.sensor_at(2), Some("sensor-3"));
        assert_eq!(fleet.sensor_at(5), None);
    }

    #[test]
    fn test_empty_and_default_fleet() {
        let empty = FleetConfig::empty();
        assert!(empty.is_empty());
        assert!(matches!(empty.validate(), Err(SimError::EmptyFleet)));

        assert_eq!(FleetConfig::default(), FleetConfig::default_fleet());

        let profile = *FleetConfig::default_fleet().get("sensor-2").unwrap();
        let one = FleetConfig::empty().with_sensor("probe", profile);
        assert_eq!(one.len(), 1);
        assert!(one.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_shape() {
        let json = r#"{
            "probe-a": {
                "temperature": { "min": 0, "max": 10, "margin": 2 },
                "humidity": { "min": 20, "max": 30, "margin": 5 },
                "battery": { "min": 50, "max": 100, "margin": 20 },
                "airQuality": { "min": 0, "max": 40, "margin": 10 }
            }
        }"#;
        let fleet = FleetConfig::from_json_str(json).unwrap();
        assert_eq!(fleet.len(), 1);
        assert_eq!(fleet.get("probe-a").unwrap().air_quality.margin, 10.0);

        let reparsed = FleetConfig::from_json_str(&fleet.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, fleet);
    }

    #[test]
    fn test_json_rejects_invalid_range() {
        let json = r#"{
            "probe-a": {
                "temperature": { "min": 10, "max": 0, "margin": 2 },
                "humidity": { "min": 20, "max": 30, "margin": 5 },
                "battery": { "min": 50, "max": 100, "margin": 20 },
                "airQuality": { "min": 0, "max": 40, "margin": 10 }
            }
        }"#;
        assert!(matches!(
            FleetConfig::from_json_str(json),
            Err(SimError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_json_rejects_empty_fleet() {
        assert!(matches!(
            FleetConfig::from_json_str("{}"),
            Err(SimError::EmptyFleet)
        ));
    }

    #[test]
    fn test_json_rejects_missing_measurement() {
        let json = r#"{
            "probe-a": {
                "temperature": { "min": 0, "max": 10, "margin": 2 }
            }
        }"#;
        assert!(matches!(
            FleetConfig::from_json_str(json),
            Err(SimError::Parse(_))
        ));
    }
}
