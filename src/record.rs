//! Assembled telemetry records handed to publishers.

use serde::{Deserialize, Serialize};

use crate::simulation::SensorReading;
use crate::state::TimestampMs;

/// Avro schema of [`SensorRecord`].
pub const SENSOR_DATA_SCHEMA: &str = r#"{
  "type": "record",
  "name": "SensorData",
  "namespace": "com.example",
  "fields": [
    { "name": "sensorId", "type": "string" },
    { "name": "timestamp", "type": "long" },
    { "name": "temperature", "type": "float" },
    { "name": "humidity", "type": "float" },
    { "name": "battery", "type": "float" },
    { "name": "airQuality", "type": "float" }
  ]
}"#;

/// One telemetry message.
///
/// `sensor_id` may be empty and `timestamp` may be shifted when the
/// driver injects malformed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
    pub sensor_id: String,
    pub timestamp: TimestampMs,
    pub temperature: f32,
    pub humidity: f32,
    pub battery: f32,
    pub air_quality: f32,
}

impl SensorRecord {
    /// Assemble a record from one tick of a sensor.
    pub fn from_reading(
        sensor_id: impl Into<String>,
        timestamp: TimestampMs,
        reading: &SensorReading,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            timestamp,
            temperature: reading.temperature.value as f32,
            humidity: reading.humidity.value as f32,
            battery: reading.battery.value as f32,
            air_quality: reading.air_quality.value as f32,
        }
    }

    /// Whether the sensor id was blanked.
    pub fn has_sensor_id(&self) -> bool {
        !self.sensor_id.is_empty()
    }
}
