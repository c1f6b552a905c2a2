// Fleetsim Producer - Telemetry publisher for simulated sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Payload encoding for sensor records.
//!
//! Avro payloads use the Confluent wire framing: a zero magic byte, the
//! big-endian 4-byte schema id, then the Avro binary datum. The schema id
//! comes from the schema registry or from the command line.

use apache_avro::types::Value;
use apache_avro::Schema;
use clap::ValueEnum;
use fleetsim::{SensorRecord, SENSOR_DATA_SCHEMA};

use crate::error::CodecError;

/// Magic byte opening every framed Avro payload.
pub const MAGIC_BYTE: u8 = 0;

/// Length of the magic byte plus schema id.
pub const FRAME_HEADER_LEN: usize = 5;

/// Wire format of published payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PayloadFormat {
    /// Framed Avro binary.
    Avro,
    /// UTF-8 JSON object.
    Json,
}

/// Encodes records with the Avro `SensorData` schema.
#[derive(Debug, Clone)]
pub struct AvroCodec {
    schema: Schema,
    schema_id: u32,
}

impl AvroCodec {
    /// Parse the record schema and bind it to `schema_id`.
    pub fn new(schema_id: u32) -> Result<Self, CodecError> {
        let schema = Schema::parse_str(SENSOR_DATA_SCHEMA).map_err(CodecError::Schema)?;
        Ok(Self { schema, schema_id })
    }

    /// Schema id written into every frame.
    pub fn schema_id(&self) -> u32 {
        self.schema_id
    }

    /// Parsed schema.
    #[cfg(test)]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Encode a record into a framed Avro payload.
    pub fn encode(&self, record: &SensorRecord) -> Result<Vec<u8>, CodecError> {
        let value = Value::Record(vec![
            ("sensorId".to_string(), Value::String(record.sensor_id.clone())),
            ("timestamp".to_string(), Value::Long(record.timestamp)),
            ("temperature".to_string(), Value::Float(record.temperature)),
            ("humidity".to_string(), Value::Float(record.humidity)),
            ("battery".to_string(), Value::Float(record.battery)),
            ("airQuality".to_string(), Value::Float(record.air_quality)),
        ]);
        let datum = apache_avro::to_avro_datum(&self.schema, value).map_err(CodecError::Avro)?;

        let mut payload = Vec::with_capacity(FRAME_HEADER_LEN + datum.len());
        payload.push(MAGIC_BYTE);
        payload.extend_from_slice(&self.schema_id.to_be_bytes());
        payload.extend_from_slice(&datum);
        Ok(payload)
    }
}

/// Record encoder selected at startup.
#[derive(Debug, Clone)]
pub enum RecordCodec {
    Avro(AvroCodec),
    Json,
}

impl RecordCodec {
    /// Encode a record.
    pub fn encode(&self, record: &SensorRecord) -> Result<Vec<u8>, CodecError> {
        match self {
            RecordCodec::Avro(codec) => codec.encode(record),
            RecordCodec::Json => Ok(serde_json::to_vec(record)?),
        }
    }

    /// Schema id framed into payloads, for Avro.
    pub fn schema_id(&self) -> Option<u32> {
        match self {
            RecordCodec::Avro(codec) => Some(codec.schema_id()),
            RecordCodec::Json => None,
        }
    }

    /// Format label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            RecordCodec::Avro(_) => "avro",
            RecordCodec::Json => "json",
        }
    }
}
