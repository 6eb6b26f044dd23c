//! ==============================================================================
//! domain.rs - shared data model
//! ==============================================================================
//!
//! purpose:
//!     the types that flow through the hub and out over the wire.
//!     json field names are camelCase so existing producers (esp32 nodes)
//!     and dashboards keep working unchanged.
//!
//! relationships:
//!     - produced by: ingest.rs (Reading), registry.rs (SensorState)
//!     - consumed by: history.rs, registry.rs, broadcast.rs, query.rs, http.rs
//!
//! ==============================================================================

use serde::{Deserialize, Serialize, Serializer};
use time::OffsetDateTime;

/// one ingested telemetry sample plus its synthetic enrichment
///
/// immutable once built by the normalizer; the history store and the
/// registry only ever hold clones of it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// unique, strictly increasing token (unix millis at ingestion, as a string)
    pub id: String,
    pub sensor_id: String,
    /// temperature in celsius, as sent by the producer
    pub temperature: f64,
    /// relative humidity (0-100%), as sent by the producer
    pub humidity: f64,
    /// SYNTHETIC: sampled in [30, 80] at ingestion, not measured
    pub soil_moisture: f64,
    /// SYNTHETIC: sampled in [40, 80] at ingestion, not measured
    pub air_humidity: f64,
    /// SYNTHETIC: sampled in [60, 100] at ingestion, not measured
    pub battery: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// raw producer payload, before coercion
///
/// numbers may arrive as json numbers or as numeric strings, so the
/// measured fields stay untyped until the normalizer looks at them.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    #[serde(default)]
    pub sensor_id: Option<serde_json::Value>,
    #[serde(default)]
    pub temperature: Option<serde_json::Value>,
    #[serde(default)]
    pub humidity: Option<serde_json::Value>,
}

/// static, per-sensor metadata (display name and location)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorMetadata {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

/// last-known state of one sensor
///
/// on the wire the state is one flat object whose `id` is the sensor id.
/// the token of the reading it was built from moves to `_id`:
///
/// ```text
/// {"id":"S1","_id":"1700000000000","sensorId":"S1","name":..,"lat":..,
///  "lng":..,"active":true,"lastUpdate":..,"temperature":..,...}
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SensorState {
    pub metadata: SensorMetadata,
    pub active: bool,
    pub last_update: OffsetDateTime,
    /// the most recently accepted reading
    pub reading: Reading,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SensorStateJson<'a> {
    id: &'a str,
    #[serde(rename = "_id")]
    reading_id: &'a str,
    sensor_id: &'a str,
    #[serde(flatten)]
    metadata: &'a SensorMetadata,
    active: bool,
    #[serde(with = "time::serde::rfc3339")]
    last_update: OffsetDateTime,
    temperature: f64,
    humidity: f64,
    soil_moisture: f64,
    air_humidity: f64,
    battery: f64,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

impl Serialize for SensorState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let r = &self.reading;
        SensorStateJson {
            id: &r.sensor_id,
            reading_id: &r.id,
            sensor_id: &r.sensor_id,
            metadata: &self.metadata,
            active: self.active,
            last_update: self.last_update,
            temperature: r.temperature,
            humidity: r.humidity,
            soil_moisture: r.soil_moisture,
            air_humidity: r.air_humidity,
            battery: r.battery,
            timestamp: r.timestamp,
        }
        .serialize(serializer)
    }
}

/// per-sensor summary served by the global stats endpoint
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStats {
    pub sensor_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub air_humidity: f64,
}

impl From<&SensorState> for SensorStats {
    fn from(state: &SensorState) -> Self {
        Self {
            sensor_id: state.reading.sensor_id.clone(),
            temperature: state.reading.temperature,
            humidity: state.reading.humidity,
            soil_moisture: state.reading.soil_moisture,
            air_humidity: state.reading.air_humidity,
        }
    }
}

/// an event pushed to stream observers
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StreamEvent {
    /// full registry snapshot, sent once right after attach
    Initial(Vec<SensorState>),
    /// one newly ingested reading
    Update(Reading),
}

#[cfg(test)]
impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Initial(_) => "initial",
            StreamEvent::Update(_) => "update",
        }
    }
}

/// aggregate counters for the health endpoint
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub mode: String,
    pub clients: usize,
    pub data_points: usize,
    /// history capacity, the ceiling for data_points
    pub capacity: usize,
    pub active_sensors: usize,
    pub uptime_seconds: u64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// a fixed reading for tests that don't go through the normalizer
    pub fn reading(id: u64, sensor_id: &str, temperature: f64) -> Reading {
        Reading {
            id: id.to_string(),
            sensor_id: sensor_id.to_string(),
            temperature,
            humidity: 50.0,
            soil_moisture: 40.0,
            air_humidity: 60.0,
            battery: 90.0,
            timestamp: OffsetDateTime::from_unix_timestamp(1_700_000_000 + id as i64)
                .expect("valid unix timestamp"),
        }
    }
}
