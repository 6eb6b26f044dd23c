//! ==============================================================================
//! ingest.rs - reading validator / normalizer
//! ==============================================================================
//!
//! purpose:
//!     turns a raw producer payload into a canonical Reading.
//!
//! what it does:
//!     - requires a non-empty `sensorId` without surrounding whitespace
//!     - coerces `temperature` / `humidity` from json numbers or numeric strings
//!     - assigns a strictly increasing, time-derived `id` and the ingestion timestamp
//!     - SYNTHESIZES soil moisture, air humidity and battery by uniform sampling.
//!       field nodes don't measure these yet; the values only keep dashboards
//!       populated and must never be read as real data.
//!
//! relationships:
//!     - used by: hub.rs (first step of every ingestion, inside the hub lock)
//!
//! ==============================================================================

use std::ops::RangeInclusive;

use rand::Rng;
use serde_json::Value;
use time::OffsetDateTime;

use crate::domain::{RawReading, Reading};
use crate::error::{HubError, Result};

pub const SOIL_MOISTURE_RANGE: RangeInclusive<f64> = 30.0..=80.0;
pub const AIR_HUMIDITY_RANGE: RangeInclusive<f64> = 40.0..=80.0;
pub const BATTERY_RANGE: RangeInclusive<f64> = 60.0..=100.0;

/// builds canonical readings and hands out their ids
#[derive(Debug, Default)]
pub struct Normalizer {
    last_id: u64,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// validate and normalize `raw`, stamped with the current time
    pub fn normalize(&mut self, raw: &RawReading) -> Result<Reading> {
        self.normalize_at(raw, OffsetDateTime::now_utc())
    }

    pub fn normalize_at(&mut self, raw: &RawReading, now: OffsetDateTime) -> Result<Reading> {
        let sensor_id = sensor_id(raw.sensor_id.as_ref())?;
        let temperature = numeric("temperature", raw.temperature.as_ref())?;
        let humidity = numeric("humidity", raw.humidity.as_ref())?;

        let mut rng = rand::thread_rng();
        Ok(Reading {
            id: self.next_id(now).to_string(),
            sensor_id,
            temperature,
            humidity,
            soil_moisture: rng.gen_range(SOIL_MOISTURE_RANGE),
            air_humidity: rng.gen_range(AIR_HUMIDITY_RANGE),
            battery: rng.gen_range(BATTERY_RANGE),
            timestamp: now,
        })
    }

    /// unix millis, bumped past the previous id when the clock hasn't moved
    fn next_id(&mut self, now: OffsetDateTime) -> u64 {
        let millis = (now.unix_timestamp_nanos() / 1_000_000).max(0) as u64;
        let id = millis.max(self.last_id + 1);
        self.last_id = id;
        id
    }
}

fn sensor_id(value: Option<&Value>) -> Result<String> {
    match value {
        Some(Value::String(s)) if s.trim().is_empty() => Err(HubError::validation("sensorId", "must not be empty")),
        // ids are stored verbatim, so padding is refused rather than trimmed
        Some(Value::String(s)) if s.trim() != s.as_str() => Err(HubError::validation(
            "sensorId",
            "must not have leading or trailing whitespace",
        )),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(HubError::validation("sensorId", "missing")),
        Some(other) => Err(HubError::validation("sensorId", format!("expected a string, got {other}"))),
    }
}

fn numeric(field: &'static str, value: Option<&Value>) -> Result<f64> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Null) | None => return Err(HubError::validation(field, "missing")),
        Some(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(HubError::validation(field, "not a finite number")),
    }
}
