//! ==============================================================================
//! registry.rs - sensor registry
//! ==============================================================================
//!
//! purpose:
//!     latest-state-per-sensor map. one SensorState per sensor id,
//!     last writer wins in arrival order.
//!
//! ordering:
//!     every upsert stamps the entry with a touch sequence number.
//!     list() is ordered least- to most-recently touched, so latest(n)
//!     is simply the tail of that order.
//!
//! ==============================================================================

use std::collections::HashMap;

use crate::domain::{Reading, SensorMetadata, SensorState};

pub const DEFAULT_LATEST_LIMIT: usize = 10;

#[derive(Debug)]
struct Entry {
    state: SensorState,
    touched: u64,
}

#[derive(Debug, Default)]
pub struct SensorRegistry {
    sensors: HashMap<String, Entry>,
    touches: u64,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// replace the state for `sensor_id` with `metadata` + `reading`
    pub fn upsert(&mut self, sensor_id: &str, reading: &Reading, metadata: SensorMetadata) {
        self.touches += 1;
        let state = SensorState {
            metadata,
            active: true,
            last_update: reading.timestamp,
            reading: reading.clone(),
        };
        self.sensors
            .insert(sensor_id.to_string(), Entry { state, touched: self.touches });
    }

    #[cfg(test)]
    pub fn get(&self, sensor_id: &str) -> Option<&SensorState> {
        self.sensors.get(sensor_id).map(|e| &e.state)
    }

    /// every sensor state, least recently touched first
    pub fn list(&self) -> Vec<SensorState> {
        let mut entries: Vec<&Entry> = self.sensors.values().collect();
        entries.sort_by_key(|e| e.touched);
        entries.into_iter().map(|e| e.state.clone()).collect()
    }

    /// at most `limit` of the most recently touched states
    pub fn latest(&self, limit: usize) -> Vec<SensorState> {
        let mut all = self.list();
        let skip = all.len().saturating_sub(limit);
        all.split_off(skip)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.sensors.values().filter(|e| e.state.active).count()
    }
}
