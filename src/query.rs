//! ==============================================================================
//! query.rs - read-only views for polling consumers
//! ==============================================================================
//!
//! none of these mutate the hub. an unknown sensor id is not an error:
//! its history is simply empty, same as a known sensor whose readings
//! have all been evicted.
//!
//! ==============================================================================

use crate::domain::{Reading, SensorState, SensorStats};
use crate::hub::Hub;

#[derive(Clone)]
pub struct QueryService {
    hub: Hub,
}

impl QueryService {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    /// up to `limit` most recently updated sensors
    pub fn get_latest(&self, limit: usize) -> Vec<SensorState> {
        self.hub.read(|core| core.registry.latest(limit))
    }

    /// the latest `limit` readings of one sensor, oldest first
    pub fn get_sensor_history(&self, sensor_id: &str, limit: usize) -> Vec<Reading> {
        self.hub.read(|core| core.history.query_by_sensor(sensor_id, limit))
    }

    pub fn list_sensors(&self) -> Vec<SensorState> {
        self.hub.read(|core| core.registry.list())
    }

    /// last measured values per sensor
    pub fn global_stats(&self) -> Vec<SensorStats> {
        self.hub
            .read(|core| core.registry.list())
            .iter()
            .map(SensorStats::from)
            .collect()
    }
}
