//! ==============================================================================
//! history.rs - bounded history store
//! ==============================================================================
//!
//! a fixed-capacity, arrival-ordered log of readings. when full, appending
//! evicts the oldest entry. there is no delete; eviction is the only removal.
//!
//! ==============================================================================

use std::collections::VecDeque;

use crate::domain::Reading;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug)]
pub struct HistoryStore {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl HistoryStore {
    /// a capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { readings: VecDeque::with_capacity(capacity), capacity }
    }

    /// append in arrival order, returning the evicted reading if the store was full
    pub fn append(&mut self, reading: Reading) -> Option<Reading> {
        let evicted = if self.readings.len() == self.capacity {
            self.readings.pop_front()
        } else {
            None
        };
        self.readings.push_back(reading);
        evicted
    }

    /// the most recent `limit` readings for `sensor_id`, oldest first
    ///
    /// an unknown sensor yields an empty vec rather than an error.
    pub fn query_by_sensor(&self, sensor_id: &str, limit: usize) -> Vec<Reading> {
        let mut newest_first: Vec<Reading> = self
            .readings
            .iter()
            .rev()
            .filter(|r| r.sensor_id == sensor_id)
            .take(limit)
            .cloned()
            .collect();
        newest_first.reverse();
        newest_first
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// arrival order, oldest first
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }
}
