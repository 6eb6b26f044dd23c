//! ==============================================================================
//! health.rs - health reporter
//! ==============================================================================
//!
//! purpose:
//!     answers GET /api/health with counters derived from live hub state:
//!     attached observers, stored readings (and the history capacity),
//!     active sensors and process uptime. nothing here is cached; every
//!     report is read under the hub lock at request time.
//!
//! relationships:
//!     - reads: hub.rs (history, registry, broadcaster)
//!     - used by: http.rs
//!
//! ==============================================================================

use crate::domain::HealthReport;
use crate::hub::Hub;

pub const MODE: &str = "in-memory streaming (no persistent storage)";

/// aggregate counters, all derived from the hub's current state
#[derive(Clone)]
pub struct HealthReporter {
    hub: Hub,
}

impl HealthReporter {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    pub fn report(&self) -> HealthReport {
        let (clients, data_points, capacity, active_sensors) = self.hub.read(|core| {
            (
                core.broadcaster.len(),
                core.history.len(),
                core.history.capacity(),
                core.registry.active_count(),
            )
        });

        HealthReport {
            status: "ok".to_string(),
            mode: MODE.to_string(),
            clients,
            data_points,
            capacity,
            active_sensors,
            uptime_seconds: self.hub.uptime_seconds(),
        }
    }
}
