//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `hub.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: bind address (PORT from the environment wins).
//!     - StorageConfig: how many readings the history keeps.
//!     - StreamingConfig: per-observer buffer and sse keep-alive.
//!     - DefaultsConfig: location given to sensors with no metadata.
//!     - sensors: optional per-sensor name/location overrides.
//!     - LoggingConfig: log level and whether readings are echoed.
//!
//! ==============================================================================

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::SensorMetadata;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub sensors: HashMap<String, SensorEntry>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 5137 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub max_stored: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { max_stored: 1000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StreamingConfig {
    /// events an observer may have queued before it counts as stalled
    pub observer_buffer: usize,
    pub keep_alive_seconds: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { observer_buffer: 64, keep_alive_seconds: 15 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DefaultsConfig {
    pub lat: f64,
    pub lng: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self { lat: 34.6807, lng: -1.9102 }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SensorEntry {
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl HubConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Load with default fallback, then apply environment overrides
    ///
    /// runs before logging is up, so what happened is returned instead of logged.
    pub fn load_or_default() -> (Self, ConfigOrigin) {
        let mut paths = vec![
            PathBuf::from("config").join("hub.toml"),
            PathBuf::from("..").join("config").join("hub.toml"),
        ];
        if let Ok(explicit) = std::env::var("HUB_CONFIG") {
            paths.insert(0, PathBuf::from(explicit));
        }

        let mut failures = Vec::new();
        let mut loaded = None;
        for path in paths.into_iter().filter(|p| p.exists()) {
            match Self::load(&path) {
                Ok(config) => {
                    loaded = Some((config, path));
                    break;
                }
                Err(e) => failures.push(format!("{}: {}", path.display(), e)),
            }
        }

        let (mut config, origin) = match loaded {
            Some((config, path)) => (config, ConfigOrigin::File { path, failures }),
            None => (Self::default(), ConfigOrigin::Defaults { failures }),
        };
        config.apply_env(std::env::var("PORT").ok().as_deref());
        (config, origin)
    }

    /// PORT overrides the configured port; garbage is ignored
    pub fn apply_env(&mut self, port: Option<&str>) {
        if let Some(raw) = port {
            if let Ok(port) = raw.trim().parse::<u16>() {
                self.server.port = port;
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn catalog(&self) -> SensorCatalog {
        SensorCatalog { defaults: self.defaults.clone(), sensors: self.sensors.clone() }
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        tracing::info!("┌─────────────────────────────────────────┐");
        tracing::info!("│            HUB CONFIGURATION            │");
        tracing::info!("├─────────────────────────────────────────┤");
        tracing::info!("│ Bind: {}", self.bind_addr());
        tracing::info!("│ History capacity: {}", self.storage.max_stored);
        tracing::info!("│ Observer buffer: {}", self.streaming.observer_buffer);
        tracing::info!("│ Known sensors: {}", self.sensors.len());
        tracing::info!("│ Log Level: {}", self.logging.level);
        tracing::info!("└─────────────────────────────────────────┘");
    }
}

/// where the running configuration came from
#[derive(Debug, Clone)]
pub enum ConfigOrigin {
    File { path: PathBuf, failures: Vec<String> },
    Defaults { failures: Vec<String> },
}

impl ConfigOrigin {
    pub fn log(&self) {
        let failures = match self {
            ConfigOrigin::File { path, failures } => {
                tracing::info!("[CONFIG] Loaded from {}", path.display());
                failures
            }
            ConfigOrigin::Defaults { failures } => {
                tracing::warn!("[CONFIG] No usable config file found - using defaults");
                failures
            }
        };
        for failure in failures {
            tracing::warn!("[CONFIG] Failed to load {}", failure);
        }
    }
}

/// static metadata lookup for sensors
#[derive(Debug, Clone, Default)]
pub struct SensorCatalog {
    defaults: DefaultsConfig,
    sensors: HashMap<String, SensorEntry>,
}

impl SensorCatalog {
    /// configured metadata for `sensor_id`, with gaps filled from the defaults
    pub fn metadata_for(&self, sensor_id: &str) -> SensorMetadata {
        let entry = self.sensors.get(sensor_id);
        SensorMetadata {
            name: entry
                .and_then(|e| e.name.clone())
                .unwrap_or_else(|| format!("Sensor {}", sensor_id)),
            lat: entry.and_then(|e| e.lat).unwrap_or(self.defaults.lat),
            lng: entry.and_then(|e| e.lng).unwrap_or(self.defaults.lng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = HubConfig::parse("").unwrap();
        assert_eq!(config.server.port, 5137);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.max_stored, 1000);
        assert_eq!(config.streaming.observer_buffer, 64);
        assert!(config.logging.show_sensor_data);
    }

    #[test]
    fn test_partial_sections() {
        let config = HubConfig::parse(
            r#"
            [storage]
            max_stored = 50

            [server]
            port = 8080

            [sensors.greenhouse]
            name = "Greenhouse"
            lat = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.max_stored, 50);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.streaming.keep_alive_seconds, 15);

        let meta = config.catalog().metadata_for("greenhouse");
        assert_eq!(meta.name, "Greenhouse");
        assert_eq!(meta.lat, 1.5);
        assert_eq!(meta.lng, -1.9102);
    }

    #[test]
    fn test_unknown_sensor_gets_default_metadata() {
        let meta = HubConfig::default().catalog().metadata_for("S9");
        assert_eq!(meta, SensorMetadata { name: "Sensor S9".into(), lat: 34.6807, lng: -1.9102 });
    }

    #[test]
    fn test_port_override() {
        let mut config = HubConfig::default();
        config.apply_env(Some("9000"));
        assert_eq!(config.server.port, 9000);
        config.apply_env(Some("not-a-port"));
        assert_eq!(config.server.port, 9000);
        config.apply_env(None);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(HubConfig::parse("[storage\nmax_stored = ").is_err());
    }
}
