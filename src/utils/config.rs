// src/utils/config.rs
//! Telemetry configuration
//!
//! Configuration is layered from:
//! - Built-in defaults
//! - An optional configuration file (TOML, JSON, YAML by extension)
//! - Environment variables prefixed with `TRANSFER_TELEMETRY_`

use crate::exporters::ExporterInitParams;
use crate::utils::errors::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TRANSFER_TELEMETRY";

/// Default metrics endpoint port
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Default ring capacity (events)
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether telemetry capture is on at all
    #[serde(default)]
    pub enabled: bool,

    /// Base directory for ring buffer stores
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Exporter backend name (case-insensitive)
    #[serde(default = "default_exporter")]
    pub exporter: String,

    /// Ring capacity in events
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Metrics endpoint port
    #[serde(default = "default_metrics_port", deserialize_with = "lenient_port")]
    pub metrics_port: u16,

    /// Bind the metrics endpoint to loopback only
    #[serde(default)]
    pub metrics_local: bool,

    /// Reader poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_exporter() -> String {
    "buffer".to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

fn default_poll_interval_ms() -> u64 {
    100
}

/// Accept any port spelling; out-of-range or non-numeric values fall back
/// to the default instead of failing startup.
fn lenient_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(i64),
        Text(String),
    }

    let parsed = match RawPort::deserialize(deserializer)? {
        RawPort::Number(n) => u16::try_from(n).ok(),
        RawPort::Text(s) => s.trim().parse::<u16>().ok(),
    };

    match parsed {
        Some(port) if port != 0 => Ok(port),
        _ => {
            warn!(
                "Invalid metrics port, expected numeric port between 1-65535. Using default: {}",
                DEFAULT_METRICS_PORT
            );
            Ok(DEFAULT_METRICS_PORT)
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            exporter: default_exporter(),
            buffer_size: default_buffer_size(),
            metrics_port: default_metrics_port(),
            metrics_local: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::build(None, None)
    }

    /// Load configuration from a file, with environment overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(Some(path.as_ref()), None)
    }

    /// Load configuration from an explicit set of environment variables
    /// instead of the process environment
    pub fn from_env_map<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::build(None, Some(map))
    }

    fn build(file: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let config: TelemetryConfig = builder.build()?.try_deserialize()?;

        info!(
            "Telemetry configuration loaded (enabled: {}, exporter: {})",
            config.enabled, config.exporter
        );

        Ok(config)
    }

    /// Exporter construction parameters for the given agent
    pub fn init_params(&self, agent_name: impl Into<String>) -> ExporterInitParams {
        ExporterInitParams {
            agent_name: agent_name.into(),
            max_events_buffered: self.buffer_size,
            telemetry_dir: self.dir.clone(),
            metrics_port: self.metrics_port,
            metrics_local: self.metrics_local,
        }
    }

    /// Backing store path for the given agent, if a directory is configured
    pub fn store_path(&self, agent_name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(agent_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert!(!config.enabled);
        assert!(config.dir.is_none());
        assert_eq!(config.exporter, "buffer");
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
    }

    #[test]
    fn test_empty_env_uses_defaults() {
        let config = TelemetryConfig::from_env_map(Vec::<(String, String)>::new()).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.exporter, "buffer");
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn test_env_overrides() {
        let config = TelemetryConfig::from_env_map([
            ("TRANSFER_TELEMETRY_ENABLED", "true"),
            ("TRANSFER_TELEMETRY_DIR", "/tmp/telemetry"),
            ("TRANSFER_TELEMETRY_EXPORTER", "PROMETHEUS"),
            ("TRANSFER_TELEMETRY_BUFFER_SIZE", "128"),
            ("TRANSFER_TELEMETRY_METRICS_PORT", "9191"),
            ("TRANSFER_TELEMETRY_METRICS_LOCAL", "yes"),
        ])
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.dir, Some(PathBuf::from("/tmp/telemetry")));
        assert_eq!(config.exporter, "PROMETHEUS");
        assert_eq!(config.buffer_size, 128);
        assert_eq!(config.metrics_port, 9191);
        assert!(config.metrics_local);
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config =
            TelemetryConfig::from_env_map([("TRANSFER_TELEMETRY_METRICS_PORT", "not-a-port")])
                .unwrap();
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);

        let config =
            TelemetryConfig::from_env_map([("TRANSFER_TELEMETRY_METRICS_PORT", "70000")]).unwrap();
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
    }

    #[test]
    fn test_unrelated_env_ignored() {
        let config = TelemetryConfig::from_env_map([("OTHER_DIR", "/nowhere")]).unwrap();
        assert!(config.dir.is_none());
    }

    #[test]
    fn test_init_params() {
        let config = TelemetryConfig {
            dir: Some(PathBuf::from("/var/run/telemetry")),
            buffer_size: 64,
            ..Default::default()
        };

        let params = config.init_params("agent-0");
        assert_eq!(params.agent_name, "agent-0");
        assert_eq!(params.max_events_buffered, 64);
        assert_eq!(
            config.store_path("agent-0"),
            Some(PathBuf::from("/var/run/telemetry/agent-0"))
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.json");
        std::fs::write(
            &path,
            r#"{ "enabled": true, "exporter": "buffer", "buffer_size": 32 }"#,
        )
        .unwrap();

        let config = TelemetryConfig::load_from(&path).unwrap();
        assert!(config.enabled);
        assert_eq!(config.buffer_size, 32);
    }
}
