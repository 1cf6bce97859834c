// src/exporters/registry.rs
//! Exporter registry
//!
//! Maps case-insensitive backend names to constructors. The process-wide
//! instance is built once, on first use, with the built-in backends
//! registered; later registrations override earlier ones with the same name.

use crate::exporters::exporter::{ExporterInitParams, TelemetryExporter};
use crate::exporters::prometheus::PrometheusExporter;
use crate::exporters::ring_buffer_exporter::RingBufferExporter;
use crate::utils::errors::{Result, TelemetryError};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the ring buffer backend
pub const BUFFER_BACKEND: &str = "buffer";

/// Name of the Prometheus backend
pub const PROMETHEUS_BACKEND: &str = "prometheus";

/// Exporter constructor
pub type ExporterCreator =
    Arc<dyn Fn(&ExporterInitParams) -> Result<Box<dyn TelemetryExporter>> + Send + Sync>;

static GLOBAL: Lazy<ExporterRegistry> = Lazy::new(ExporterRegistry::with_builtins);

/// Backend name to constructor mapping
pub struct ExporterRegistry {
    creators: RwLock<HashMap<String, ExporterCreator>>,
}

impl ExporterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            creators: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding the built-in backends
    pub fn with_builtins() -> Self {
        let registry = Self::new();

        registry.register_backend(BUFFER_BACKEND, |params| {
            Ok(Box::new(RingBufferExporter::new(params)?) as Box<dyn TelemetryExporter>)
        });
        registry.register_backend(PROMETHEUS_BACKEND, |params| {
            Ok(Box::new(PrometheusExporter::new(params)) as Box<dyn TelemetryExporter>)
        });

        registry
    }

    /// The process-wide registry
    pub fn global() -> &'static ExporterRegistry {
        &GLOBAL
    }

    /// Register a constructor under `name`
    pub fn register_backend<F>(&self, name: &str, creator: F)
    where
        F: Fn(&ExporterInitParams) -> Result<Box<dyn TelemetryExporter>> + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        let previous = self.creators.write().insert(key, Arc::new(creator));

        if previous.is_some() {
            debug!("Replaced telemetry exporter: {}", name);
        } else {
            debug!("Registered telemetry exporter: {}", name);
        }
    }

    /// Construct the exporter registered under `name`
    ///
    /// Constructor errors are passed through unchanged.
    pub fn create_exporter(
        &self,
        name: &str,
        params: &ExporterInitParams,
    ) -> Result<Box<dyn TelemetryExporter>> {
        let creator = self
            .creators
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| TelemetryError::UnknownBackend(name.to_string()))?;

        info!("Creating telemetry exporter of type: {}", name);
        creator(params)
    }

    /// Whether a backend is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.creators.read().contains_key(&name.to_lowercase())
    }

    /// Registered backend names, sorted
    pub fn backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.creators.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ExporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
