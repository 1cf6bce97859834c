// src/exporters/prometheus.rs
//! Prometheus metrics sink
//!
//! Maps events onto Prometheus series served over HTTP:
//!
//! - TRANSFER, BACKEND: counters incremented by the event value
//! - PERFORMANCE, MEMORY: gauges set to the event value
//! - CONNECTION, ERROR, SYSTEM, CUSTOM: accepted and ignored
//!
//! Series are labeled with `category`, plus `agent_name` and `hostname` as
//! global labels. The scrape endpoint runs on a dedicated thread with its
//! own single-threaded tokio runtime, so the exporter works from plain
//! threads. If the endpoint cannot be started the exporter stays
//! uninitialized and every export returns an error.

use crate::exporters::exporter::{ExporterInitParams, TelemetryExporter};
use crate::recording::event::{Event, EventCategory};
use crate::utils::errors::{Result, TelemetryError};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

const TRANSFER_LABEL: &str = "TELEMETRY_TRANSFER";
const BACKEND_LABEL: &str = "TELEMETRY_BACKEND";
const PERFORMANCE_LABEL: &str = "TELEMETRY_PERFORMANCE";
const MEMORY_LABEL: &str = "TELEMETRY_MEMORY";

struct Endpoint {
    recorder: PrometheusRecorder,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

/// Prometheus-backed exporter
pub struct PrometheusExporter {
    agent_name: String,
    buffer_size: usize,
    hostname: String,
    bind_address: SocketAddr,
    endpoint: Option<Endpoint>,
}

impl PrometheusExporter {
    /// Build the exporter and start its scrape endpoint
    ///
    /// Never fails: an endpoint that cannot start leaves the exporter in an
    /// uninitialized state that rejects every event.
    pub fn new(params: &ExporterInitParams) -> Self {
        let hostname = local_hostname();
        let bind_address = bind_address(params.metrics_port, params.metrics_local);

        let endpoint = match start_endpoint(bind_address, &params.agent_name, &hostname) {
            Ok(endpoint) => {
                info!("Prometheus telemetry exporter listening on {}", bind_address);
                Some(endpoint)
            }
            Err(e) => {
                error!("Failed to initialize Prometheus telemetry exporter: {}", e);
                None
            }
        };

        Self {
            agent_name: params.agent_name.clone(),
            buffer_size: params.max_events_buffered,
            hostname,
            bind_address,
            endpoint,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Handle for rendering the current exposition text
    pub fn handle(&self) -> Option<PrometheusHandle> {
        self.endpoint.as_ref().map(|e| e.recorder.handle())
    }
}

impl TelemetryExporter for PrometheusExporter {
    fn export_event(&self, event: &Event) -> Result<()> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| TelemetryError::export("Prometheus exporter not initialized"))?;

        let name = event.name().to_string();
        let value = event.value();

        metrics::with_local_recorder(&endpoint.recorder, || match event.category() {
            EventCategory::Transfer => {
                metrics::counter!(name, "category" => TRANSFER_LABEL).increment(value)
            }
            EventCategory::Backend => {
                metrics::counter!(name, "category" => BACKEND_LABEL).increment(value)
            }
            EventCategory::Performance => {
                metrics::gauge!(name, "category" => PERFORMANCE_LABEL).set(value as f64)
            }
            EventCategory::Memory => {
                metrics::gauge!(name, "category" => MEMORY_LABEL).set(value as f64)
            }
            EventCategory::Connection
            | EventCategory::Error
            | EventCategory::System
            | EventCategory::Custom => {}
        });

        Ok(())
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn agent_name(&self) -> &str {
        &self.agent_name
    }
}

impl Drop for PrometheusExporter {
    fn drop(&mut self) {
        if let Some(mut endpoint) = self.endpoint.take() {
            if let Some(shutdown) = endpoint.shutdown.take() {
                let _ = shutdown.send(());
            }
            if let Some(server) = endpoint.server.take() {
                if server.join().is_err() {
                    warn!("Prometheus endpoint thread panicked");
                }
            }
            debug!("Prometheus telemetry exporter destroyed");
        }
    }
}

fn bind_address(port: u16, local: bool) -> SocketAddr {
    let ip = if local {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    };
    SocketAddr::new(ip, port)
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn start_endpoint(address: SocketAddr, agent_name: &str, hostname: &str) -> Result<Endpoint> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TelemetryError::BackendInitialization(format!("runtime: {}", e)))?;

    // The HTTP listener binds while building, which needs a runtime context.
    let (recorder, exporter) = {
        let _guard = runtime.enter();
        PrometheusBuilder::new()
            .with_http_listener(address)
            .add_global_label("agent_name", agent_name)
            .add_global_label("hostname", hostname)
            .build()
            .map_err(|e| TelemetryError::BackendInitialization(e.to_string()))?
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server = std::thread::Builder::new()
        .name("telemetry-prometheus".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                tokio::select! {
                    result = exporter => {
                        if let Err(e) = result {
                            error!("Prometheus endpoint stopped: {:?}", e);
                        }
                    }
                    _ = shutdown_rx => {}
                }
            });
        })
        .map_err(|e| TelemetryError::BackendInitialization(format!("thread: {}", e)))?;

    Ok(Endpoint {
        recorder,
        shutdown: Some(shutdown_tx),
        server: Some(server),
    })
}
