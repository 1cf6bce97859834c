// src/utils/errors.rs
//! Error types for telemetry capture
//!
//! Construction-time problems (bad configuration, unusable backing store)
//! surface as hard errors. Per-event problems surface as
//! [`TelemetryError::ExportFailed`] values that callers log and drop.

/// Result type alias for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Main error type for telemetry capture
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Caller configuration is unusable (empty agent name, missing directory)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No exporter backend is registered under the requested name
    #[error("Unknown telemetry exporter type: '{0}'")]
    UnknownBackend(String),

    /// Backing store could not be created, sized or mapped
    #[error("Failed to create backing store: {0}")]
    StoreCreation(String),

    /// Backing store is missing or is not a ring buffer
    #[error("Backing store not found: {0}")]
    StoreNotFound(String),

    /// Backing store was written with a different layout version
    #[error("Ring buffer version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// A single export could not complete
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// External backend could not be brought up
    #[error("Backend initialization failed: {0}")]
    BackendInitialization(String),

    /// Configuration source could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] config::ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelemetryError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an export failure
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::ExportFailed(msg.into())
    }

    /// Whether this error should abort agent startup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnknownBackend(_) | Self::ConfigParse(_)
        )
    }
}
