//! # Startup Telemetry
//!
//! Logging and metrics bootstrap for the startup orchestrator.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter`, pretty or JSON output
//! - **Metrics**: Prometheus counters, gauges and histograms in a dedicated
//!   registry, rendered on demand in the text exposition format
//!
//! ## Usage
//!
//! ```rust,ignore
//! use startup_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ORCH_SERVICE_NAME` | `startup-orchestrator` | Service name in logs |
//! | `ORCH_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honoured) |
//! | `ORCH_JSON_LOGS` | `false` | JSON log lines |
//! | `ORCH_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `ORCH_METRICS` | `true` | Register Prometheus metrics |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_env_filter, init_logging, StructuredLogger};
pub use metrics::{
    register_metrics, HistogramTimer, MetricsHandle, DEPENDENCY_WAIT_DURATION,
    EVENTS_PUBLISHED, SERVICES_INITIALIZED, SERVICES_RUNNING, SERVICE_FAILURES,
    SERVICE_RESTARTS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed (usually: already set).
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    /// Prometheus registration or encoding failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// A configuration value could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, if enabled, metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so that startup logging can already count events
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let logger = init_logging(config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = logger.is_json(),
        metrics = metrics.is_some(),
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        _logger: logger,
        metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logger: StructuredLogger,
    metrics: Option<MetricsHandle>,
}

impl TelemetryGuard {
    /// Metrics handle, if metrics were enabled.
    #[must_use]
    pub fn metrics(&self) -> Option<&MetricsHandle> {
        self.metrics.as_ref()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for creating a span with service context.
///
/// ```rust,ignore
/// let _span = service_span!("restart", service = "Backend").entered();
/// ```
#[macro_export]
macro_rules! service_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
