//! Prometheus metrics for the startup orchestrator.
//!
//! All metrics follow the naming convention: `orch_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: services initialized, failures by kind, restarts by outcome
//! - **Gauge**: services currently running
//! - **Histogram**: time spent waiting for dependencies

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Metrics registry owned by the orchestrator
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // STARTUP METRICS
    // =========================================================================

    /// Services whose start routine completed
    pub static ref SERVICES_INITIALIZED: Counter = Counter::new(
        "orch_services_initialized_total",
        "Total number of services that reached Running"
    ).expect("metric creation failed");

    /// Initialization failures by kind
    pub static ref SERVICE_FAILURES: CounterVec = CounterVec::new(
        Opts::new("orch_service_failures_total", "Service failures by kind"),
        &["kind"]  // kind: cycle/dependency_timeout/start_routine
    ).expect("metric creation failed");

    /// Services currently Running
    pub static ref SERVICES_RUNNING: Gauge = Gauge::new(
        "orch_services_running",
        "Number of services currently in the Running lifecycle state"
    ).expect("metric creation failed");

    /// Time spent in the dependency wait loop
    pub static ref DEPENDENCY_WAIT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "orch_dependency_wait_seconds",
            "Time a service spent waiting for its dependencies"
        ).buckets(exponential_buckets(0.001, 2.0, 16).expect("valid bucket layout"))
    ).expect("metric creation failed");

    // =========================================================================
    // RECOVERY METRICS
    // =========================================================================

    /// Restart requests by outcome
    pub static ref SERVICE_RESTARTS: CounterVec = CounterVec::new(
        Opts::new("orch_service_restarts_total", "Restart requests by outcome"),
        &["outcome"]  // outcome: success/failed/exhausted
    ).expect("metric creation failed");

    // =========================================================================
    // EVENT RELAY METRICS
    // =========================================================================

    /// Events handed to the bus, by event name
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("orch_events_published_total", "Events published to the bus"),
        &["event"]
    ).expect("metric creation failed");
}

/// Handle onto the orchestrator's metrics registry.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text(&self) -> Result<String, TelemetryError> {
        encode_registry(&self.registry)
    }
}

/// Register all metrics with the orchestrator registry.
///
/// Calling this more than once is harmless; already-registered collectors
/// are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SERVICES_INITIALIZED.clone()),
        Box::new(SERVICE_FAILURES.clone()),
        Box::new(SERVICES_RUNNING.clone()),
        Box::new(DEPENDENCY_WAIT_DURATION.clone()),
        Box::new(SERVICE_RESTARTS.clone()),
        Box::new(EVENTS_PUBLISHED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

fn encode_registry(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
