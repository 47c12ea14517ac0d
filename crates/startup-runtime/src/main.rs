//! # Startup Runtime
//!
//! Brings the default services up, reports the result and waits for Ctrl+C.
//!
//! Configuration comes from `ORCH_*` environment variables; see
//! `OrchestratorConfig::from_env`, `TelemetryConfig::from_env` and
//! `RuntimeConfig::from_env`.

use anyhow::{Context, Result};
use startup_orchestrator::OrchestratorConfig;
use startup_runtime::{RuntimeConfig, StartupRuntime};
use startup_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = init_telemetry(&TelemetryConfig::from_env())
        .context("Failed to initialize telemetry")?;

    let orchestrator_config = OrchestratorConfig::from_env();
    orchestrator_config
        .validate()
        .context("Invalid orchestrator configuration")?;

    let runtime = StartupRuntime::new(RuntimeConfig::from_env(), orchestrator_config);
    let report = runtime.start().await?;

    info!(
        "Startup report:\n{}",
        serde_json::to_string_pretty(&report).context("Failed to render startup report")?
    );
    if let Some(metrics) = telemetry.metrics() {
        debug!("Metrics:\n{}", metrics.gather_text()?);
    }

    info!("Services are running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;

    Ok(())
}
