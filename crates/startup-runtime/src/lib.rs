//! # Startup Runtime
//!
//! Host for the startup orchestrator. The `startup-runtime` binary wires
//! telemetry, declares the default services and phases and runs them; this
//! library exposes the same pieces for tests.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (env)
//! 2. Register default services and phases
//! 3. Start the restart listener
//! 4. Run the phase plan (or the flat dependency order)
//! 5. Log the status table and the startup report
//! 6. Wait for Ctrl+C, then stop every service in reverse order

pub mod config;
pub mod defaults;

pub use config::RuntimeConfig;

use anyhow::{anyhow, Result};
use startup_orchestrator::{
    OrchestratorConfig, ServiceEngine, StartupApi, StartupOverallStatus, StartupReport,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Owns the engine and the background tasks around it.
pub struct StartupRuntime {
    engine: Arc<ServiceEngine>,
    config: RuntimeConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl StartupRuntime {
    /// Create a runtime with the default services registered.
    pub fn new(config: RuntimeConfig, orchestrator: OrchestratorConfig) -> Self {
        let engine = Arc::new(ServiceEngine::new(orchestrator));
        defaults::register_default_services(&engine, &config);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            engine,
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn engine(&self) -> Arc<ServiceEngine> {
        Arc::clone(&self.engine)
    }

    /// Run the startup sequence.
    ///
    /// A failed startup that still leaves the system operational (a
    /// `partial` report) is logged and tolerated; anything worse is an error.
    pub async fn start(&self) -> Result<StartupReport> {
        info!("===========================================");
        info!("  Startup Orchestrator Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "  Mode: {}",
            if self.config.phased { "phased" } else { "dependency order" }
        );
        info!("===========================================");

        self.engine.start_restart_listener();

        let result = if self.config.phased {
            self.engine.initialize_phased().await
        } else {
            self.engine.initialize_all().await
        };

        self.engine.log_status();
        let report = self.engine.report();

        if let Err(e) = result {
            if report.is_operational() {
                warn!(
                    error = %e,
                    running = report.running_services,
                    total = report.total_services,
                    "Startup incomplete, continuing with a partial system"
                );
            } else {
                error!(error = %e, "Startup failed");
                return Err(anyhow!(e).context(format!(
                    "startup failed with {} of {} services running",
                    report.running_services, report.total_services
                )));
            }
        }

        if report.overall_status == StartupOverallStatus::Ready {
            info!(
                services = report.total_services,
                elapsed_ms = report.startup_time_ms,
                "All services ready"
            );
        }

        self.spawn_status_reporter();
        Ok(report)
    }

    /// Periodically log the status table until shutdown.
    fn spawn_status_reporter(&self) {
        let Some(period) = self.config.status_interval else {
            return;
        };

        let engine = Arc::clone(&self.engine);
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; the table was just logged
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => engine.log_status(),
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    /// Stop background tasks, then every running service.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        self.engine.stop_restart_listener().await;
        self.engine.shutdown_all().await;

        info!("Shutdown complete");
    }
}
