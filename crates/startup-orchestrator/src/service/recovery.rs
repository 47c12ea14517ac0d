//! # Recovery Manager
//!
//! Restarts single services on request and stops everything on shutdown.
//!
//! A restart re-runs exactly one service: it is marked `Initializing`, given
//! a short settle delay, then put through the same dependency wait and start
//! routine as during startup. Dependents are never restarted along with it.
//!
//! Consecutive failed restarts are counted per service. Once the configured
//! cap is reached further requests are refused with
//! [`StartupError::RecoveryExhausted`] until a restart succeeds or the
//! counters are reset.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{Health, Lifecycle};
use startup_telemetry::{log_service_event, metric_inc, service_span};
use startup_telemetry::metrics::SERVICE_RESTARTS;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use crate::adapters::EventRelay;
use crate::domain::DependencyGraph;
use crate::error::StartupError;
use crate::ports::inbound::RestartHandler;
use crate::service::orchestrator::Orchestrator;
use crate::service::registry::StatusRegistry;

pub struct RecoveryManager {
    orchestrator: Arc<Orchestrator>,
    graph: Arc<RwLock<DependencyGraph>>,
    registry: Arc<StatusRegistry>,
    relay: Arc<EventRelay>,
    failed_attempts: Mutex<HashMap<String, u32>>,
}

impl RecoveryManager {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        graph: Arc<RwLock<DependencyGraph>>,
        registry: Arc<StatusRegistry>,
        relay: Arc<EventRelay>,
    ) -> Self {
        Self {
            orchestrator,
            graph,
            registry,
            relay,
            failed_attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Re-run one service.
    pub async fn restart(&self, service_name: &str) -> Result<(), StartupError> {
        let span = service_span!("restart", service = %service_name);
        self.restart_service(service_name).instrument(span).await
    }

    async fn restart_service(&self, service_name: &str) -> Result<(), StartupError> {
        let descriptor = self.graph.read().get(service_name).cloned();
        let Some(descriptor) = descriptor else {
            warn!(service = %service_name, "[Recovery] Restart requested for unknown service");
            return Err(StartupError::UnknownService(service_name.to_string()));
        };

        let cap = self.orchestrator.config().max_restart_attempts;
        let failures = self.failed_attempts(service_name);
        if cap > 0 && failures >= cap {
            metric_inc!(SERVICE_RESTARTS, &["exhausted"]);
            log_service_event!(warn, service_name, "[Recovery] Restart refused", failures);
            return Err(StartupError::RecoveryExhausted {
                service: service_name.to_string(),
                attempts: failures,
            });
        }

        log_service_event!(info, service_name, "[Recovery] Restarting service");
        self.registry
            .update(service_name, Lifecycle::Initializing, Health::Unknown, None)
            .await;
        tokio::time::sleep(self.orchestrator.config().restart_settle_delay).await;

        match self.orchestrator.bring_up(&descriptor).await {
            Ok(()) => {
                self.failed_attempts.lock().remove(service_name);
                metric_inc!(SERVICE_RESTARTS, &["success"]);
                self.relay.service_restarted(service_name).await;
                log_service_event!(info, service_name, "[Recovery] Service restarted");
                Ok(())
            }
            Err(e) => {
                *self
                    .failed_attempts
                    .lock()
                    .entry(service_name.to_string())
                    .or_insert(0) += 1;
                metric_inc!(SERVICE_RESTARTS, &["failed"]);
                Err(e)
            }
        }
    }

    /// Consecutive failed restarts recorded for `service_name`.
    pub fn failed_attempts(&self, service_name: &str) -> u32 {
        self.failed_attempts
            .lock()
            .get(service_name)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset_attempts(&self) {
        self.failed_attempts.lock().clear();
    }

    /// Stop every Running service in reverse dependency order, then drop
    /// all status entries.
    ///
    /// A failing stop routine is logged and does not interrupt the rest.
    pub async fn shutdown_all(&self) {
        let order = {
            let graph = self.graph.read();
            graph
                .resolve_order()
                .unwrap_or_else(|_| graph.names().to_vec())
        };

        info!(services = order.len(), "[Recovery] Shutting down services");

        for name in order.iter().rev() {
            if self.registry.lifecycle_of(name) != Some(Lifecycle::Running) {
                continue;
            }

            let routine = self
                .graph
                .read()
                .get(name)
                .and_then(|d| d.routine().cloned());
            if let Some(routine) = routine {
                if let Err(e) = routine.stop().await {
                    log_service_event!(warn, name, "[Recovery] Stop routine failed", error = %e);
                }
            }

            self.registry
                .update(name, Lifecycle::Stopped, Health::Unknown, None)
                .await;
            self.relay.service_stopped(name).await;
            log_service_event!(info, name, "[Recovery] Service stopped");
        }

        self.registry.clear();
        self.reset_attempts();
        self.orchestrator.reset();
        info!("[Recovery] All services stopped");
    }

    /// Shut everything down, then run a full `initialize_all`.
    pub async fn restart_all(&self) -> Result<(), StartupError> {
        info!("[Recovery] Restarting all services");
        self.shutdown_all().await;
        self.orchestrator.initialize_all().await
    }
}

#[async_trait]
impl RestartHandler for RecoveryManager {
    async fn handle_restart(&self, service_name: &str) -> Result<(), StartupError> {
        self.restart(service_name).await
    }
}
