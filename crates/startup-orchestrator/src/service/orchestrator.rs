//! # Initialization Orchestrator
//!
//! Brings registered services up in dependency order. For each service:
//!
//! 1. Mark it `Initializing`
//! 2. Poll the Status Registry until every dependency is `Running`, or give
//!    up after the dependency timeout
//! 3. Await its start routine, if it has one
//! 4. Mark it `Running`/`Healthy` and announce `service.initialized`
//!
//! A failure at step 2 or 3 marks the service `Failed`/`Critical`, announces
//! `service.initialization_failed` and aborts the remaining sequence.

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use shared_types::{Health, Lifecycle, StartupReport};
use startup_telemetry::metrics::{DEPENDENCY_WAIT_DURATION, SERVICES_INITIALIZED, SERVICE_FAILURES};
use startup_telemetry::{log_service_event, metric_inc, time_histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::adapters::EventRelay;
use crate::domain::{
    DependencyGraph, OrchestratorConfig, PhasePlanner, ServiceDescriptor, StartupPhase,
};
use crate::error::StartupError;
use crate::service::registry::StatusRegistry;

/// Wall-clock bounds of the most recent startup attempt.
#[derive(Debug, Clone, Copy)]
struct AttemptClock {
    started: Instant,
    finished: Option<Instant>,
}

pub struct Orchestrator {
    graph: Arc<RwLock<DependencyGraph>>,
    registry: Arc<StatusRegistry>,
    planner: Arc<RwLock<PhasePlanner>>,
    relay: Arc<EventRelay>,
    config: OrchestratorConfig,
    clock: Mutex<Option<AttemptClock>>,
}

impl Orchestrator {
    pub fn new(
        graph: Arc<RwLock<DependencyGraph>>,
        registry: Arc<StatusRegistry>,
        planner: Arc<RwLock<PhasePlanner>>,
        relay: Arc<EventRelay>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            graph,
            registry,
            planner,
            relay,
            config,
            clock: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Resolve the current graph, counting cycles as failures.
    pub fn resolve_order(&self) -> Result<Vec<String>, StartupError> {
        let order = self.graph.read().resolve_order();
        if let Err(e) = &order {
            metric_inc!(SERVICE_FAILURES, &[e.kind()]);
            error!(error = %e, "[Orchestrator] Dependency resolution failed");
        }
        order
    }

    /// Bring every registered service up, one at a time, in resolution order.
    pub async fn initialize_all(&self) -> Result<(), StartupError> {
        let attempt = Uuid::new_v4();
        let span = tracing::info_span!("initialize_all", %attempt);

        async {
            let order = self.resolve_order()?;
            info!(services = order.len(), order = ?order, "[Orchestrator] Initialization order resolved");

            self.planner.write().reset();
            self.begin_attempt();
            for name in &order {
                self.registry.seed_pending(name).await;
            }

            let result = self.run_sequential(&order).await;
            self.finish_attempt();
            result?;

            self.announce_all_initialized(order.len()).await;
            Ok::<(), StartupError>(())
        }
        .instrument(span)
        .await
    }

    /// Bring services up phase by phase.
    ///
    /// Registered services that no phase names run afterwards, in
    /// resolution order.
    pub async fn initialize_phased(&self) -> Result<(), StartupError> {
        let attempt = Uuid::new_v4();
        let span = tracing::info_span!("initialize_phased", %attempt);

        async {
            let order = self.resolve_order()?;
            let phases = {
                let graph = self.graph.read();
                let planner = self.planner.read();
                planner.validate(&graph)?;
                planner.phases().to_vec()
            };

            info!(
                phases = phases.len(),
                services = order.len(),
                "[Orchestrator] Starting phased initialization"
            );

            self.begin_attempt();
            for name in &order {
                self.registry.seed_pending(name).await;
            }

            for (index, phase) in phases.iter().enumerate() {
                self.planner.write().set_current(index);
                self.relay.phase_started(phase).await;
                info!(
                    phase = %phase.name,
                    index = index + 1,
                    total = phases.len(),
                    parallel = phase.parallel,
                    "[Orchestrator] Phase started"
                );

                let started = Instant::now();
                let run = if phase.parallel {
                    self.run_parallel(&phase.services).await
                } else {
                    self.run_sequential(&phase.services).await
                };
                let result = match run {
                    Ok(()) => self.await_phase_settled(phase).await,
                    Err(e) => Err(e),
                };

                if let Err(e) = result {
                    error!(phase = %phase.name, error = %e, "[Orchestrator] Phase failed");
                    self.relay.phase_failed(&phase.name, &e.to_string()).await;
                    self.finish_attempt();
                    return Err(e);
                }

                let duration_ms = started.elapsed().as_millis() as u64;
                self.relay.phase_completed(&phase.name, duration_ms).await;
                info!(phase = %phase.name, duration_ms, "[Orchestrator] Phase completed");
            }

            let leftovers: Vec<String> = self
                .planner
                .read()
                .unphased(&order)
                .into_iter()
                .cloned()
                .collect();
            if !leftovers.is_empty() {
                debug!(services = ?leftovers, "[Orchestrator] Initializing services outside any phase");
            }
            let result = self.run_sequential(&leftovers).await;
            self.finish_attempt();
            result?;

            self.relay.sequence_complete(phases.len()).await;
            self.announce_all_initialized(order.len()).await;
            Ok::<(), StartupError>(())
        }
        .instrument(span)
        .await
    }

    /// Wait until every member of `phase` has settled, then require all of
    /// them Running.
    ///
    /// A member skipped because a restart already had it Initializing is
    /// still in flight when the run returns; it gets the dependency timeout
    /// to finish.
    async fn await_phase_settled(&self, phase: &StartupPhase) -> Result<(), StartupError> {
        let deadline = tokio::time::Instant::now() + self.config.dependency_timeout;

        while !phase.is_complete(|name| self.registry.lifecycle_of(name)) {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            debug!(phase = %phase.name, "[Orchestrator] Waiting for phase members to settle");
            tokio::time::sleep(self.config.dependency_poll_interval).await;
        }

        let unready = self.registry.not_running(&phase.services);
        if unready.is_empty() {
            Ok(())
        } else {
            metric_inc!(SERVICE_FAILURES, &["phase_incomplete"]);
            Err(StartupError::PhaseIncomplete {
                phase: phase.name.clone(),
                unready,
            })
        }
    }

    async fn run_sequential(&self, services: &[String]) -> Result<(), StartupError> {
        for name in services {
            self.initialize_service(name).await?;
        }
        Ok(())
    }

    /// Start every member concurrently and wait for all of them.
    ///
    /// Members are never cancelled halfway; the first failure in declaration
    /// order is reported once all have settled.
    async fn run_parallel(&self, services: &[String]) -> Result<(), StartupError> {
        let results = join_all(services.iter().map(|name| self.initialize_service(name))).await;
        results.into_iter().collect()
    }

    /// Initialize one service. Already Running or Initializing is a no-op.
    pub async fn initialize_service(&self, service_name: &str) -> Result<(), StartupError> {
        let descriptor = self.graph.read().get(service_name).cloned();
        let Some(descriptor) = descriptor else {
            return Err(StartupError::UnknownService(service_name.to_string()));
        };

        if matches!(
            self.registry.lifecycle_of(service_name),
            Some(Lifecycle::Running | Lifecycle::Initializing)
        ) {
            log_service_event!(debug, service_name, "[Orchestrator] Already up, skipping");
            return Ok(());
        }

        self.registry
            .update(service_name, Lifecycle::Initializing, Health::Unknown, None)
            .await;
        log_service_event!(info, service_name, "[Orchestrator] Initializing");

        self.bring_up(&descriptor).await?;

        metric_inc!(SERVICES_INITIALIZED);
        self.relay.service_initialized(service_name).await;
        log_service_event!(info, service_name, "[Orchestrator] Service initialized");
        Ok(())
    }

    /// Dependency wait plus start routine, ending in Running/Healthy.
    ///
    /// On failure the entry is marked Failed/Critical and
    /// `service.initialization_failed` is published. On success no lifecycle
    /// event is published; the caller decides which one applies.
    pub(crate) async fn bring_up(&self, descriptor: &ServiceDescriptor) -> Result<(), StartupError> {
        let name = descriptor.name.as_str();

        let outcome = match self.wait_for_dependencies(descriptor).await {
            Ok(()) => match descriptor.routine() {
                Some(routine) => routine.start().await.map_err(|e| StartupError::StartRoutine {
                    service: name.to_string(),
                    message: e.to_string(),
                }),
                None => Ok(()),
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.registry
                    .update(name, Lifecycle::Running, Health::Healthy, None)
                    .await;
                Ok(())
            }
            Err(e) => {
                let message = e.status_message();
                self.registry.record_failure(name, &message).await;
                self.relay.service_initialization_failed(name, &message).await;
                metric_inc!(SERVICE_FAILURES, &[e.kind()]);
                log_service_event!(error, name, "[Orchestrator] Initialization failed", error = %message);
                Err(e)
            }
        }
    }

    /// Poll until every dependency is Running or the timeout elapses.
    async fn wait_for_dependencies(&self, descriptor: &ServiceDescriptor) -> Result<(), StartupError> {
        if descriptor.dependencies.is_empty() {
            return Ok(());
        }

        let _timer = time_histogram!(DEPENDENCY_WAIT_DURATION);
        let deadline = tokio::time::Instant::now() + self.config.dependency_timeout;

        loop {
            let unready = self.registry.not_running(&descriptor.dependencies);
            if unready.is_empty() {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(StartupError::DependencyTimeout {
                    service: descriptor.name.clone(),
                    unready,
                });
            }

            debug!(
                service = %descriptor.name,
                waiting_on = ?unready,
                "[Orchestrator] Waiting for dependencies"
            );
            tokio::time::sleep(self.config.dependency_poll_interval).await;
        }
    }

    async fn announce_all_initialized(&self, total: usize) {
        let running = self.registry.running_count();
        self.relay.all_initialized(total, running).await;
        info!(total, running, "[Orchestrator] All services initialized");
    }

    fn begin_attempt(&self) {
        *self.clock.lock() = Some(AttemptClock {
            started: Instant::now(),
            finished: None,
        });
    }

    fn finish_attempt(&self) {
        if let Some(clock) = self.clock.lock().as_mut() {
            clock.finished = Some(Instant::now());
        }
    }

    /// Report over the registry and the most recent attempt.
    pub fn report(&self) -> StartupReport {
        let (elapsed_ms, in_progress) = match *self.clock.lock() {
            Some(AttemptClock { started, finished }) => {
                let end = finished.unwrap_or_else(Instant::now);
                (
                    end.duration_since(started).as_millis() as u64,
                    finished.is_none(),
                )
            }
            None => (0, false),
        };

        StartupReport::from_statuses(
            self.registry.all(),
            elapsed_ms,
            in_progress,
            self.planner.read().current_phase(),
        )
    }

    /// Forget the last attempt and the planner position.
    pub fn reset(&self) {
        *self.clock.lock() = None;
        self.planner.write().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::{FnStartable, ServiceError};
    use shared_bus::InMemoryEventBus;

    fn orchestrator(descriptors: Vec<ServiceDescriptor>) -> (Orchestrator, Arc<StatusRegistry>) {
        let relay = Arc::new(EventRelay::new(Arc::new(InMemoryEventBus::new())));
        let registry = Arc::new(StatusRegistry::new(Arc::clone(&relay)));
        let mut graph = DependencyGraph::new();
        for d in descriptors {
            graph.register(d);
        }
        let orchestrator = Orchestrator::new(
            Arc::new(RwLock::new(graph)),
            Arc::clone(&registry),
            Arc::new(RwLock::new(PhasePlanner::default())),
            relay,
            OrchestratorConfig::fast(),
        );
        (orchestrator, registry)
    }

    #[tokio::test]
    async fn test_service_without_routine_runs() {
        let (orch, registry) = orchestrator(vec![ServiceDescriptor::new("A", Vec::<String>::new())]);
        orch.initialize_all().await.unwrap();
        assert!(registry.is_healthy("A"));
    }

    #[tokio::test]
    async fn test_routine_error_recorded_verbatim() {
        let failing = FnStartable::shared(|| async { Err::<(), ServiceError>("disk full".into()) });
        let (orch, registry) =
            orchestrator(vec![ServiceDescriptor::new("A", Vec::<String>::new()).with_routine(failing)]);

        let err = orch.initialize_all().await.unwrap_err();
        assert!(matches!(err, StartupError::StartRoutine { .. }));

        let status = registry.get("A").unwrap();
        assert_eq!(status.lifecycle, Lifecycle::Failed);
        assert_eq!(status.health, Health::Critical);
        assert_eq!(status.last_error.as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn test_external_dependency_times_out() {
        let (orch, registry) = orchestrator(vec![ServiceDescriptor::new("Api", ["Database"])]);

        let err = orch.initialize_all().await.unwrap_err();
        assert_eq!(
            err,
            StartupError::DependencyTimeout {
                service: "Api".to_string(),
                unready: vec!["Database".to_string()],
            }
        );
        assert_eq!(
            registry.get("Api").unwrap().last_error.as_deref(),
            Some("dependencies not ready within timeout: Database")
        );
    }

    #[tokio::test]
    async fn test_running_service_is_not_reinitialized() {
        let (orch, registry) = orchestrator(vec![ServiceDescriptor::new("A", Vec::<String>::new())]);
        orch.initialize_all().await.unwrap();
        let before = registry.get("A").unwrap().last_updated;

        orch.initialize_service("A").await.unwrap();
        assert_eq!(registry.get("A").unwrap().last_updated, before);
    }

    #[tokio::test]
    async fn test_report_after_success() {
        let (orch, _registry) = orchestrator(vec![
            ServiceDescriptor::new("A", Vec::<String>::new()),
            ServiceDescriptor::new("B", ["A"]),
        ]);
        assert_eq!(orch.report().total_services, 0);

        orch.initialize_all().await.unwrap();
        let report = orch.report();
        assert_eq!(report.total_services, 2);
        assert_eq!(report.running_services, 2);
        assert_eq!(report.overall_status, shared_types::StartupOverallStatus::Ready);
    }
}
