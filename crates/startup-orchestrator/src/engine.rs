//! Service Engine: the single handle a host holds.
//!
//! Wires the dependency graph, Status Registry, Phase Planner, Orchestrator,
//! Recovery Manager and Event Relay around one event bus.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_bus::{EventFilter, EventStream, InMemoryEventBus, ServiceEvent, Subscription};
use shared_types::{Lifecycle, OverallHealth, PhaseProgress, ServiceStatus, StartupReport};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapters::EventRelay;
use crate::domain::{DependencyGraph, OrchestratorConfig, PhasePlanner, ServiceDescriptor, StartupPhase};
use crate::error::StartupError;
use crate::ports::inbound::{RestartHandler, StartupApi};
use crate::ports::outbound::Startable;
use crate::service::{Orchestrator, RecoveryManager, StatusRegistry};

struct RestartListener {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct ServiceEngine {
    graph: Arc<RwLock<DependencyGraph>>,
    planner: Arc<RwLock<PhasePlanner>>,
    registry: Arc<StatusRegistry>,
    relay: Arc<EventRelay>,
    orchestrator: Arc<Orchestrator>,
    recovery: Arc<RecoveryManager>,
    listener: Mutex<Option<RestartListener>>,
}

impl ServiceEngine {
    /// Create an engine with its own event bus.
    pub fn new(config: OrchestratorConfig) -> Self {
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.event_channel_capacity));
        Self::with_bus(config, bus)
    }

    /// Create an engine publishing to an existing bus.
    pub fn with_bus(config: OrchestratorConfig, bus: Arc<InMemoryEventBus>) -> Self {
        let relay = Arc::new(EventRelay::new(bus));
        let graph = Arc::new(RwLock::new(DependencyGraph::new()));
        let planner = Arc::new(RwLock::new(PhasePlanner::default()));
        let registry = Arc::new(StatusRegistry::new(Arc::clone(&relay)));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&graph),
            Arc::clone(&registry),
            Arc::clone(&planner),
            Arc::clone(&relay),
            config,
        ));
        let recovery = Arc::new(RecoveryManager::new(
            Arc::clone(&orchestrator),
            Arc::clone(&graph),
            Arc::clone(&registry),
            Arc::clone(&relay),
        ));

        Self {
            graph,
            planner,
            registry,
            relay,
            orchestrator,
            recovery,
            listener: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        self.orchestrator.config()
    }

    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        self.relay.bus()
    }

    pub fn registry(&self) -> Arc<StatusRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn recovery(&self) -> Arc<RecoveryManager> {
        Arc::clone(&self.recovery)
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    pub fn register(&self, descriptor: ServiceDescriptor) {
        info!(
            service = %descriptor.name,
            dependencies = ?descriptor.dependencies,
            "[Engine] Registering service"
        );
        self.graph.write().register(descriptor);
    }

    /// Replace the phase plan.
    pub fn set_phases(&self, phases: Vec<StartupPhase>) {
        self.planner.write().set_phases(phases);
    }

    pub fn phases(&self) -> Vec<StartupPhase> {
        self.planner.read().phases().to_vec()
    }

    pub fn resolve_order(&self) -> Result<Vec<String>, StartupError> {
        self.graph.read().resolve_order()
    }

    /// Registered services that depend on `service_name`, in start order.
    pub fn dependents_of(&self, service_name: &str) -> Result<Vec<String>, StartupError> {
        self.graph.read().dependents_of(service_name)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    pub async fn initialize_phased(&self) -> Result<(), StartupError> {
        self.orchestrator.initialize_phased().await
    }

    pub async fn shutdown_all(&self) {
        self.recovery.shutdown_all().await;
    }

    pub async fn restart_all(&self) -> Result<(), StartupError> {
        self.recovery.restart_all().await
    }

    /// Publish a restart request on the bus, as an external operator would.
    ///
    /// Only takes effect while the restart listener is running.
    pub async fn request_restart(&self, service_name: &str) -> usize {
        self.relay
            .publish(ServiceEvent::restart_request(service_name))
            .await
    }

    /// Start forwarding bus restart requests to the Recovery Manager.
    ///
    /// Returns `false` if the listener is already running.
    pub fn start_restart_listener(&self) -> bool {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handler: Arc<dyn RestartHandler> = self.recovery.clone();
        let task = self.relay.spawn_restart_listener(handler, shutdown_rx);
        *listener = Some(RestartListener { shutdown, task });
        true
    }

    /// Signal the restart listener to stop and wait for it.
    pub async fn stop_restart_listener(&self) {
        let listener = self.listener.lock().take();
        if let Some(RestartListener { shutdown, task }) = listener {
            let _ = shutdown.send(true);
            let _ = task.await;
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn is_healthy(&self, service_name: &str) -> bool {
        self.registry.is_healthy(service_name)
    }

    pub fn current_phase(&self) -> Option<PhaseProgress> {
        self.planner.read().current_phase()
    }

    pub fn report(&self) -> StartupReport {
        self.orchestrator.report()
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.relay.bus().subscribe(filter)
    }

    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        self.relay.bus().event_stream(filter)
    }

    /// Log a status table of every registered service.
    pub fn log_status(&self) {
        info!("===========================================");
        info!("  SERVICE STATUS");
        info!("===========================================");

        let names = self.graph.read().names().to_vec();
        for name in &names {
            let status = self.registry.get(name);
            let (lifecycle, health) = status
                .as_ref()
                .map(|s| (s.lifecycle, s.health))
                .unwrap_or_default();
            let icon = match lifecycle {
                Lifecycle::Running => "✅",
                Lifecycle::Failed => "❌",
                Lifecycle::Stopped => "⏹️ ",
                Lifecycle::Pending | Lifecycle::Initializing => "⏳",
            };
            let error = status
                .and_then(|s| s.last_error)
                .map(|e| format!(" ({e})"))
                .unwrap_or_default();
            info!("  {} {:32} {:12} {}{}", icon, name, lifecycle, health, error);
        }

        info!("  Overall: {}", self.overall_health());
        info!("===========================================");
    }
}

#[async_trait]
impl StartupApi for ServiceEngine {
    fn register_service(
        &self,
        name: &str,
        dependencies: Vec<String>,
        routine: Option<Arc<dyn Startable>>,
    ) {
        let descriptor = ServiceDescriptor::new(name, dependencies);
        let descriptor = match routine {
            Some(routine) => descriptor.with_routine(routine),
            None => descriptor,
        };
        self.register(descriptor);
    }

    async fn initialize_all(&self) -> Result<(), StartupError> {
        self.orchestrator.initialize_all().await
    }

    async fn restart(&self, service_name: &str) -> Result<(), StartupError> {
        self.recovery.restart(service_name).await
    }

    fn get_service_status(&self) -> Vec<ServiceStatus> {
        self.registry.all()
    }

    fn get_status_by_name(&self, service_name: &str) -> Option<ServiceStatus> {
        self.registry.get(service_name)
    }

    fn overall_health(&self) -> OverallHealth {
        self.registry.overall_health()
    }

    fn clear(&self) {
        self.graph.write().clear();
        self.planner.write().set_phases(Vec::new());
        self.registry.clear();
        self.recovery.reset_attempts();
        self.orchestrator.reset();
        info!("[Engine] Cleared all services");
    }
}

impl Drop for ServiceEngine {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            let _ = listener.shutdown.send(true);
        }
    }
}
