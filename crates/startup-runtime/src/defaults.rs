//! Default service declarations and phase plan.
//!
//! ```text
//! Level 0: EventManager
//! Level 1: ServiceRegistry
//! Level 2: BackendIntegrationService, ServiceHealthMonitor, ValidationService
//! Level 3: RealtimeDataService, ConfiguratorIntegrationService, RF4SIntegrationService
//! ```

use async_trait::async_trait;
use startup_orchestrator::{ServiceDescriptor, ServiceEngine, ServiceError, Startable, StartupPhase};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::RuntimeConfig;

pub const EVENT_MANAGER: &str = "EventManager";
pub const SERVICE_REGISTRY: &str = "ServiceRegistry";
pub const BACKEND_INTEGRATION: &str = "BackendIntegrationService";
pub const REALTIME_DATA: &str = "RealtimeDataService";
pub const CONFIGURATOR_INTEGRATION: &str = "ConfiguratorIntegrationService";
pub const RF4S_INTEGRATION: &str = "RF4SIntegrationService";
pub const HEALTH_MONITOR: &str = "ServiceHealthMonitor";
pub const VALIDATION: &str = "ValidationService";

/// Every default service with its direct dependencies, in registration order.
pub const DEFAULT_SERVICES: &[(&str, &[&str])] = &[
    (EVENT_MANAGER, &[]),
    (SERVICE_REGISTRY, &[EVENT_MANAGER]),
    (BACKEND_INTEGRATION, &[EVENT_MANAGER, SERVICE_REGISTRY]),
    (REALTIME_DATA, &[BACKEND_INTEGRATION]),
    (CONFIGURATOR_INTEGRATION, &[BACKEND_INTEGRATION]),
    (RF4S_INTEGRATION, &[BACKEND_INTEGRATION]),
    (HEALTH_MONITOR, &[SERVICE_REGISTRY]),
    (VALIDATION, &[SERVICE_REGISTRY]),
];

/// The default seven-phase plan.
pub fn default_phases() -> Vec<StartupPhase> {
    vec![
        StartupPhase::new("Core Initialization", [EVENT_MANAGER, SERVICE_REGISTRY]),
        StartupPhase::new("Backend Services", [BACKEND_INTEGRATION]),
        StartupPhase::new(
            "Integration Services",
            [CONFIGURATOR_INTEGRATION, RF4S_INTEGRATION],
        )
        .parallel(),
        StartupPhase::new("Realtime Services", [REALTIME_DATA]),
        StartupPhase::new("Monitoring Services", [HEALTH_MONITOR]),
        StartupPhase::new("Validation Services", [VALIDATION]),
        StartupPhase::new("System Ready", Vec::<String>::new()),
    ]
}

/// Stand-in start routine: sleeps, then succeeds unless told to fail.
pub struct SimulatedService {
    name: String,
    start_delay: Duration,
    fail: bool,
}

impl SimulatedService {
    pub fn new(name: impl Into<String>, start_delay: Duration, fail: bool) -> Self {
        Self {
            name: name.into(),
            start_delay,
            fail,
        }
    }
}

#[async_trait]
impl Startable for SimulatedService {
    async fn start(&self) -> Result<(), ServiceError> {
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }

        if self.fail {
            return Err(format!("{} failed to start (simulated)", self.name).into());
        }

        debug!(service = %self.name, "Simulated service started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        debug!(service = %self.name, "Simulated service stopped");
        Ok(())
    }
}

/// Register the default services and phases with `engine`.
pub fn register_default_services(engine: &ServiceEngine, config: &RuntimeConfig) {
    for (name, dependencies) in DEFAULT_SERVICES {
        let fail = config.demo_failure.as_deref() == Some(*name);
        let routine = Arc::new(SimulatedService::new(*name, config.demo_start_delay, fail));
        engine.register(
            ServiceDescriptor::new(*name, dependencies.iter().copied()).with_routine(routine),
        );
    }
    engine.set_phases(default_phases());
}
