//! Inbound ports: the API the orchestrator exposes to its host.

use async_trait::async_trait;
use shared_types::{OverallHealth, ServiceStatus};
use std::sync::Arc;

use crate::error::StartupError;
use crate::ports::outbound::Startable;

/// Host-facing orchestration API.
///
/// Implemented by [`crate::ServiceEngine`].
#[async_trait]
pub trait StartupApi: Send + Sync {
    /// Record a service and its direct dependencies.
    ///
    /// Re-registering a name replaces its descriptor. Dependencies need not
    /// be registered yet.
    fn register_service(
        &self,
        name: &str,
        dependencies: Vec<String>,
        routine: Option<Arc<dyn Startable>>,
    );

    /// Bring every registered service up in dependency order.
    ///
    /// Stops at the first failure; services after it are left untouched.
    async fn initialize_all(&self) -> Result<(), StartupError>;

    /// Re-run one service. Dependents are not restarted.
    async fn restart(&self, service_name: &str) -> Result<(), StartupError>;

    /// Snapshot of every Status Registry entry.
    fn get_service_status(&self) -> Vec<ServiceStatus>;

    fn get_status_by_name(&self, service_name: &str) -> Option<ServiceStatus>;

    fn overall_health(&self) -> OverallHealth;

    /// Drop all descriptors and status entries.
    fn clear(&self);
}

/// Receiver of restart requests arriving over the event bus.
#[async_trait]
pub trait RestartHandler: Send + Sync {
    async fn handle_restart(&self, service_name: &str) -> Result<(), StartupError>;
}
