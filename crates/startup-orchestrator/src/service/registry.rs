//! Status Registry
//!
//! The one place lifecycle and health of every service is recorded. Each
//! write replaces the whole entry and is announced as `service.status.updated`
//! after the lock has been released.

use chrono::Utc;
use parking_lot::RwLock;
use shared_types::{Health, Lifecycle, OverallHealth, ServiceStatus, StatusMetadata};
use startup_telemetry::metrics::SERVICES_RUNNING;
use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::EventRelay;

pub struct StatusRegistry {
    entries: RwLock<HashMap<String, ServiceStatus>>,
    relay: Arc<EventRelay>,
}

impl StatusRegistry {
    pub fn new(relay: Arc<EventRelay>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            relay,
        }
    }

    /// Create or overwrite the entry for `service_name`.
    ///
    /// `last_error` is cleared; use [`Self::record_failure`] to set it.
    pub async fn update(
        &self,
        service_name: &str,
        lifecycle: Lifecycle,
        health: Health,
        metadata: Option<StatusMetadata>,
    ) -> ServiceStatus {
        self.write(service_name, lifecycle, health, None, metadata)
            .await
    }

    /// Mark `service_name` Failed/Critical with `error` as its last error.
    pub async fn record_failure(&self, service_name: &str, error: &str) -> ServiceStatus {
        self.write(
            service_name,
            Lifecycle::Failed,
            Health::Critical,
            Some(error.to_string()),
            None,
        )
        .await
    }

    /// Insert a Pending/Unknown entry unless one already exists.
    ///
    /// Returns whether an entry was created.
    pub async fn seed_pending(&self, service_name: &str) -> bool {
        let seeded = {
            let mut entries = self.entries.write();
            if entries.contains_key(service_name) {
                return false;
            }

            let status = ServiceStatus {
                service_name: service_name.to_string(),
                lifecycle: Lifecycle::Pending,
                health: Health::Unknown,
                last_error: None,
                last_updated: Utc::now(),
                metadata: StatusMetadata::default(),
            };
            entries.insert(service_name.to_string(), status.clone());
            refresh_running_gauge(&entries);
            status
        };

        self.relay.status_updated(seeded).await;
        true
    }

    async fn write(
        &self,
        service_name: &str,
        lifecycle: Lifecycle,
        health: Health,
        last_error: Option<String>,
        metadata: Option<StatusMetadata>,
    ) -> ServiceStatus {
        let snapshot = {
            let mut entries = self.entries.write();

            // Timestamps never go backwards for one entry
            let now = Utc::now();
            let last_updated = match entries.get(service_name) {
                Some(previous) if previous.last_updated > now => previous.last_updated,
                _ => now,
            };

            let status = ServiceStatus {
                service_name: service_name.to_string(),
                lifecycle,
                health,
                last_error,
                last_updated,
                metadata: metadata.unwrap_or_default(),
            };
            entries.insert(service_name.to_string(), status.clone());
            refresh_running_gauge(&entries);

            status
        };

        self.relay.status_updated(snapshot.clone()).await;
        snapshot
    }

    pub fn get(&self, service_name: &str) -> Option<ServiceStatus> {
        self.entries.read().get(service_name).cloned()
    }

    pub fn lifecycle_of(&self, service_name: &str) -> Option<Lifecycle> {
        self.entries.read().get(service_name).map(|s| s.lifecycle)
    }

    /// Every entry, sorted by service name.
    pub fn all(&self) -> Vec<ServiceStatus> {
        let mut statuses: Vec<ServiceStatus> = self.entries.read().values().cloned().collect();
        statuses.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        statuses
    }

    /// Names in `candidates` whose entry is absent or not Running.
    pub fn not_running(&self, candidates: &[String]) -> Vec<String> {
        let entries = self.entries.read();
        candidates
            .iter()
            .filter(|name| {
                entries
                    .get(name.as_str())
                    .map_or(true, |s| s.lifecycle != Lifecycle::Running)
            })
            .cloned()
            .collect()
    }

    /// Running and Healthy. Unknown names are not healthy.
    pub fn is_healthy(&self, service_name: &str) -> bool {
        self.entries
            .read()
            .get(service_name)
            .is_some_and(ServiceStatus::is_healthy)
    }

    pub fn running_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|s| s.lifecycle == Lifecycle::Running)
            .count()
    }

    pub fn overall_health(&self) -> OverallHealth {
        let entries = self.entries.read();
        let healthy = entries.values().filter(|s| s.is_healthy()).count();
        OverallHealth::from_counts(healthy, entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        SERVICES_RUNNING.set(0.0);
    }
}

fn refresh_running_gauge(entries: &HashMap<String, ServiceStatus>) {
    let running = entries
        .values()
        .filter(|s| s.lifecycle == Lifecycle::Running)
        .count();
    SERVICES_RUNNING.set(running as f64);
}
