//! # Event Relay
//!
//! Connects the orchestration core to the event bus. Every outbound event
//! passes through here; the single inbound event, a restart request, is
//! forwarded to a [`RestartHandler`] by a listener task.
//!
//! Publishing never fails from the caller's point of view: an event with no
//! subscribers is simply dropped.

use chrono::Utc;
use shared_bus::{EventFilter, EventPublisher, EventTopic, InMemoryEventBus, ServiceEvent};
use shared_types::ServiceStatus;
use startup_telemetry::metric_inc;
use startup_telemetry::metrics::EVENTS_PUBLISHED;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::StartupPhase;
use crate::ports::inbound::RestartHandler;

pub struct EventRelay {
    bus: Arc<InMemoryEventBus>,
}

impl EventRelay {
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    /// Publish one event, returning how many subscribers received it.
    pub async fn publish(&self, event: ServiceEvent) -> usize {
        let name = event.name();
        metric_inc!(EVENTS_PUBLISHED, &[name]);
        let receivers = self.bus.publish(event).await;
        debug!(event = name, receivers, "Event published");
        receivers
    }

    pub async fn service_initialized(&self, service_name: &str) {
        self.publish(ServiceEvent::ServiceInitialized {
            service_name: service_name.to_string(),
            timestamp: Utc::now(),
        })
        .await;
    }

    pub async fn service_initialization_failed(&self, service_name: &str, error: &str) {
        self.publish(ServiceEvent::ServiceInitializationFailed {
            service_name: service_name.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        })
        .await;
    }

    pub async fn status_updated(&self, status: ServiceStatus) {
        self.publish(ServiceEvent::ServiceStatusUpdated {
            service_name: status.service_name.clone(),
            status,
        })
        .await;
    }

    pub async fn service_restarted(&self, service_name: &str) {
        self.publish(ServiceEvent::ServiceRestarted {
            service_name: service_name.to_string(),
            timestamp: Utc::now(),
        })
        .await;
    }

    pub async fn service_stopped(&self, service_name: &str) {
        self.publish(ServiceEvent::ServiceStopped {
            service_name: service_name.to_string(),
            timestamp: Utc::now(),
        })
        .await;
    }

    pub async fn all_initialized(&self, total_services: usize, running_services: usize) {
        self.publish(ServiceEvent::AllServicesInitialized {
            total_services,
            running_services,
            timestamp: Utc::now(),
        })
        .await;
    }

    pub async fn phase_started(&self, phase: &StartupPhase) {
        self.publish(ServiceEvent::PhaseStarted {
            phase_name: phase.name.clone(),
            services: phase.services.clone(),
            parallel: phase.parallel,
            timestamp: Utc::now(),
        })
        .await;
    }

    pub async fn phase_completed(&self, phase_name: &str, duration_ms: u64) {
        self.publish(ServiceEvent::PhaseCompleted {
            phase_name: phase_name.to_string(),
            duration_ms,
            timestamp: Utc::now(),
        })
        .await;
    }

    pub async fn phase_failed(&self, phase_name: &str, error: &str) {
        self.publish(ServiceEvent::PhaseFailed {
            phase_name: phase_name.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        })
        .await;
    }

    pub async fn sequence_complete(&self, total_phases: usize) {
        self.publish(ServiceEvent::SequenceComplete {
            total_phases,
            timestamp: Utc::now(),
        })
        .await;
    }

    /// Forward `service.restart.request` events to `handler` until
    /// `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The subscription is taken before the task is spawned, so requests
    /// published right after this call returns are not missed. Each request
    /// runs on its own task; a slow restart does not hold up the others.
    pub fn spawn_restart_listener(
        &self,
        handler: Arc<dyn RestartHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let mut subscription = self.bus.subscribe(EventFilter::topics(vec![EventTopic::Recovery]));

        tokio::spawn(async move {
            info!("[Relay] Restart listener started");

            loop {
                tokio::select! {
                    event = subscription.recv() => match event {
                        Some(ServiceEvent::RestartRequested { service_name }) => {
                            info!(service = %service_name, "[Relay] Restart requested");
                            let handler = Arc::clone(&handler);
                            tokio::spawn(async move {
                                if let Err(e) = handler.handle_restart(&service_name).await {
                                    warn!(service = %service_name, error = %e, "[Relay] Restart failed");
                                }
                            });
                        }
                        Some(_) => {}
                        None => {
                            warn!("[Relay] Event bus closed, stopping restart listener");
                            break;
                        }
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("[Relay] Restart listener stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StartupError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHandler {
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RestartHandler for RecordingHandler {
        async fn handle_restart(&self, service_name: &str) -> Result<(), StartupError> {
            self.requests.lock().push(service_name.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = Arc::new(InMemoryEventBus::new());
        let relay = EventRelay::new(Arc::clone(&bus));
        let mut sub = bus.subscribe(EventFilter::all());

        relay.service_initialized("EventManager").await;

        let event = sub.recv().await.unwrap();
        assert_eq!(event.name(), "service.initialized");
        assert_eq!(event.service_name(), Some("EventManager"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let relay = EventRelay::new(Arc::new(InMemoryEventBus::new()));
        assert_eq!(relay.publish(ServiceEvent::restart_request("A")).await, 0);
    }

    #[tokio::test]
    async fn test_restart_listener_forwards_requests() {
        let bus = Arc::new(InMemoryEventBus::new());
        let relay = EventRelay::new(Arc::clone(&bus));
        let handler = Arc::new(RecordingHandler::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = relay.spawn_restart_listener(handler.clone(), shutdown_rx);

        // Non-recovery events are filtered out
        relay.service_initialized("Ignored").await;
        relay.publish(ServiceEvent::restart_request("Backend")).await;

        for _ in 0..100 {
            if !handler.requests.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*handler.requests.lock(), vec!["Backend".to_string()]);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
