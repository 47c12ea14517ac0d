//! # Service Events
//!
//! Defines every event that flows through the shared bus. Outbound events
//! report lifecycle and health transitions to dashboards and log sinks; the
//! single inbound event (`RestartRequested`) carries a restart request from
//! an external collaborator to the Recovery Manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::ServiceStatus;

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServiceEvent {
    // =========================================================================
    // SERVICE LIFECYCLE
    // =========================================================================
    /// A service's start routine completed and it is now Running.
    ServiceInitialized {
        service_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A service failed to initialize (dependency timeout or routine error).
    ServiceInitializationFailed {
        service_name: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A Status Registry entry was written.
    ServiceStatusUpdated {
        service_name: String,
        status: ServiceStatus,
    },

    /// A restart request completed and the service is Running again.
    ServiceRestarted {
        service_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A service was stopped during shutdown.
    ServiceStopped {
        service_name: String,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // RECOVERY (inbound)
    // =========================================================================
    /// External request to restart one service.
    RestartRequested { service_name: String },

    // =========================================================================
    // STARTUP SEQUENCE
    // =========================================================================
    /// `initialize_all` finished without error.
    AllServicesInitialized {
        total_services: usize,
        running_services: usize,
        timestamp: DateTime<Utc>,
    },

    /// A startup phase began executing.
    PhaseStarted {
        phase_name: String,
        services: Vec<String>,
        parallel: bool,
        timestamp: DateTime<Utc>,
    },

    /// Every member of a phase reached Running.
    PhaseCompleted {
        phase_name: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A member of a phase failed.
    PhaseFailed {
        phase_name: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// All phases completed.
    SequenceComplete {
        total_phases: usize,
        timestamp: DateTime<Utc>,
    },
}

impl ServiceEvent {
    /// Build a restart request for `service_name`.
    pub fn restart_request(service_name: impl Into<String>) -> Self {
        Self::RestartRequested {
            service_name: service_name.into(),
        }
    }

    /// Dotted event name as seen by external listeners.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ServiceInitialized { .. } => "service.initialized",
            Self::ServiceInitializationFailed { .. } => "service.initialization_failed",
            Self::ServiceStatusUpdated { .. } => "service.status.updated",
            Self::ServiceRestarted { .. } => "service.restarted",
            Self::ServiceStopped { .. } => "service.stopped",
            Self::RestartRequested { .. } => "service.restart.request",
            Self::AllServicesInitialized { .. } => "services.all_initialized",
            Self::PhaseStarted { .. } => "startup.phase_started",
            Self::PhaseCompleted { .. } => "startup.phase_completed",
            Self::PhaseFailed { .. } => "startup.phase_failed",
            Self::SequenceComplete { .. } => "startup.sequence_complete",
        }
    }

    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ServiceInitialized { .. }
            | Self::ServiceInitializationFailed { .. }
            | Self::ServiceRestarted { .. }
            | Self::ServiceStopped { .. } => EventTopic::Lifecycle,
            Self::ServiceStatusUpdated { .. } => EventTopic::Status,
            Self::RestartRequested { .. } => EventTopic::Recovery,
            Self::AllServicesInitialized { .. }
            | Self::PhaseStarted { .. }
            | Self::PhaseCompleted { .. }
            | Self::PhaseFailed { .. }
            | Self::SequenceComplete { .. } => EventTopic::Startup,
        }
    }

    /// The service this event is about, if it concerns a single service.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        match self {
            Self::ServiceInitialized { service_name, .. }
            | Self::ServiceInitializationFailed { service_name, .. }
            | Self::ServiceStatusUpdated { service_name, .. }
            | Self::ServiceRestarted { service_name, .. }
            | Self::ServiceStopped { service_name, .. }
            | Self::RestartRequested { service_name } => Some(service_name),
            _ => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Initialized / failed / restarted / stopped.
    Lifecycle,
    /// Status Registry writes.
    Status,
    /// Inbound restart requests.
    Recovery,
    /// Phase and whole-sequence progress.
    Startup,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Services to include. Empty means all services; events that are not
    /// about a single service never match a non-empty list.
    pub services: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            services: Vec::new(),
        }
    }

    /// Create a filter for events about specific services.
    #[must_use]
    pub fn for_services<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: Vec::new(),
            services: services.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ServiceEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let service_match = self.services.is_empty()
            || event
                .service_name()
                .is_some_and(|name| self.services.iter().any(|s| s == name));

        topic_match && service_match
    }
}
