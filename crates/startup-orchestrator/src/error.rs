//! Error types for the startup orchestrator

use thiserror::Error;

/// Errors raised by dependency resolution, initialization and recovery.
///
/// The Status Registry entry of the failing service is always written before
/// one of these reaches the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// The dependency graph contains a cycle.
    #[error("circular dependency detected involving {service}")]
    Cycle { service: String },

    /// Dependencies did not reach Running within the configured timeout.
    #[error("dependencies not ready within timeout: {}", unready.join(", "))]
    DependencyTimeout {
        service: String,
        unready: Vec<String>,
    },

    /// The service's own start routine returned an error.
    #[error("start routine of {service} failed: {message}")]
    StartRoutine { service: String, message: String },

    #[error("unknown service: {0}")]
    UnknownService(String),

    /// Too many consecutive failed restarts; the service is left as is.
    #[error("restart attempts exhausted for {service} after {attempts} consecutive failures")]
    RecoveryExhausted { service: String, attempts: u32 },

    #[error("invalid phase plan: {0}")]
    InvalidPhasePlan(String),

    /// A phase finished its run with members not Running.
    #[error("phase '{phase}' did not complete: {}", unready.join(", "))]
    PhaseIncomplete { phase: String, unready: Vec<String> },
}

impl StartupError {
    /// Metric label for this failure kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cycle { .. } => "cycle",
            Self::DependencyTimeout { .. } => "dependency_timeout",
            Self::StartRoutine { .. } => "start_routine",
            Self::UnknownService(_) => "unknown_service",
            Self::RecoveryExhausted { .. } => "recovery_exhausted",
            Self::InvalidPhasePlan(_) => "invalid_phase_plan",
            Self::PhaseIncomplete { .. } => "phase_incomplete",
        }
    }

    /// The service this error is about, if any.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::Cycle { service }
            | Self::DependencyTimeout { service, .. }
            | Self::StartRoutine { service, .. }
            | Self::RecoveryExhausted { service, .. } => Some(service),
            Self::UnknownService(name) => Some(name),
            Self::InvalidPhasePlan(_) | Self::PhaseIncomplete { .. } => None,
        }
    }

    /// Message recorded as `last_error` in the Status Registry.
    ///
    /// Start routine messages are stored verbatim.
    #[must_use]
    pub fn status_message(&self) -> String {
        match self {
            Self::StartRoutine { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("dependency poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("dependency poll interval ({poll_ms} ms) exceeds the dependency timeout ({timeout_ms} ms)")]
    PollExceedsTimeout { poll_ms: u128, timeout_ms: u128 },

    #[error("event channel capacity must be greater than zero")]
    ZeroChannelCapacity,
}
