//! # Service Status Entities
//!
//! ## Clusters
//!
//! - **Lifecycle**: the coarse state of a service (`Pending` → `Initializing`
//!   → `Running` | `Failed`, and `Stopped` after shutdown)
//! - **Health**: a finer-grained signal orthogonal to lifecycle
//! - **Aggregate**: `OverallHealth` computed over every known service

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form metadata attached to a status entry.
pub type StatusMetadata = BTreeMap<String, serde_json::Value>;

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Coarse lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Declared but not yet picked up by the orchestrator.
    #[default]
    Pending,
    /// Waiting for dependencies or running its start routine.
    Initializing,
    /// Start routine completed successfully.
    Running,
    /// Dependency wait timed out or the start routine failed.
    Failed,
    /// Stopped during shutdown.
    Stopped,
}

impl Lifecycle {
    /// Whether the service has left `Pending`/`Initializing`.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending | Self::Initializing)
    }

    /// Lower-case label used in logs and event payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// =============================================================================
// HEALTH
// =============================================================================

/// Health signal of a single service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    /// No signal yet.
    #[default]
    Unknown,
    /// Running and responsive.
    Healthy,
    /// Running with degraded behaviour.
    Warning,
    /// Failed or unusable.
    Critical,
}

impl Health {
    /// Lower-case label used in logs and event payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Aggregate health over every entry in the Status Registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    /// Every entry is healthy.
    Healthy,
    /// More than half of the entries are healthy.
    Degraded,
    /// Half or fewer are healthy, or there are no entries at all.
    Unhealthy,
}

impl OverallHealth {
    /// Compute the aggregate from a healthy count and a total count.
    ///
    /// Zero entries is `Unhealthy`: an empty system is never reported as fine.
    #[must_use]
    pub fn from_counts(healthy: usize, total: usize) -> Self {
        if total == 0 {
            return Self::Unhealthy;
        }
        if healthy == total {
            Self::Healthy
        } else if healthy * 2 > total {
            Self::Degraded
        } else {
            Self::Unhealthy
        }
    }
}

impl fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        };
        f.pad(label)
    }
}

// =============================================================================
// STATUS SNAPSHOT
// =============================================================================

/// Snapshot of one Status Registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Unique service name (registry key).
    pub service_name: String,
    /// Current lifecycle state.
    pub lifecycle: Lifecycle,
    /// Current health signal.
    pub health: Health,
    /// Message of the most recent failure, if the entry records one.
    pub last_error: Option<String>,
    /// When the entry was last written.
    pub last_updated: DateTime<Utc>,
    /// Free-form metadata supplied with the last write.
    #[serde(default)]
    pub metadata: StatusMetadata,
}

impl ServiceStatus {
    /// Build a fresh snapshot stamped with the current time.
    pub fn new(service_name: impl Into<String>, lifecycle: Lifecycle, health: Health) -> Self {
        Self {
            service_name: service_name.into(),
            lifecycle,
            health,
            last_error: None,
            last_updated: Utc::now(),
            metadata: StatusMetadata::new(),
        }
    }

    /// Running and healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.lifecycle == Lifecycle::Running && self.health == Health::Healthy
    }
}
