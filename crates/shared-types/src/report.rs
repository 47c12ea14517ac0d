//! # Startup Report
//!
//! Summary of a startup attempt, consumed by dashboards and the runtime's
//! final log line.

use serde::{Deserialize, Serialize};

use crate::entities::{Health, Lifecycle, ServiceStatus};

/// Overall outcome of a startup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupOverallStatus {
    /// The attempt is still running.
    Initializing,
    /// Everything is running and nothing is critical.
    Ready,
    /// At least 80% running and at most one critical service.
    Partial,
    /// Anything worse than `Partial`.
    Failed,
}

/// Position of the Phase Planner during a phased startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    /// 1-based index of the active phase.
    pub phase: usize,
    /// Number of declared phases.
    pub total: usize,
    /// Name of the active phase.
    pub name: String,
}

impl PhaseProgress {
    /// Share of phases reached so far, in percent.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.phase as f64 / self.total as f64) * 100.0
    }
}

/// Report over the services known to the Status Registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupReport {
    pub overall_status: StartupOverallStatus,
    pub total_services: usize,
    pub running_services: usize,
    pub failed_services: usize,
    pub service_statuses: Vec<ServiceStatus>,
    /// Milliseconds from the start of the attempt to its end (or to now).
    pub startup_time_ms: u64,
    pub current_phase: Option<PhaseProgress>,
}

impl StartupReport {
    /// Build a report from registry snapshots.
    pub fn from_statuses(
        service_statuses: Vec<ServiceStatus>,
        startup_time_ms: u64,
        in_progress: bool,
        current_phase: Option<PhaseProgress>,
    ) -> Self {
        let total_services = service_statuses.len();
        let running_services = service_statuses
            .iter()
            .filter(|s| s.lifecycle == Lifecycle::Running)
            .count();
        let failed_services = service_statuses
            .iter()
            .filter(|s| s.lifecycle == Lifecycle::Failed)
            .count();
        let critical = service_statuses
            .iter()
            .filter(|s| s.health == Health::Critical)
            .count();

        let overall_status = if in_progress {
            StartupOverallStatus::Initializing
        } else {
            determine_overall_status(running_services, failed_services, critical, total_services)
        };

        Self {
            overall_status,
            total_services,
            running_services,
            failed_services,
            service_statuses,
            startup_time_ms,
            current_phase,
        }
    }

    /// `Ready` or `Partial`.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        matches!(
            self.overall_status,
            StartupOverallStatus::Ready | StartupOverallStatus::Partial
        )
    }
}

fn determine_overall_status(
    running: usize,
    failed: usize,
    critical: usize,
    total: usize,
) -> StartupOverallStatus {
    if failed == 0 && running == total && critical == 0 {
        StartupOverallStatus::Ready
    } else if running > 0 && running * 5 >= total * 4 && critical <= 1 {
        StartupOverallStatus::Partial
    } else {
        StartupOverallStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(name: &str, lifecycle: Lifecycle, health: Health) -> ServiceStatus {
        ServiceStatus::new(name, lifecycle, health)
    }

    #[test]
    fn test_ready_when_all_running() {
        let report = StartupReport::from_statuses(
            vec![
                status("a", Lifecycle::Running, Health::Healthy),
                status("b", Lifecycle::Running, Health::Healthy),
            ],
            12,
            false,
            None,
        );
        assert_eq!(report.overall_status, StartupOverallStatus::Ready);
        assert_eq!(report.running_services, 2);
        assert!(report.is_operational());
    }

    #[test]
    fn test_partial_with_one_failure_out_of_five() {
        let mut statuses: Vec<_> = (0..4)
            .map(|i| status(&format!("s{i}"), Lifecycle::Running, Health::Healthy))
            .collect();
        statuses.push(status("bad", Lifecycle::Failed, Health::Critical));

        let report = StartupReport::from_statuses(statuses, 0, false, None);
        assert_eq!(report.overall_status, StartupOverallStatus::Partial);
        assert_eq!(report.failed_services, 1);
    }

    #[test]
    fn test_failed_when_most_services_down() {
        let report = StartupReport::from_statuses(
            vec![
                status("a", Lifecycle::Running, Health::Healthy),
                status("b", Lifecycle::Failed, Health::Critical),
            ],
            0,
            false,
            None,
        );
        assert_eq!(report.overall_status, StartupOverallStatus::Failed);
    }

    #[test]
    fn test_in_progress_reports_initializing() {
        let report = StartupReport::from_statuses(Vec::new(), 0, true, None);
        assert_eq!(report.overall_status, StartupOverallStatus::Initializing);
    }

    #[test]
    fn test_phase_percent() {
        let progress = PhaseProgress {
            phase: 2,
            total: 4,
            name: "Backend Services".to_string(),
        };
        assert!((progress.percent() - 50.0).abs() < f64::EPSILON);
    }
}
