//! Startup phases
//!
//! A phase is a named group of services brought up together. Phases run in
//! declaration order; members of a `parallel` phase start concurrently.

use std::collections::{HashMap, HashSet};

use shared_types::{Lifecycle, PhaseProgress};

use crate::domain::graph::DependencyGraph;
use crate::error::StartupError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupPhase {
    pub name: String,
    pub services: Vec<String>,
    pub parallel: bool,
}

impl StartupPhase {
    /// Sequential phase.
    pub fn new<I, S>(name: impl Into<String>, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            services: services.into_iter().map(Into::into).collect(),
            parallel: false,
        }
    }

    #[must_use]
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Whether every member has left Pending/Initializing.
    pub fn is_complete<F>(&self, lifecycle_of: F) -> bool
    where
        F: Fn(&str) -> Option<Lifecycle>,
    {
        self.services
            .iter()
            .all(|s| lifecycle_of(s).is_some_and(|l| l.is_settled()))
    }
}

/// Tracks the declared phases and which one is executing.
#[derive(Debug, Default, Clone)]
pub struct PhasePlanner {
    phases: Vec<StartupPhase>,
    current: Option<usize>,
}

impl PhasePlanner {
    pub fn new(phases: Vec<StartupPhase>) -> Self {
        Self {
            phases,
            current: None,
        }
    }

    pub fn phases(&self) -> &[StartupPhase] {
        &self.phases
    }

    pub fn set_phases(&mut self, phases: Vec<StartupPhase>) {
        self.phases = phases;
        self.current = None;
    }

    pub fn total_phases(&self) -> usize {
        self.phases.len()
    }

    pub fn set_current(&mut self, index: usize) {
        if index < self.phases.len() {
            self.current = Some(index);
        }
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Active phase, 1-based, or `None` outside a phased startup.
    pub fn current_phase(&self) -> Option<PhaseProgress> {
        let index = self.current?;
        let phase = self.phases.get(index)?;
        Some(PhaseProgress {
            phase: index + 1,
            total: self.phases.len(),
            name: phase.name.clone(),
        })
    }

    /// Check the plan against the registered services.
    ///
    /// Every member must be registered and appear in exactly one phase. Each
    /// registered dependency of a member must itself be phased and start no
    /// later than the member: in an earlier phase, earlier in the same
    /// sequential phase, or anywhere in the same parallel phase. Unregistered
    /// dependencies are left to the host.
    pub fn validate(&self, graph: &DependencyGraph) -> Result<(), StartupError> {
        // service -> (phase index, position within the phase)
        let mut position: HashMap<&str, (usize, usize)> = HashMap::new();

        for (phase_index, phase) in self.phases.iter().enumerate() {
            for (slot, service) in phase.services.iter().enumerate() {
                if !graph.contains(service) {
                    return Err(StartupError::InvalidPhasePlan(format!(
                        "phase '{}' names unregistered service '{}'",
                        phase.name, service
                    )));
                }
                if position
                    .insert(service.as_str(), (phase_index, slot))
                    .is_some()
                {
                    return Err(StartupError::InvalidPhasePlan(format!(
                        "service '{}' appears in more than one phase",
                        service
                    )));
                }
            }
        }

        for (phase_index, phase) in self.phases.iter().enumerate() {
            for (slot, service) in phase.services.iter().enumerate() {
                for dependency in graph.dependencies_of(service) {
                    if !graph.contains(dependency) {
                        continue;
                    }

                    let starts_first = match position.get(dependency.as_str()) {
                        None => {
                            return Err(StartupError::InvalidPhasePlan(format!(
                                "'{}' in phase '{}' depends on '{}', which no phase starts",
                                service, phase.name, dependency
                            )));
                        }
                        Some(&(dep_phase, dep_slot)) => {
                            dep_phase < phase_index
                                || (dep_phase == phase_index && (phase.parallel || dep_slot < slot))
                        }
                    };

                    if !starts_first {
                        return Err(StartupError::InvalidPhasePlan(format!(
                            "'{}' in phase '{}' depends on '{}', which starts after it",
                            service, phase.name, dependency
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Services of `order` that no phase mentions, order preserved.
    pub fn unphased<'a>(&self, order: &'a [String]) -> Vec<&'a String> {
        let phased: HashSet<&str> = self
            .phases
            .iter()
            .flat_map(|p| p.services.iter().map(String::as_str))
            .collect();

        order
            .iter()
            .filter(|name| !phased.contains(name.as_str()))
            .collect()
    }
}
