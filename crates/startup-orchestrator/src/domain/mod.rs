//! Domain layer: descriptors, the dependency graph, phases and configuration.
//!
//! Pure data and algorithms. Nothing here awaits or publishes.

pub mod config;
pub mod graph;
pub mod phase;

pub use config::OrchestratorConfig;
pub use graph::{DependencyGraph, ServiceDescriptor};
pub use phase::{PhasePlanner, StartupPhase};
