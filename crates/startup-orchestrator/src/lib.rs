//! # Startup Orchestrator
//!
//! Brings a set of interdependent services up in a safe order, tracks their
//! lifecycle and health, restarts individual services on request and
//! reports progress over an event bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── ServiceEngine ────────────────────────────┐
//! │                                                                        │
//! │  DependencyGraph ──► Orchestrator ──► StatusRegistry ──► EventRelay ───┼──► bus
//! │  PhasePlanner   ──┘       ▲                                   │        │
//! │                           │                                   │        │
//! │                    RecoveryManager ◄── restart listener ◄─────┘        │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Domain**: descriptors, dependency resolution, phases, configuration
//! - **Ports**: [`StartupApi`] (inbound), [`Startable`] (outbound)
//! - **Service**: Status Registry, Orchestrator, Recovery Manager
//! - **Adapters**: the Event Relay between the engine and the bus
//!
//! ## Guarantees
//!
//! - A service's start routine runs only after every dependency is Running
//! - A failure stops the sequence; the failed service records its error and
//!   later services stay Pending
//! - Restarting one service never restarts its dependents
//! - Every Status Registry write is published as `service.status.updated`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use startup_orchestrator::{OrchestratorConfig, ServiceEngine, StartupApi};
//!
//! let engine = ServiceEngine::new(OrchestratorConfig::from_env());
//! engine.register_service("EventManager", vec![], None);
//! engine.register_service("ServiceRegistry", vec!["EventManager".into()], None);
//! engine.initialize_all().await?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::EventRelay;
pub use domain::{
    DependencyGraph, OrchestratorConfig, PhasePlanner, ServiceDescriptor, StartupPhase,
};
pub use engine::ServiceEngine;
pub use error::{ConfigError, StartupError};
pub use ports::{FnStartable, RestartHandler, ServiceError, Startable, StartupApi};
pub use service::{Orchestrator, RecoveryManager, StatusRegistry};

// Types hosts need alongside the engine
pub use shared_bus::{EventFilter, EventTopic, ServiceEvent, Subscription};
pub use shared_types::{
    Health, Lifecycle, OverallHealth, PhaseProgress, ServiceStatus, StartupOverallStatus,
    StartupReport, StatusMetadata,
};
