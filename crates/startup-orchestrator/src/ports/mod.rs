//! Ports layer (hexagonal architecture)
//!
//! - `inbound`: API the host drives the orchestrator through
//! - `outbound`: routines the orchestrator drives

pub mod inbound;
pub mod outbound;

pub use inbound::{RestartHandler, StartupApi};
pub use outbound::{FnStartable, ServiceError, Startable};
