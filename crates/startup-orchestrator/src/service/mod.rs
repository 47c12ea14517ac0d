//! Service layer: the stateful parts of the engine.
//!
//! - `registry`: Status Registry
//! - `orchestrator`: dependency-ordered and phased initialization
//! - `recovery`: single-service restarts and shutdown

pub mod orchestrator;
pub mod recovery;
pub mod registry;

pub use orchestrator::Orchestrator;
pub use recovery::RecoveryManager;
pub use registry::StatusRegistry;
