//! # Shared Types Crate
//!
//! Value types that cross crate boundaries: the lifecycle and health states
//! tracked for every service, the status snapshot carried in events, and the
//! startup report handed to dashboards.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the Status Registry, the event bus and the
//!   runtime all speak these types; none of them define their own copies.
//! - **Snapshots, not handles**: a `ServiceStatus` is an owned copy of a
//!   registry entry. Mutating it never touches the registry.

pub mod entities;
pub mod report;

pub use entities::*;
pub use report::*;
