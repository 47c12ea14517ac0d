//! # Shared Bus - Event Bus for Service Lifecycle Events
//!
//! The sole coupling point between the orchestration core and its external
//! collaborators (dashboards, log sinks, operator tooling).
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Orchestrator │                    │  Dashboard   │
//! │  / Registry  │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!        ↑               ▼                    ↑
//!        │         ┌──────────────┐          │
//!        │         │  Event Bus   │ ─────────┘
//!        │         │              │  subscribe()
//!        │         └──────────────┘
//!        │               │
//!        └── restart ────┘  (service.restart.request)
//! ```
//!
//! - Outbound: `service.*`, `services.*` and `startup.*` events
//! - Inbound: `service.restart.request`, forwarded to the Recovery Manager

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, ServiceEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
