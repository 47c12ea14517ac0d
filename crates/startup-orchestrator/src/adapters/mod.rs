//! Adapters layer
//!
//! - `relay`: event bus bridge for outbound events and inbound restart requests

pub mod relay;

pub use relay::EventRelay;
