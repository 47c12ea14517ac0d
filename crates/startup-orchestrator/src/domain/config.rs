//! Orchestrator configuration
//!
//! # Example
//!
//! ```ignore
//! use startup_orchestrator::domain::OrchestratorConfig;
//! use std::time::Duration;
//!
//! let config = OrchestratorConfig {
//!     dependency_timeout: Duration::from_secs(5),
//!     ..OrchestratorConfig::default()
//! };
//! config.validate()?;
//! ```

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// Default dependency poll tick.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default cap on the dependency wait.
pub const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default pause between marking a service Initializing and re-running it.
pub const DEFAULT_RESTART_SETTLE_DELAY: Duration = Duration::from_millis(1_000);

/// Default number of consecutive failed restarts before requests are refused.
pub const DEFAULT_MAX_RESTART_ATTEMPTS: u32 = 3;

/// Timing and capacity knobs of the orchestration engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// How often the dependency wait re-checks the Status Registry.
    pub dependency_poll_interval: Duration,
    /// Upper bound on the dependency wait of a single service.
    pub dependency_timeout: Duration,
    /// Delay between `Initializing` and the re-run of a restarted service.
    pub restart_settle_delay: Duration,
    /// Consecutive failed restarts tolerated per service. `0` means no cap.
    pub max_restart_attempts: u32,
    /// Buffer size of the event bus.
    pub event_channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dependency_poll_interval: DEFAULT_POLL_INTERVAL,
            dependency_timeout: DEFAULT_DEPENDENCY_TIMEOUT,
            restart_settle_delay: DEFAULT_RESTART_SETTLE_DELAY,
            max_restart_attempts: DEFAULT_MAX_RESTART_ATTEMPTS,
            event_channel_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// - `ORCH_DEPENDENCY_POLL_MS`
    /// - `ORCH_DEPENDENCY_TIMEOUT_MS`
    /// - `ORCH_RESTART_SETTLE_MS`
    /// - `ORCH_MAX_RESTART_ATTEMPTS`
    /// - `ORCH_EVENT_CAPACITY`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            dependency_poll_interval: env_millis("ORCH_DEPENDENCY_POLL_MS")
                .unwrap_or(defaults.dependency_poll_interval),
            dependency_timeout: env_millis("ORCH_DEPENDENCY_TIMEOUT_MS")
                .unwrap_or(defaults.dependency_timeout),
            restart_settle_delay: env_millis("ORCH_RESTART_SETTLE_MS")
                .unwrap_or(defaults.restart_settle_delay),
            max_restart_attempts: env_parse("ORCH_MAX_RESTART_ATTEMPTS")
                .unwrap_or(defaults.max_restart_attempts),
            event_channel_capacity: env_parse("ORCH_EVENT_CAPACITY")
                .unwrap_or(defaults.event_channel_capacity),
        }
    }

    /// Short timings for tests and demos.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            dependency_poll_interval: Duration::from_millis(5),
            dependency_timeout: Duration::from_millis(200),
            restart_settle_delay: Duration::from_millis(5),
            ..Self::default()
        }
    }

    /// Reject configurations the dependency wait cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dependency_poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }

        if self.dependency_poll_interval > self.dependency_timeout {
            return Err(ConfigError::PollExceedsTimeout {
                poll_ms: self.dependency_poll_interval.as_millis(),
                timeout_ms: self.dependency_timeout.as_millis(),
            });
        }

        if self.event_channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
