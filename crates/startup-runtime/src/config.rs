//! Runtime configuration from environment variables.

use std::env;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Run the phase plan instead of the flat dependency order.
    pub phased: bool,

    /// Name of a default service whose start routine should fail.
    pub demo_failure: Option<String>,

    /// How long each default service takes to start.
    pub demo_start_delay: Duration,

    /// Period of the status table in the logs. `None` disables it.
    pub status_interval: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            phased: true,
            demo_failure: None,
            demo_start_delay: Duration::from_millis(50),
            status_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl RuntimeConfig {
    /// Load from environment variables.
    ///
    /// - `ORCH_PHASED`: use the phase plan (default: true)
    /// - `ORCH_FAIL_SERVICE`: service whose start routine fails (default: none)
    /// - `ORCH_DEMO_DELAY_MS`: simulated start time per service (default: 50)
    /// - `ORCH_STATUS_INTERVAL_SECS`: status table period, 0 disables (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            phased: env::var("ORCH_PHASED")
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(defaults.phased),

            demo_failure: env::var("ORCH_FAIL_SERVICE")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            demo_start_delay: env_parse::<u64>("ORCH_DEMO_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.demo_start_delay),

            status_interval: match env_parse::<u64>("ORCH_STATUS_INTERVAL_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.status_interval,
            },
        }
    }

    /// Instant startup, no periodic status, for tests.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            demo_start_delay: Duration::ZERO,
            status_interval: None,
            ..Self::default()
        }
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
