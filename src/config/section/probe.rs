//! `[probe]` section configuration.
//!
//! Timing and bounds for the readiness probe. The defaults match the
//! 300 ms delay / 300 ms connect timeout the render server has always been
//! probed with; the bounds keep a server that never comes up from hanging
//! the run forever.
//!
//! # Example
//!
//! ```toml
//! [probe]
//! interval_ms = 300
//! connect_timeout_ms = 300
//! max_attempts = 200
//! max_wait_ms = 60000
//! ```

use crate::probe::ProbeSettings;
use serde::Deserialize;
use std::time::Duration;

/// Readiness probe settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Delay before each connection attempt, in milliseconds.
    pub interval_ms: u64,

    /// Per-attempt connection timeout, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Maximum number of connection attempts.
    pub max_attempts: u32,

    /// Maximum total time spent waiting, in milliseconds.
    pub max_wait_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300,
            connect_timeout_ms: 300,
            max_attempts: 200,
            max_wait_ms: 60_000,
        }
    }
}

impl ProbeConfig {
    /// Convert to the prober's settings type.
    pub fn settings(&self) -> ProbeSettings {
        ProbeSettings {
            interval: Duration::from_millis(self.interval_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_attempts: self.max_attempts,
            max_wait: Duration::from_millis(self.max_wait_ms),
        }
    }
}
