use enginelink_common::time::Duration;
use serde::{Deserialize, Serialize};

/// Tunables for the connection lifecycle. Defaults match the web client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How often a connected endpoint is re-validated.
    pub heartbeat_interval: Duration,
    /// Deadline for the validation probe (each attempt).
    pub validate_timeout: Duration,
    /// Pause between propagation-confirmation polls.
    pub poll_interval: Duration,
    /// Total time allowed for the saved endpoint to appear in the session.
    pub propagation_max_wait: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(60),
            validate_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            propagation_max_wait: Duration::from_secs(10),
        }
    }
}
