use enginelink_api::{ApiError, ApiErrorKind};
use serde::{Deserialize, Serialize};

/// Connection lifecycle states. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Unconfigured,
    Validating,
    Connected,
    Error,
    Timeout,
    CorsError,
    InvalidUrl,
}

impl ConnectionStatus {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::Error | Self::Timeout | Self::CorsError | Self::InvalidUrl
        )
    }
}

/// What went wrong, one level finer than [`ConnectionStatus`]. Persistence
/// failures (`SaveFailed`) and session propagation failures
/// (`PropagationTimeout`) stay distinguishable from validation failures even
/// though all three terminate in [`ConnectionStatus::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionErrorKind {
    Engine,
    Timeout,
    Cors,
    InvalidUrl,
    SaveFailed,
    PropagationTimeout,
}

impl ConnectionErrorKind {
    /// The status an error of this kind terminates in.
    pub fn status(&self) -> ConnectionStatus {
        match self {
            Self::Timeout => ConnectionStatus::Timeout,
            Self::Cors => ConnectionStatus::CorsError,
            Self::InvalidUrl => ConnectionStatus::InvalidUrl,
            Self::Engine | Self::SaveFailed | Self::PropagationTimeout => ConnectionStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_url() -> Self {
        Self::new(
            ConnectionErrorKind::InvalidUrl,
            "Please enter a valid URL (e.g., https://example.com)",
        )
    }

    pub fn not_an_engine() -> Self {
        Self::new(
            ConnectionErrorKind::Engine,
            "The URL does not appear to be a valid engine",
        )
    }
}

impl From<&ApiError> for ConnectionError {
    fn from(error: &ApiError) -> Self {
        match error.kind {
            ApiErrorKind::Timeout => Self::new(
                ConnectionErrorKind::Timeout,
                "Connection timed out. Please check the URL and try again.",
            ),
            ApiErrorKind::Cors => Self::new(
                ConnectionErrorKind::Cors,
                "CORS error. The engine may not be configured to accept requests from this origin.",
            ),
            _ => Self::new(ConnectionErrorKind::Engine, error.message.clone()),
        }
    }
}

/// The single per-session connection record.
///
/// `error` is populated exactly when `status` is an error-like value, and
/// `last_heartbeat` (epoch millis) only moves forward while connected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub endpoint: Option<String>,
    pub error: Option<ConnectionError>,
    pub last_heartbeat: Option<i64>,
}

impl ConnectionState {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    #[cfg(test)]
    pub(crate) fn invariants_hold(&self) -> bool {
        self.status.is_error() == self.error.is_some()
    }

    /// Hydration path: a persisted endpoint is assumed good until a probe says
    /// otherwise, so `last_heartbeat` stays unset.
    pub(crate) fn assume_connected(&mut self, endpoint: String) {
        self.status = ConnectionStatus::Connected;
        self.endpoint = Some(endpoint);
        self.error = None;
    }

    pub(crate) fn begin_validation(&mut self) {
        self.status = ConnectionStatus::Validating;
        self.error = None;
    }

    pub(crate) fn connect(&mut self, endpoint: String, now_ms: i64) {
        self.status = ConnectionStatus::Connected;
        self.endpoint = Some(endpoint);
        self.error = None;
        self.last_heartbeat = Some(self.last_heartbeat.map_or(now_ms, |prev| prev.max(now_ms)));
    }

    /// Records a failure without touching the endpoint: a failed attempt never
    /// clears a previously committed value.
    pub(crate) fn fail(&mut self, error: ConnectionError) {
        self.status = error.kind.status();
        self.error = Some(error);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
