use serde::Serialize;
use thiserror::Error;

/// Which of the two poll endpoints an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Status,
    Metrics,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Status => write!(f, "agent-status"),
            Endpoint::Metrics => write!(f, "dashboard-metrics"),
        }
    }
}

/// Errors produced by the telemetry and coordination client.
///
/// Every variant carries plain strings so errors can be cloned into
/// dashboard snapshots and compared in tests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FleetError {
    /// Transport failure or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// A coordination job was rejected before any request was made.
    #[error("invalid coordination job: {0}")]
    Validation(String),

    /// The backend answered, but not with a usable success.
    #[error("backend error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Backend { status: Option<u16>, message: String },

    /// One poll endpoint failed while the other succeeded.
    #[error("partial data: {endpoint} unavailable ({reason})")]
    PartialData { endpoint: Endpoint, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// The poll scheduler refused a lifecycle request.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl FleetError {
    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        FleetError::Backend {
            status,
            message: message.into(),
        }
    }

    /// True for errors that should only ever touch the coordination panel.
    pub fn is_remote(&self) -> bool {
        matches!(self, FleetError::Network(_) | FleetError::Backend { .. })
    }
}

impl From<reqwest::Error> for FleetError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FleetError::backend(
                err.status().map(|s| s.as_u16()),
                format!("Failed to parse response: {}", err),
            )
        } else if err.is_timeout() {
            FleetError::Network(format!("request timed out: {}", err))
        } else {
            FleetError::Network(err.to_string())
        }
    }
}

pub type FleetResult<T> = Result<T, FleetError>;
