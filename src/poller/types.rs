use chrono::{DateTime, Utc};

use crate::error::{Endpoint, FleetError};
use crate::telemetry::{RawDashboardMetrics, RawFleetStatus};

/// One endpoint's contribution to a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Fresh(T),
    /// The request failed; `last_good` is the most recent successful value,
    /// if any cycle ever produced one.
    Stale { last_good: Option<T>, error: FleetError },
}

impl<T> Fetched<T> {
    pub fn fresh(&self) -> Option<&T> {
        match self {
            Fetched::Fresh(value) => Some(value),
            Fetched::Stale { .. } => None,
        }
    }

    /// Fresh value, else the last known-good one.
    pub fn best(&self) -> Option<&T> {
        match self {
            Fetched::Fresh(value) => Some(value),
            Fetched::Stale { last_good, .. } => last_good.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&FleetError> {
        match self {
            Fetched::Fresh(_) => None,
            Fetched::Stale { error, .. } => Some(error),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Fetched::Fresh(_))
    }
}

/// Everything one poll cycle learned, handed to the dashboard in one piece.
#[derive(Debug, Clone, PartialEq)]
pub struct PollCycle {
    pub cycle: u64,
    pub observed_at: DateTime<Utc>,
    pub status: Fetched<RawFleetStatus>,
    pub metrics: Fetched<RawDashboardMetrics>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Ok,
    /// Exactly one endpoint failed; carries a `PartialData` error.
    PartialFailure(FleetError),
    Failure { status: FleetError, metrics: FleetError },
}

impl PollCycle {
    pub fn outcome(&self) -> CycleOutcome {
        match (self.status.error(), self.metrics.error()) {
            (None, None) => CycleOutcome::Ok,
            (Some(status), Some(metrics)) => CycleOutcome::Failure {
                status: status.clone(),
                metrics: metrics.clone(),
            },
            (Some(err), None) => CycleOutcome::PartialFailure(FleetError::PartialData {
                endpoint: Endpoint::Status,
                reason: err.to_string(),
            }),
            (None, Some(err)) => CycleOutcome::PartialFailure(FleetError::PartialData {
                endpoint: Endpoint::Metrics,
                reason: err.to_string(),
            }),
        }
    }
}

impl CycleOutcome {
    /// One-line, non-blocking warning for the dashboard, if any.
    pub fn warning(&self) -> Option<String> {
        match self {
            CycleOutcome::Ok => None,
            CycleOutcome::PartialFailure(err) => Some(err.to_string()),
            CycleOutcome::Failure { status, metrics } => Some(format!(
                "Failed to fetch dashboard data: {}; {}",
                status, metrics
            )),
        }
    }
}

/// What happened to a requested cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    Applied { cycle: u64, outcome: CycleOutcome },
    /// Another cycle was still outstanding.
    SkippedBusy,
    /// The scheduler was stopped while the cycle was in flight.
    Discarded { cycle: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(status: Fetched<RawFleetStatus>, metrics: Fetched<RawDashboardMetrics>) -> PollCycle {
        PollCycle {
            cycle: 1,
            observed_at: Utc::now(),
            status,
            metrics,
        }
    }

    #[test]
    fn outcome_classifies_partial_failures() {
        let net = FleetError::Network("connection refused".into());

        let ok = cycle(Fetched::Fresh(Default::default()), Fetched::Fresh(Default::default()));
        assert_eq!(ok.outcome(), CycleOutcome::Ok);
        assert_eq!(ok.outcome().warning(), None);

        let partial = cycle(
            Fetched::Fresh(Default::default()),
            Fetched::Stale { last_good: None, error: net.clone() },
        );
        match partial.outcome() {
            CycleOutcome::PartialFailure(FleetError::PartialData { endpoint, .. }) => {
                assert_eq!(endpoint, Endpoint::Metrics)
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let failed = cycle(
            Fetched::Stale { last_good: None, error: net.clone() },
            Fetched::Stale { last_good: None, error: net },
        );
        assert!(matches!(failed.outcome(), CycleOutcome::Failure { .. }));
        assert!(failed.outcome().warning().unwrap().starts_with("Failed to fetch dashboard data"));
    }

    #[test]
    fn best_prefers_fresh_then_last_good() {
        let fresh: Fetched<u32> = Fetched::Fresh(2);
        assert_eq!(fresh.best(), Some(&2));

        let stale: Fetched<u32> = Fetched::Stale {
            last_good: Some(1),
            error: FleetError::Network("timeout".into()),
        };
        assert_eq!(stale.fresh(), None);
        assert_eq!(stale.best(), Some(&1));
    }
}
