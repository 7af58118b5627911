use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::coordination::CoordinationOutcome;
use crate::error::FleetError;
use crate::poller::{CycleOutcome, PollCycle};
use crate::telemetry::{reconcile, ActivityStatus, AgentActivity, Roster, SystemMetricsSample, TimeWindow};

const DEFAULT_HISTORY_CAPACITY: usize = 20;
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Handle shared between the scheduler, the coordination wiring and readers.
pub type SharedDashboard = Arc<RwLock<DashboardState>>;

/// What the coordination panel currently shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CoordinationPanel {
    Idle,
    Resolved(CoordinationOutcome),
    Failed { job_id: Option<String>, message: String },
}

/// Notifications for presentation layers.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    ActivitiesUpdated { cycle: u64, count: usize },
    SamplePushed { cycle: u64, sample: SystemMetricsSample },
    PollWarning { cycle: u64, message: String },
    CoordinationResolved { job_id: String },
    CoordinationFailed { job_id: Option<String>, message: String },
}

/// Immutable view of the dashboard at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub activities: Vec<AgentActivity>,
    pub metrics: Vec<SystemMetricsSample>,
    pub last_coordination: CoordinationPanel,
    pub roster: Roster,
    pub poll_warning: Option<String>,
    pub last_cycle: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Effect of one `on_poll` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollApplied {
    pub activities_updated: bool,
    pub sample_pushed: bool,
}

/// The one mutable piece of client state. Performs no I/O; it is driven by
/// the poll scheduler and the coordination wiring.
pub struct DashboardState {
    activities: Vec<AgentActivity>,
    metrics: TimeWindow<SystemMetricsSample>,
    roster: Roster,
    coordination: CoordinationPanel,
    poll_warning: Option<String>,
    last_cycle: Option<u64>,
    updated_at: Option<DateTime<Utc>>,
    events: broadcast::Sender<DashboardEvent>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_CHANNEL_CAPACITY)
    }
}

impl DashboardState {
    pub fn new(history_capacity: usize, channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            activities: Vec::new(),
            metrics: TimeWindow::new(history_capacity),
            roster: Roster::new(),
            coordination: CoordinationPanel::Idle,
            poll_warning: None,
            last_cycle: None,
            updated_at: None,
            events,
        }
    }

    pub fn shared(self) -> SharedDashboard {
        Arc::new(RwLock::new(self))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            activities: self.activities.clone(),
            metrics: self.metrics.values(),
            last_coordination: self.coordination.clone(),
            roster: self.roster.clone(),
            poll_warning: self.poll_warning.clone(),
            last_cycle: self.last_cycle,
            updated_at: self.updated_at,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Apply one completed poll cycle.
    ///
    /// Fresh status replaces the activity list. One sample is pushed per
    /// cycle whenever metrics answered; if status failed, the sample is built
    /// from the last known-good status. A cycle where metrics failed pushes
    /// nothing. Cycles older than the last applied one are ignored.
    pub fn on_poll(&mut self, cycle: &PollCycle) -> PollApplied {
        if self.last_cycle.is_some_and(|last| cycle.cycle <= last) {
            tracing::debug!(cycle = cycle.cycle, last = ?self.last_cycle, "Ignoring out-of-order poll cycle");
            return PollApplied::default();
        }
        self.last_cycle = Some(cycle.cycle);

        let mut applied = PollApplied::default();

        let sample = if let Some(status) = cycle.status.fresh() {
            let reconciled = reconcile(status, cycle.metrics.best(), cycle.observed_at);
            self.activities = carry_progress(&self.activities, reconciled.activities);
            self.roster = reconciled.roster;
            self.updated_at = Some(cycle.observed_at);
            applied.activities_updated = true;
            self.emit(DashboardEvent::ActivitiesUpdated {
                cycle: cycle.cycle,
                count: self.activities.len(),
            });
            Some(reconciled.sample)
        } else {
            cycle
                .status
                .best()
                .map(|last_good| reconcile(last_good, cycle.metrics.fresh(), cycle.observed_at).sample)
        };

        if let (Some(sample), true) = (sample, cycle.metrics.is_fresh()) {
            self.metrics.push(sample.clone());
            applied.sample_pushed = true;
            self.emit(DashboardEvent::SamplePushed {
                cycle: cycle.cycle,
                sample,
            });
        }

        let outcome = cycle.outcome();
        self.poll_warning = outcome.warning();
        if let Some(message) = &self.poll_warning {
            self.emit(DashboardEvent::PollWarning {
                cycle: cycle.cycle,
                message: message.clone(),
            });
        }
        if let CycleOutcome::Failure { .. } = outcome {
            tracing::debug!(cycle = cycle.cycle, "Both endpoints failed, keeping previous state");
        }

        applied
    }

    /// Replace the coordination panel with a resolved job.
    pub fn on_coordination_result(&mut self, outcome: CoordinationOutcome) {
        let job_id = outcome.job_id.clone();
        self.coordination = CoordinationPanel::Resolved(outcome);
        self.emit(DashboardEvent::CoordinationResolved { job_id });
    }

    /// Record a failed submission. Only the coordination panel changes.
    pub fn on_coordination_error(&mut self, job_id: Option<String>, error: &FleetError) {
        let message = error.to_string();
        self.coordination = CoordinationPanel::Failed {
            job_id: job_id.clone(),
            message: message.clone(),
        };
        self.emit(DashboardEvent::CoordinationFailed { job_id, message });
    }

    fn emit(&self, event: DashboardEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Keep progress non-decreasing for an agent still running the same task.
fn carry_progress(previous: &[AgentActivity], mut next: Vec<AgentActivity>) -> Vec<AgentActivity> {
    for activity in next.iter_mut().filter(|a| a.status == ActivityStatus::Running) {
        let prior = previous.iter().find(|p| {
            p.agent_id == activity.agent_id
                && p.status == ActivityStatus::Running
                && p.start_time == activity.start_time
        });
        if let Some(prior_progress) = prior.and_then(|p| p.progress) {
            activity.progress = Some(match activity.progress {
                Some(current) => current.max(prior_progress),
                None => prior_progress,
            });
        }
    }
    next
}
