use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of one agent's latest observed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Running,
    Completed,
    Failed,
    Pending,
}

impl ActivityStatus {
    /// Map the backend's agent state onto an activity status.
    pub fn from_external(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "active" => ActivityStatus::Running,
            "failed" => ActivityStatus::Failed,
            "pending" => ActivityStatus::Pending,
            _ => ActivityStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentActivity {
    pub agent_id: String,
    pub agent_name: String,
    pub status: ActivityStatus,
    pub start_time: DateTime<Utc>,
    pub duration_ms: Option<f64>,
    /// 0-100. `None` when a running agent reports nothing; always 100 once completed.
    pub progress: Option<f64>,
}

/// One aggregate snapshot of the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetricsSample {
    pub timestamp: DateTime<Utc>,
    pub total_agents: u64,
    pub active_agents: u64,
    /// `None` when the backend did not report the count.
    pub processing_tasks: Option<u64>,
    pub queued_tasks: Option<u64>,
    pub completed_tasks: Option<u64>,
    pub failed_tasks: Option<u64>,
    pub average_response_time_ms: f64,
    /// Unknown when processing is unknown, except for an empty fleet.
    pub system_load_pct: Option<f64>,
}

/// An agent known from the last status poll, whether or not it ever ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub name: String,
    pub active: bool,
}

pub type Roster = BTreeMap<String, RosterEntry>;

/// `data` payload of the agent-status endpoint.
///
/// Everything is optional: the backend omits fields freely and the
/// reconciler derives what it can from the agent map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFleetStatus {
    pub total_agents: Option<u64>,
    pub active_agents: Option<u64>,
    pub processing_tasks: Option<u64>,
    pub queued_tasks: Option<u64>,
    pub parallel_executions: Option<u64>,
    pub agent_states: BTreeMap<String, RawAgentState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAgentState {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub agent_type: Option<String>,
    pub status: Option<String>,
    /// RFC 3339 string or epoch milliseconds.
    pub last_activity: Option<serde_json::Value>,
    pub average_response_time: Option<serde_json::Value>,
    pub progress: Option<serde_json::Value>,
    pub duration: Option<serde_json::Value>,
    pub performance: Option<RawAgentPerformance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAgentPerformance {
    pub average_response_time: Option<serde_json::Value>,
    pub last_activity: Option<serde_json::Value>,
}

/// `data` payload of the dashboard-metrics endpoint. Only the summary is
/// consumed; the rest of the aggregation payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDashboardMetrics {
    pub time_range: Option<String>,
    pub summary: Option<RawMetricsSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMetricsSummary {
    pub total_tasks: Option<u64>,
    pub completed_tasks: Option<u64>,
    pub failed_tasks: Option<u64>,
    pub average_response_time: Option<serde_json::Value>,
}

/// Output of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub activities: Vec<AgentActivity>,
    pub sample: SystemMetricsSample,
    pub roster: Roster,
}
