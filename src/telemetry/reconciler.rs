use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::types::*;

/// Turn one raw status payload (plus the optional metrics payload) into
/// canonical activity records, one aggregate sample and the agent roster.
///
/// Pure: the observation time is passed in and nothing is logged, so the same
/// inputs always give the same output.
pub fn reconcile(
    status: &RawFleetStatus,
    metrics: Option<&RawDashboardMetrics>,
    observed_at: DateTime<Utc>,
) -> Reconciled {
    let mut activities = Vec::new();
    let mut roster = Roster::new();
    let mut response_sum = 0.0;
    let mut response_count = 0u32;
    let mut counted_active = 0u64;

    // BTreeMap iteration keeps output ordered by agent id.
    for (agent_id, state) in &status.agent_states {
        let name = state.name.clone().unwrap_or_else(|| agent_id.clone());
        let external = state.status.as_deref().unwrap_or("");
        let active = external.trim().eq_ignore_ascii_case("active");
        if active {
            counted_active += 1;
        }
        roster.insert(agent_id.clone(), RosterEntry { name: name.clone(), active });

        if let Some(ms) = agent_response_time(state) {
            response_sum += ms;
            response_count += 1;
        }

        let last_activity = state
            .last_activity
            .as_ref()
            .or_else(|| state.performance.as_ref().and_then(|p| p.last_activity.as_ref()))
            .and_then(parse_timestamp);

        let Some(start_time) = last_activity else {
            // Never ran: counted in the totals, not listed as an activity.
            continue;
        };

        let status = ActivityStatus::from_external(external);
        let progress = match status {
            ActivityStatus::Completed => Some(100.0),
            ActivityStatus::Running => state.progress.as_ref().and_then(finite).map(|p| p.clamp(0.0, 100.0)),
            ActivityStatus::Failed | ActivityStatus::Pending => None,
        };

        activities.push(AgentActivity {
            agent_id: agent_id.clone(),
            agent_name: name,
            status,
            start_time,
            duration_ms: state.duration.as_ref().and_then(finite).filter(|d| *d >= 0.0),
            progress,
        });
    }

    let total_agents = status.total_agents.unwrap_or(status.agent_states.len() as u64);
    let active_agents = status.active_agents.unwrap_or(counted_active).min(total_agents);
    let processing_tasks = status.processing_tasks;

    let average_response_time_ms = if response_count == 0 {
        0.0
    } else {
        response_sum / f64::from(response_count)
    };

    let summary = metrics.and_then(|m| m.summary.as_ref());

    let sample = SystemMetricsSample {
        timestamp: observed_at,
        total_agents,
        active_agents,
        processing_tasks,
        queued_tasks: status.queued_tasks,
        completed_tasks: summary.and_then(|s| s.completed_tasks),
        failed_tasks: summary.and_then(|s| s.failed_tasks),
        average_response_time_ms,
        system_load_pct: if total_agents == 0 {
            Some(0.0)
        } else {
            processing_tasks.map(|processing| system_load_pct(processing, total_agents))
        },
    };

    Reconciled {
        activities,
        sample,
        roster,
    }
}

/// Processing tasks per agent as a percentage, clamped to [0, 100].
pub fn system_load_pct(processing_tasks: u64, total_agents: u64) -> f64 {
    if total_agents == 0 {
        return 0.0;
    }
    (processing_tasks as f64 / total_agents as f64 * 100.0).clamp(0.0, 100.0)
}

fn agent_response_time(state: &RawAgentState) -> Option<f64> {
    state
        .average_response_time
        .as_ref()
        .and_then(finite)
        .or_else(|| {
            state
                .performance
                .as_ref()
                .and_then(|p| p.average_response_time.as_ref())
                .and_then(finite)
        })
}

/// Numbers, or numeric strings, that are finite.
fn finite(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
