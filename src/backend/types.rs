use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coordination::{
    ConsensusSummary, CoordinationJob, CoordinationMode, CoordinationResult, TaskOutcome, TaskType,
};
use crate::error::{FleetError, FleetResult};

/// Response envelope used by every backend endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}

impl<T> ApiEnvelope<T> {
    /// Best human-readable reason the backend gave.
    pub fn reason(&self) -> Option<String> {
        match (&self.message, &self.error) {
            (Some(m), Some(e)) => Some(format!("{}: {}", m, e)),
            (Some(m), None) => Some(m.clone()),
            (None, Some(e)) => Some(e.clone()),
            (None, None) => None,
        }
    }
}

/// Body of `POST coordinate-agents`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationRequest {
    pub agent_ids: Vec<String>,
    pub task_type: TaskType,
    pub coordination_mode: CoordinationMode,
    pub input: Value,
}

impl CoordinationRequest {
    pub fn from_job(job: &CoordinationJob, task_type: &TaskType) -> Self {
        Self {
            agent_ids: job.agent_ids().to_vec(),
            task_type: task_type.clone(),
            coordination_mode: job.mode(),
            input: job.input().clone(),
        }
    }
}

/// `data` of `GET coordination/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationStatus {
    pub coordination_id: String,
    #[serde(default)]
    pub total_tasks: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub failed_tasks: u32,
    #[serde(default)]
    pub tasks: Vec<CoordinationTaskStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationTaskStatus {
    pub task_id: Option<String>,
    pub agent_name: Option<String>,
    pub agent_type: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
    pub duration: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireResults {
    mode: Option<CoordinationMode>,
    total_tasks: Option<u32>,
    successful: Option<u32>,
    failed: Option<u32>,
    consensus: Option<Value>,
    results: Option<Vec<WireTask>>,
    individual_results: Option<Vec<WireTask>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireTask {
    task_id: Option<String>,
    agent_id: Option<Value>,
    status: Option<String>,
    error: Option<String>,
}

impl CoordinationResult {
    /// Decode the `data` of a coordinate-agents response.
    ///
    /// The counts live under `data.results`; older backends return them at
    /// the top level, so both are accepted. `fallback_mode` is the mode the
    /// job was submitted with.
    pub fn from_response(data: &Value, fallback_mode: CoordinationMode) -> FleetResult<Self> {
        let body = data
            .get("results")
            .filter(|r| r.get("totalTasks").is_some())
            .unwrap_or(data);

        let wire: WireResults = serde_json::from_value(body.clone())
            .map_err(|e| FleetError::backend(None, format!("Malformed coordination result: {}", e)))?;

        let mode = wire
            .mode
            .or_else(|| data.get("mode").and_then(|m| serde_json::from_value(m.clone()).ok()))
            .unwrap_or(fallback_mode);

        let total_tasks = wire
            .total_tasks
            .ok_or_else(|| FleetError::backend(None, "Coordination result is missing totalTasks"))?;
        let successful = wire
            .successful
            .ok_or_else(|| FleetError::backend(None, "Coordination result is missing successful"))?;
        if successful > total_tasks {
            return Err(FleetError::backend(
                None,
                format!("Coordination result reports {} successful of {} tasks", successful, total_tasks),
            ));
        }

        let consensus = match (mode, wire.consensus) {
            (CoordinationMode::Consensus, Some(value)) if !value.is_null() => Some(parse_consensus(&value)?),
            _ => None,
        };

        let tasks = wire
            .individual_results
            .or(wire.results)
            .unwrap_or_default()
            .into_iter()
            .map(|t| TaskOutcome {
                task_id: t.task_id,
                agent_id: t.agent_id.map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                }),
                status: t.status.unwrap_or_else(|| "unknown".to_string()),
                error: t.error,
            })
            .collect();

        Ok(CoordinationResult {
            coordination_id: data
                .get("coordinationId")
                .and_then(Value::as_str)
                .map(String::from),
            mode,
            total_tasks,
            successful,
            failed: wire.failed,
            consensus,
            tasks,
        })
    }
}

fn parse_consensus(value: &Value) -> FleetResult<ConsensusSummary> {
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| FleetError::backend(None, "Consensus is missing a numeric confidence"))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(FleetError::backend(
            None,
            format!("Consensus confidence {} is outside [0, 1]", confidence),
        ));
    }
    let list = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };
    Ok(ConsensusSummary {
        confidence,
        recommendations: list("recommendations"),
        insights: list("insights"),
    })
}
