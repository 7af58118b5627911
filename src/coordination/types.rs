use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FleetError, FleetResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationMode {
    Parallel,
    Sequential,
    Consensus,
}

impl std::fmt::Display for CoordinationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinationMode::Parallel => write!(f, "parallel"),
            CoordinationMode::Sequential => write!(f, "sequential"),
            CoordinationMode::Consensus => write!(f, "consensus"),
        }
    }
}

/// Kinds of task the agent pool knows how to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    CarbonAnalysis,
    RecommendationGeneration,
    DataProcessing,
    AnomalyDetection,
    TrendAnalysis,
    ComplianceCheck,
    OptimizationAdvice,
    ReportGeneration,
    Custom(String),
}

impl TaskType {
    pub fn as_str(&self) -> &str {
        match self {
            TaskType::CarbonAnalysis => "carbon_analysis",
            TaskType::RecommendationGeneration => "recommendation_generation",
            TaskType::DataProcessing => "data_processing",
            TaskType::AnomalyDetection => "anomaly_detection",
            TaskType::TrendAnalysis => "trend_analysis",
            TaskType::ComplianceCheck => "compliance_check",
            TaskType::OptimizationAdvice => "optimization_advice",
            TaskType::ReportGeneration => "report_generation",
            TaskType::Custom(name) => name,
        }
    }
}

impl From<String> for TaskType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "carbon_analysis" => TaskType::CarbonAnalysis,
            "recommendation_generation" => TaskType::RecommendationGeneration,
            "data_processing" => TaskType::DataProcessing,
            "anomaly_detection" => TaskType::AnomalyDetection,
            "trend_analysis" => TaskType::TrendAnalysis,
            "compliance_check" => TaskType::ComplianceCheck,
            "optimization_advice" => TaskType::OptimizationAdvice,
            "report_generation" => TaskType::ReportGeneration,
            _ => TaskType::Custom(value),
        }
    }
}

impl From<&str> for TaskType {
    fn from(value: &str) -> Self {
        TaskType::from(value.to_string())
    }
}

impl From<TaskType> for String {
    fn from(value: TaskType) -> Self {
        value.as_str().to_string()
    }
}

/// A request to run one task across several agents.
///
/// Fields are private: a job is built, then moved into
/// [`CoordinationClient::submit`](super::CoordinationClient::submit), after
/// which it can no longer change. Use [`CoordinationJob::retry`] to resubmit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationJob {
    id: String,
    agent_ids: Vec<String>,
    task_type: Option<TaskType>,
    mode: CoordinationMode,
    input: Value,
    created_at: DateTime<Utc>,
}

impl CoordinationJob {
    /// Duplicate agent ids are dropped, keeping the first occurrence so
    /// sequential ordering is preserved.
    pub fn new<I, S>(agent_ids: I, task_type: Option<TaskType>, mode: CoordinationMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = Vec::new();
        for id in agent_ids {
            let id = id.into();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        Self {
            id: format!("job-{}", Uuid::new_v4()),
            agent_ids: ids,
            task_type,
            mode,
            input: Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Same request under a fresh id.
    pub fn retry(&self) -> Self {
        Self {
            id: format!("job-{}", Uuid::new_v4()),
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent_ids(&self) -> &[String] {
        &self.agent_ids
    }

    pub fn task_type(&self) -> Option<&TaskType> {
        self.task_type.as_ref()
    }

    pub fn mode(&self) -> CoordinationMode {
        self.mode
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Checks that need no knowledge of the fleet.
    pub fn validate(&self) -> FleetResult<&TaskType> {
        if self.agent_ids.is_empty() {
            return Err(FleetError::Validation("at least one agent id is required".to_string()));
        }
        if self.agent_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(FleetError::Validation("agent ids must not be blank".to_string()));
        }
        match &self.task_type {
            None => Err(FleetError::Validation("task type is required".to_string())),
            Some(TaskType::Custom(name)) if name.trim().is_empty() => {
                Err(FleetError::Validation("task type is required".to_string()))
            }
            Some(task_type) => Ok(task_type),
        }
    }
}

/// Outcome of one agent's task within a coordination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub task_id: Option<String>,
    pub agent_id: Option<String>,
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSummary {
    /// In [0, 1].
    pub confidence: f64,
    pub recommendations: Vec<Value>,
    pub insights: Vec<Value>,
}

/// Correlated result of one coordination job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationResult {
    pub coordination_id: Option<String>,
    pub mode: CoordinationMode,
    pub total_tasks: u32,
    pub successful: u32,
    pub failed: Option<u32>,
    /// Only ever set for consensus mode.
    pub consensus: Option<ConsensusSummary>,
    pub tasks: Vec<TaskOutcome>,
}

/// How the consensus panel should render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsensusView {
    NotApplicable,
    Reached { confidence: f64 },
    NotReached,
}

impl ConsensusView {
    pub fn confidence_pct(&self) -> Option<f64> {
        match self {
            ConsensusView::Reached { confidence } => Some(confidence * 100.0),
            _ => None,
        }
    }
}

/// A resolved job, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationOutcome {
    pub job_id: String,
    pub result: CoordinationResult,
    pub resolved_at: DateTime<Utc>,
}

impl CoordinationOutcome {
    pub fn successful(&self) -> u32 {
        self.result.successful
    }

    pub fn total_tasks(&self) -> u32 {
        self.result.total_tasks
    }

    /// `successful/total`, e.g. `2/2`.
    pub fn success_ratio(&self) -> String {
        format!("{}/{}", self.result.successful, self.result.total_tasks)
    }

    pub fn consensus_view(&self) -> ConsensusView {
        match (self.result.mode, &self.result.consensus) {
            (CoordinationMode::Consensus, Some(c)) => ConsensusView::Reached {
                confidence: c.confidence,
            },
            (CoordinationMode::Consensus, None) => ConsensusView::NotReached,
            _ => ConsensusView::NotApplicable,
        }
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Mode: {}", self.result.mode),
            format!("Successful: {}", self.success_ratio()),
        ];
        match self.consensus_view() {
            ConsensusView::Reached { confidence } => {
                lines.push(format!("Confidence: {:.1}%", confidence * 100.0))
            }
            ConsensusView::NotReached => lines.push("No consensus reached".to_string()),
            ConsensusView::NotApplicable => {}
        }
        lines
    }
}
