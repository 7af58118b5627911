use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::types::*;
use crate::backend::{CoordinationRequest, CoordinationStatus, FleetBackend};
use crate::dashboard::SharedDashboard;
use crate::error::{FleetError, FleetResult};
use crate::telemetry::Roster;

/// Submits coordination jobs and load-balancing requests.
///
/// Jobs are validated locally before anything goes on the wire. With a
/// roster attached, every agent id must also be known and active as of the
/// last successful status poll.
#[derive(Clone)]
pub struct CoordinationClient {
    backend: Arc<dyn FleetBackend>,
    roster: Option<SharedDashboard>,
    in_flight: Arc<Mutex<HashMap<String, CoordinationJob>>>,
}

/// Removes a job from the in-flight map when the submission ends, including
/// when the submit future is dropped mid-request.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashMap<String, CoordinationJob>>>,
    job_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}

impl CoordinationClient {
    pub fn new(backend: Arc<dyn FleetBackend>) -> Self {
        Self {
            backend,
            roster: None,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_roster(mut self, dashboard: SharedDashboard) -> Self {
        self.roster = Some(dashboard);
        self
    }

    pub async fn submit(&self, job: CoordinationJob) -> FleetResult<CoordinationOutcome> {
        let task_type = job.validate()?.clone();
        if let Some(dashboard) = &self.roster {
            check_roster(dashboard.read().await.roster(), job.agent_ids())?;
        }

        let request = CoordinationRequest::from_job(&job, &task_type);
        let job_id = job.id().to_string();
        let mode = job.mode();

        tracing::info!(
            job_id = %job_id,
            mode = %mode,
            task_type = task_type.as_str(),
            agents = job.agent_ids().len(),
            "Submitting coordination job"
        );
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.clone(), job);
        let release = InFlightGuard {
            in_flight: self.in_flight.clone(),
            job_id: job_id.clone(),
        };

        let result = self
            .backend
            .coordinate(&request)
            .await
            .and_then(|data| CoordinationResult::from_response(&data, mode));
        drop(release);

        match result {
            Ok(result) => {
                tracing::info!(
                    job_id = %job_id,
                    coordination_id = result.coordination_id.as_deref().unwrap_or("-"),
                    successful = result.successful,
                    total = result.total_tasks,
                    "Coordination resolved"
                );
                Ok(CoordinationOutcome {
                    job_id,
                    result,
                    resolved_at: Utc::now(),
                })
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Coordination failed");
                Err(e)
            }
        }
    }

    pub async fn rebalance_load(&self) -> FleetResult<()> {
        self.backend.balance_load().await?;
        tracing::info!("Agent load rebalanced");
        Ok(())
    }

    pub async fn coordination_status(&self, coordination_id: &str) -> FleetResult<CoordinationStatus> {
        let coordination_id = coordination_id.trim();
        if coordination_id.is_empty() {
            return Err(FleetError::Validation("coordination id is required".to_string()));
        }
        self.backend.coordination_status(coordination_id).await
    }

    /// Ids of jobs submitted but not yet resolved.
    pub fn in_flight(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

/// An empty roster means no status poll has succeeded yet, so there is
/// nothing to check against.
fn check_roster(roster: &Roster, agent_ids: &[String]) -> FleetResult<()> {
    if roster.is_empty() {
        return Ok(());
    }

    let unknown: Vec<&str> = agent_ids
        .iter()
        .filter(|id| !roster.contains_key(id.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(FleetError::Validation(format!("unknown agent ids: {}", unknown.join(", "))));
    }

    let inactive: Vec<&str> = agent_ids
        .iter()
        .filter(|id| roster.get(id.as_str()).is_some_and(|entry| !entry.active))
        .map(String::as_str)
        .collect();
    if !inactive.is_empty() {
        return Err(FleetError::Validation(format!("agents not active: {}", inactive.join(", "))));
    }

    Ok(())
}
