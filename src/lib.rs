pub mod app;
pub mod backend;
pub mod config;
pub mod coordination;
pub mod dashboard;
pub mod error;
pub mod poller;
pub mod telemetry;

#[cfg(test)]
mod test_helpers;

use tokio::sync::broadcast::error::RecvError;

pub use app::FleetApp;
pub use backend::{FleetBackend, HttpFleetBackend};
pub use config::FleetConfig;
pub use coordination::{CoordinationClient, CoordinationJob, CoordinationMode, CoordinationOutcome, TaskType};
pub use dashboard::{DashboardEvent, DashboardSnapshot, DashboardState};
pub use error::{FleetError, FleetResult};
pub use poller::PollScheduler;

/// Poll the fleet and log dashboard events until Ctrl-C.
pub async fn run(config: FleetConfig) -> anyhow::Result<()> {
    let app = FleetApp::new(config)?;
    let mut events = app.subscribe().await;

    tracing::info!(backend = %app.config().backend.base_url, "Starting fleetdeck");
    if app.config().polling.auto_start {
        app.start()?;
    } else {
        app.refresh_now().await;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    app.stop().await;
    Ok(())
}

fn log_event(event: &DashboardEvent) {
    match event {
        DashboardEvent::ActivitiesUpdated { cycle, count } => {
            tracing::info!(cycle, agents = count, "Activities updated")
        }
        DashboardEvent::SamplePushed { cycle, sample } => tracing::info!(
            cycle,
            total = sample.total_agents,
            active = sample.active_agents,
            processing = ?sample.processing_tasks,
            queued = ?sample.queued_tasks,
            load_pct = ?sample.system_load_pct,
            avg_response_ms = sample.average_response_time_ms,
            "Metrics sample"
        ),
        DashboardEvent::PollWarning { cycle, message } => {
            tracing::warn!(cycle, "{}", message)
        }
        DashboardEvent::CoordinationResolved { job_id } => {
            tracing::info!(job_id = %job_id, "Coordination resolved")
        }
        DashboardEvent::CoordinationFailed { job_id, message } => tracing::warn!(
            job_id = job_id.as_deref().unwrap_or("-"),
            "Coordination failed: {}",
            message
        ),
    }
}
