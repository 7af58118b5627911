use std::sync::Arc;
use tokio::sync::broadcast;

use crate::backend::{CoordinationStatus, FleetBackend, HttpFleetBackend};
use crate::config::FleetConfig;
use crate::coordination::{CoordinationClient, CoordinationJob, CoordinationOutcome};
use crate::dashboard::{DashboardEvent, DashboardSnapshot, DashboardState, SharedDashboard};
use crate::error::{FleetError, FleetResult};
use crate::poller::{CycleReport, PollScheduler};

/// One dashboard, one scheduler and one coordination client over a shared
/// backend.
pub struct FleetApp {
    config: FleetConfig,
    dashboard: SharedDashboard,
    scheduler: PollScheduler,
    coordination: CoordinationClient,
}

impl FleetApp {
    pub fn new(config: FleetConfig) -> FleetResult<Self> {
        config.validate()?;
        let backend = Arc::new(HttpFleetBackend::new(config.backend.clone())?);
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: FleetConfig, backend: Arc<dyn FleetBackend>) -> Self {
        let dashboard = DashboardState::new(
            config.polling.history_capacity,
            config.notifications.channel_capacity,
        )
        .shared();
        let scheduler = PollScheduler::new(backend.clone(), dashboard.clone());
        let coordination = CoordinationClient::new(backend).with_roster(dashboard.clone());

        Self {
            config,
            dashboard,
            scheduler,
            coordination,
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn dashboard(&self) -> SharedDashboard {
        self.dashboard.clone()
    }

    pub fn start(&self) -> FleetResult<()> {
        self.scheduler.start(self.config.polling.interval())
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub async fn refresh_now(&self) -> CycleReport {
        self.scheduler.refresh_now().await
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.dashboard.read().await.snapshot()
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.dashboard.read().await.subscribe()
    }

    /// Submit a job and show its outcome in the coordination panel.
    ///
    /// A rejected job is returned to the caller and leaves the panel alone;
    /// remote failures are shown in the panel. A resolved job triggers an
    /// immediate refresh.
    pub async fn coordinate(&self, job: CoordinationJob) -> FleetResult<CoordinationOutcome> {
        let job_id = job.id().to_string();
        match self.coordination.submit(job).await {
            Ok(outcome) => {
                self.dashboard
                    .write()
                    .await
                    .on_coordination_result(outcome.clone());
                self.scheduler.refresh_now().await;
                Ok(outcome)
            }
            Err(e) => {
                self.record_failure(Some(job_id), &e).await;
                Err(e)
            }
        }
    }

    pub async fn balance_load(&self) -> FleetResult<()> {
        match self.coordination.rebalance_load().await {
            Ok(()) => {
                self.scheduler.refresh_now().await;
                Ok(())
            }
            Err(e) => {
                self.record_failure(None, &e).await;
                Err(e)
            }
        }
    }

    pub async fn coordination_status(&self, coordination_id: &str) -> FleetResult<CoordinationStatus> {
        self.coordination.coordination_status(coordination_id).await
    }

    pub fn in_flight(&self) -> Vec<String> {
        self.coordination.in_flight()
    }

    async fn record_failure(&self, job_id: Option<String>, error: &FleetError) {
        if error.is_remote() {
            self.dashboard
                .write()
                .await
                .on_coordination_error(job_id, error);
        }
    }
}
