pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::FleetResult;
use crate::telemetry::{RawDashboardMetrics, RawFleetStatus};

pub use client::HttpFleetBackend;
pub use types::*;

/// The remote fleet service, as seen by the poller and the coordination client.
#[async_trait]
pub trait FleetBackend: Send + Sync {
    /// `GET agent-status`.
    async fn fetch_status(&self) -> FleetResult<RawFleetStatus>;

    /// `GET dashboard-metrics`.
    async fn fetch_metrics(&self) -> FleetResult<RawDashboardMetrics>;

    /// `POST coordinate-agents`. Returns the envelope's `data` untouched so the
    /// caller can interpret it against the submitted job.
    async fn coordinate(&self, request: &CoordinationRequest) -> FleetResult<serde_json::Value>;

    /// `POST balance-load`.
    async fn balance_load(&self) -> FleetResult<()>;

    /// `GET coordination/{id}`.
    async fn coordination_status(&self, coordination_id: &str) -> FleetResult<CoordinationStatus>;
}
